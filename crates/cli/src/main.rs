//! # beatcast CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 协调器（操作员命令 → 时钟换算 → 编码 → 传输）
//! - 优雅关闭处理

mod cli;
mod commands;
mod coordinator;
mod error;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_coordinator, run_encode, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on CLI options
    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "beatcast starting");

    // Execute command
    let result = match &cli.command {
        Commands::Run(args) => run_coordinator(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
        Commands::Encode(args) => run_encode(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    // -q / -v are explicit requests, RUST_LOG only applies without them
    let explicit = cli.quiet || cli.verbose > 0;
    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: ObservabilityConfig::level_for(cli.verbose, cli.quiet).to_string(),
        force_level: explicit,
    })
}
