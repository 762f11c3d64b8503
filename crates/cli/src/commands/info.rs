//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{BeatcastConfig, DeviceRetryPolicy, IdentifierOrder};
use tracing::info;

use crate::cli::InfoArgs;

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let json = config_loader::ConfigLoader::to_json(&config)
            .context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

/// Advertised service list layout, with the packet identifier as `<packet>`
fn service_layout(config: &BeatcastConfig) -> String {
    let app = &config.advertise.app_service_id;
    match config.advertise.identifier_order {
        IdentifierOrder::CustomLast => format!("[{app}, <packet>]"),
        IdentifierOrder::CustomFirst => format!("[<packet>, {app}]"),
    }
}

fn print_config_info(config: &BeatcastConfig) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  beatcast Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🎛  Coordinator");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Transport: {:?}", config.coordinator.transport);
    match config.coordinator.metrics_port {
        Some(port) => println!("   └─ Metrics: port {}", port),
        None => println!("   └─ Metrics: disabled"),
    }

    let advertise = &config.advertise;
    println!("\n📢 Advertise");
    println!("   ├─ Services: {}", service_layout(config));
    println!(
        "   ├─ Local name: {}",
        advertise.local_name.as_deref().unwrap_or("(none)")
    );
    println!("   ├─ Restart policy: {:?}", advertise.restart_policy);
    println!("   ├─ Restart tick: {} ms", advertise.restart_tick_ms);
    println!("   └─ Stop retry delay: {} ms", advertise.stop_retry_delay_ms);

    let connect = &config.connect;
    println!("\n🔗 Connect");
    println!("   ├─ Scan service: {}", connect.scan_service_id);
    println!("   ├─ Write characteristic: {}", connect.write_characteristic_id);
    println!("   ├─ Max concurrency: {}", connect.max_concurrency);
    println!("   ├─ Step timeout: {} ms", connect.step_timeout_ms);
    match connect.retry_policy {
        DeviceRetryPolicy::Always => println!("   └─ Retry: every packet"),
        DeviceRetryPolicy::SkipAfter { failures } => {
            println!("   └─ Retry: skip after {} consecutive failures", failures)
        }
    }

    println!();
}
