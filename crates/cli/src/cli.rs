//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// beatcast - push a synchronized show state to BLE lighting devices
#[derive(Parser, Debug)]
#[command(
    name = "beatcast",
    author,
    version,
    about = "BLE beat-synchronization coordinator",
    long_about = "Keeps lighting devices on the operator's beat.\n\n\
                  Reads operator commands as JSON lines on stdin, converts remote \n\
                  timestamps to the local clock, and pushes a 16-byte show-state \n\
                  packet by advertisement or by connecting to each device."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BEATCAST_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BEATCAST_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the coordinator, reading operator commands from stdin
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Encode a show state and print its packet
    Encode(EncodeArgs),
}

/// Transport selectable on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportArg {
    /// Embed the packet in our own advertisement
    Advertise,
    /// Connect to each device and write the packet
    Connect,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults apply when absent
    #[arg(short, long, env = "BEATCAST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the transport from configuration
    #[arg(long, value_enum, env = "BEATCAST_TRANSPORT")]
    pub transport: Option<TransportArg>,

    /// Override the Prometheus port from configuration (0 = disabled)
    #[arg(long, env = "BEATCAST_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Number of simulated devices registered in connect mode
    #[arg(long, default_value = "3", env = "BEATCAST_SIMULATED_DEVICES")]
    pub simulated_devices: usize,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "beatcast.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "beatcast.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `encode` command
#[derive(Parser, Debug)]
pub struct EncodeArgs {
    /// Beat zero in local-clock milliseconds
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub start_time: i64,

    /// Tempo in beats per minute
    #[arg(long, default_value = "120")]
    pub bpm: f64,

    /// Palette index
    #[arg(long, default_value = "0")]
    pub gradient: i32,

    /// Energy, 0-1000
    #[arg(long, default_value = "500")]
    pub energy: f64,

    /// Attack, 0-600 ms
    #[arg(long, default_value = "100")]
    pub attack: f64,

    /// Release, 0-600 ms
    #[arg(long, default_value = "600")]
    pub release: f64,

    /// Visual program selector
    #[arg(long, default_value = "0")]
    pub program: i32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
