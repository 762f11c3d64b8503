//! `run` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use broadcaster::{Broadcaster, PowerState};
use clock_sync::{LocalClock, MonotonicClock};
use contracts::{
    AdvertisingRadio, BatchReport, BeatcastConfig, DeviceLink, DeviceRetryPolicy, TransportMode,
};
use dispatcher::Dispatcher;
use radio::{SimulatedAdvertiser, SimulatedDevice};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::{RunArgs, TransportArg};
use crate::coordinator::{Coordinator, Transport};

/// Execute the `run` command
pub async fn run_coordinator(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args)?;

    // Apply CLI overrides
    if let Some(transport) = args.transport {
        info!(transport = ?transport, "Overriding transport from CLI");
        config.coordinator.transport = match transport {
            TransportArg::Advertise => TransportMode::Advertise,
            TransportArg::Connect => TransportMode::Connect,
        };
    }
    if let Some(port) = args.metrics_port {
        info!(port, "Overriding metrics port from CLI");
        config.coordinator.metrics_port = (port != 0).then_some(port);
    }
    config_loader::ConfigLoader::validate(&config).context("Invalid configuration")?;

    info!(
        transport = ?config.coordinator.transport,
        app_service_id = %config.advertise.app_service_id,
        max_concurrency = config.connect.max_concurrency,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    if let Some(port) = config.coordinator.metrics_port {
        observability::init_metrics_only(port)?;
        info!("Metrics endpoint available on port {}", port);
    }

    let clock: Arc<dyn LocalClock> = Arc::new(MonotonicClock::new());
    match config.coordinator.transport {
        TransportMode::Advertise => run_advertise(&config, clock).await,
        TransportMode::Connect => run_connect(&config, args, clock).await,
    }
}

fn load_config(args: &RunArgs) -> Result<BeatcastConfig> {
    let Some(path) = &args.config else {
        info!("No configuration file given, using defaults");
        return Ok(BeatcastConfig::default());
    };

    info!(config = %path.display(), "Loading configuration");
    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

async fn run_advertise(config: &BeatcastConfig, clock: Arc<dyn LocalClock>) -> Result<()> {
    let name = config.advertise.local_name.as_deref().unwrap_or("beatcast");
    let broadcaster = Broadcaster::new(SimulatedAdvertiser::new(name), config.advertise.clone());
    broadcaster
        .on_power_state(PowerState::PoweredOn)
        .await
        .context("Failed to start advertising")?;

    let coordinator: Coordinator<_, SimulatedDevice> =
        Coordinator::new(clock, Transport::Advertise(broadcaster));
    drive(coordinator).await
}

#[cfg(not(feature = "real-ble"))]
async fn run_connect(
    config: &BeatcastConfig,
    args: &RunArgs,
    clock: Arc<dyn LocalClock>,
) -> Result<()> {
    let dispatcher = Dispatcher::new(&config.connect);
    for i in 0..args.simulated_devices {
        let id = format!("sim-{i}");
        dispatcher
            .register_device(id.clone(), Arc::new(SimulatedDevice::new(id)))
            .await;
    }
    info!(devices = args.simulated_devices, "Simulated devices registered");

    let coordinator: Coordinator<SimulatedAdvertiser, _> =
        Coordinator::new(clock, Transport::Connect(dispatcher));
    drive(coordinator).await
}

#[cfg(feature = "real-ble")]
async fn run_connect(
    config: &BeatcastConfig,
    _args: &RunArgs,
    clock: Arc<dyn LocalClock>,
) -> Result<()> {
    use radio::BleCentral;
    use tokio::sync::mpsc;

    let central = BleCentral::first_adapter()
        .await
        .context("Failed to open Bluetooth adapter")?;
    let dispatcher = Dispatcher::new(&config.connect);

    let (tx, mut rx) = mpsc::channel(16);
    let scan_service_id = config.connect.scan_service_id.clone();
    let write_characteristic_id = config.connect.write_characteristic_id.clone();
    let discovery = tokio::spawn(async move {
        if let Err(e) = central
            .run_discovery(&scan_service_id, &write_characteristic_id, tx)
            .await
        {
            warn!(error = %e, "Device discovery stopped");
        }
    });

    let registry = dispatcher.registry();
    let registration = tokio::spawn(async move {
        while let Some((id, link)) = rx.recv().await {
            registry.register(id, Arc::new(link)).await;
        }
    });

    let coordinator: Coordinator<SimulatedAdvertiser, _> =
        Coordinator::new(clock, Transport::Connect(dispatcher));
    let result = drive(coordinator).await;

    discovery.abort();
    registration.abort();
    result
}

/// Feed stdin lines to the coordinator until EOF or a shutdown signal
async fn drive<A, L>(mut coordinator: Coordinator<A, L>) -> Result<()>
where
    A: AdvertisingRadio + Send + Sync + 'static,
    L: DeviceLink + Send + Sync + 'static,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut reports = coordinator.subscribe_reports();

    // Setup graceful shutdown handler
    let shutdown = setup_shutdown_signal();
    tokio::pin!(shutdown);

    info!(
        transport = coordinator.transport().label(),
        "Reading operator commands from stdin"
    );

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read operator input")? {
                    Some(line) => {
                        coordinator.handle_line(&line);
                    }
                    None => {
                        info!("Operator input closed");
                        break;
                    }
                }
            }
            report = next_report(&mut reports) => {
                if let Some(report) = report {
                    coordinator.record_report(&report);
                }
            }
            _ = &mut shutdown => {
                warn!("Received shutdown signal, stopping coordinator...");
                break;
            }
        }
    }

    let stats = coordinator.shutdown().await;
    info!(
        lines = stats.lines_received,
        rejected = stats.lines_rejected,
        packets = stats.packets_requested,
        duration_secs = stats.duration.as_secs_f64(),
        "Coordinator finished"
    );
    stats.print_summary();
    Ok(())
}

/// Next batch report, or never when the transport has none
async fn next_report(
    reports: &mut Option<watch::Receiver<Option<Arc<BatchReport>>>>,
) -> Option<Arc<BatchReport>> {
    let Some(rx) = reports.as_mut() else {
        return std::future::pending().await;
    };
    if rx.changed().await.is_err() {
        *reports = None;
        return None;
    }
    rx.borrow_and_update().clone()
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &BeatcastConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Transport: {:?}", config.coordinator.transport);
    match config.coordinator.metrics_port {
        Some(port) => println!("Metrics port: {}", port),
        None => println!("Metrics: disabled"),
    }

    let advertise = &config.advertise;
    println!("\nAdvertise:");
    println!("  App service id: {}", advertise.app_service_id);
    println!(
        "  Local name: {}",
        advertise.local_name.as_deref().unwrap_or("(none)")
    );
    println!("  Identifier order: {:?}", advertise.identifier_order);
    println!(
        "  Restart: {:?} (tick {} ms, stop retry {} ms)",
        advertise.restart_policy, advertise.restart_tick_ms, advertise.stop_retry_delay_ms
    );

    let connect = &config.connect;
    println!("\nConnect:");
    println!("  Max concurrency: {}", connect.max_concurrency);
    println!("  Step timeout: {} ms", connect.step_timeout_ms);
    match connect.retry_policy {
        DeviceRetryPolicy::Always => println!("  Retry policy: always"),
        DeviceRetryPolicy::SkipAfter { failures } => {
            println!("  Retry policy: skip after {} failures", failures)
        }
    }
    println!(
        "  Scan service / write characteristic: {} / {}",
        connect.scan_service_id, connect.write_characteristic_id
    );

    println!();
}
