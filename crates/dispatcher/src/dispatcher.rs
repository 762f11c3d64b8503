//! Dispatcher - coalescing fan-out of packets to registered devices

use std::sync::Arc;

use contracts::{BatchReport, ConnectConfig, DeviceId, DeviceLink, Packet, UpdateId};
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::error::DispatcherError;
use crate::handle::{update_one, DeviceRegistry, UpdateSettings};
use crate::metrics::MetricsSnapshot;

/// Latest requested update: id and packet change together
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Latest {
    pub update_id: UpdateId,
    pub packet: Option<Packet>,
}

/// Central-role transport
///
/// `send_packet` replaces the single pending slot and returns at once. A
/// dedicated worker runs one batch at a time, always with the freshest packet,
/// so requests made while a batch is running coalesce into the next batch.
pub struct Dispatcher<L> {
    registry: DeviceRegistry<L>,
    /// Only writer of the latest (update id, packet) pair
    latest_tx: watch::Sender<Latest>,
    completed_rx: watch::Receiver<Option<Arc<BatchReport>>>,
    worker_handle: JoinHandle<()>,
}

impl<L> Dispatcher<L>
where
    L: DeviceLink + Send + Sync + 'static,
{
    /// Create a dispatcher with an empty registry and spawn its worker
    pub fn new(config: &ConnectConfig) -> Self {
        Self::with_registry(config, DeviceRegistry::new())
    }

    /// Create a dispatcher over an existing registry (shared with discovery)
    pub fn with_registry(config: &ConnectConfig, registry: DeviceRegistry<L>) -> Self {
        let (latest_tx, latest_rx) = watch::channel(Latest::default());
        let (completed_tx, completed_rx) = watch::channel(None);

        let worker = BatchWorker {
            registry: registry.clone(),
            max_concurrency: config.max_concurrency.max(1),
            settings: UpdateSettings {
                step_timeout: config.step_timeout(),
                retry_policy: config.retry_policy,
            },
        };
        let worker_handle = tokio::spawn(async move {
            worker.run(latest_rx, completed_tx).await;
        });

        Self {
            registry,
            latest_tx,
            completed_rx,
            worker_handle,
        }
    }

    /// Registry handle for discovery tasks
    pub fn registry(&self) -> DeviceRegistry<L> {
        self.registry.clone()
    }

    /// Add or replace a device
    pub async fn register_device(&self, id: impl Into<DeviceId>, link: Arc<L>) -> bool {
        self.registry.register(id.into(), link).await
    }

    pub async fn device_count(&self) -> usize {
        self.registry.len().await
    }

    /// Get metrics for all devices
    pub async fn metrics(&self) -> Vec<(DeviceId, MetricsSnapshot)> {
        self.registry
            .snapshot()
            .await
            .iter()
            .map(|h| (h.id().clone(), h.metrics().snapshot()))
            .collect()
    }

    /// Id of the most recent request
    pub fn latest_update_id(&self) -> UpdateId {
        self.latest_tx.borrow().update_id
    }

    /// Store `packet` as the latest request and return its update id
    ///
    /// Any batch still running keeps draining; the worker picks this packet up
    /// once it is free, unless a newer one replaces it first.
    pub fn send_packet(&self, packet: Packet) -> UpdateId {
        let mut update_id = 0;
        self.latest_tx.send_modify(|latest| {
            latest.update_id += 1;
            latest.packet = Some(packet);
            update_id = latest.update_id;
        });
        debug!(update_id, "packet queued");
        update_id
    }

    /// Send `packet` and wait for the batch that covers it
    ///
    /// The returned report may belong to a newer update that coalesced this one.
    ///
    /// # Errors
    /// `WorkerStopped` if the worker exited before covering the request.
    pub async fn send_packet_and_wait(&self, packet: Packet) -> Result<BatchReport, DispatcherError> {
        let mut completed = self.completed_rx.clone();
        let update_id = self.send_packet(packet);
        loop {
            if let Some(report) = completed.borrow_and_update().as_deref() {
                if report.update_id >= update_id {
                    return Ok(report.clone());
                }
            }
            completed
                .changed()
                .await
                .map_err(|_| DispatcherError::WorkerStopped)?;
        }
    }

    /// Most recently completed batch
    pub fn last_report(&self) -> Option<Arc<BatchReport>> {
        self.completed_rx.borrow().clone()
    }

    /// Subscribe to completed batch reports
    pub fn subscribe_reports(&self) -> watch::Receiver<Option<Arc<BatchReport>>> {
        self.completed_rx.clone()
    }

    /// Stop accepting packets, drain the pending request, and wait for the worker
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(self) {
        drop(self.latest_tx);
        if let Err(e) = self.worker_handle.await {
            error!(error = ?e, "Dispatcher worker panicked");
        }
        debug!("Dispatcher shutdown complete");
    }
}

/// Worker that runs batches strictly one after another
struct BatchWorker<L> {
    registry: DeviceRegistry<L>,
    max_concurrency: usize,
    settings: UpdateSettings,
}

impl<L> BatchWorker<L>
where
    L: DeviceLink + Send + Sync + 'static,
{
    #[instrument(name = "dispatcher_worker_loop", skip_all)]
    async fn run(
        self,
        mut latest_rx: watch::Receiver<Latest>,
        completed_tx: watch::Sender<Option<Arc<BatchReport>>>,
    ) {
        info!(max_concurrency = self.max_concurrency, "Dispatcher worker started");

        while latest_rx.changed().await.is_ok() {
            let latest = *latest_rx.borrow_and_update();
            let Some(packet) = latest.packet else {
                continue;
            };

            let report = self.run_batch(latest.update_id, packet, &latest_rx).await;
            observability::record_batch(&report);
            completed_tx.send_replace(Some(Arc::new(report)));
        }

        info!("Dispatcher input closed, worker stopped");
    }

    #[instrument(name = "dispatcher_batch", skip(self, packet, latest_rx))]
    async fn run_batch(
        &self,
        update_id: UpdateId,
        packet: Packet,
        latest_rx: &watch::Receiver<Latest>,
    ) -> BatchReport {
        let started = Instant::now();
        let handles = self.registry.snapshot().await;
        let settings = self.settings;

        let outcomes: Vec<_> = stream::iter(handles)
            .map(|handle| async move {
                let outcome = update_one(&handle, packet, update_id, latest_rx, settings).await;
                (handle.id().clone(), outcome)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let report = BatchReport {
            update_id,
            packet,
            outcomes,
            duration: started.elapsed(),
        };
        if report.outcomes.is_empty() {
            debug!(duration_ms = report.duration.as_millis() as u64, "Batch had no devices");
            return report;
        }
        info!(
            devices = report.outcomes.len(),
            done = report.done(),
            aborted = report.aborted(),
            failed = report.failed(),
            duration_ms = report.duration.as_millis() as u64,
            "Batch finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DeviceOutcome, DeviceRetryPolicy};
    use radio::{ConcurrencyProbe, MockDevice, MockDeviceConfig};
    use std::time::Duration;

    fn slow(name: &str, delay_ms: u64) -> Arc<MockDevice> {
        Arc::new(MockDevice::with_config(
            name,
            MockDeviceConfig {
                connect_delay: Duration::from_millis(delay_ms),
                ..Default::default()
            },
        ))
    }

    #[tokio::test]
    async fn test_send_packet_reaches_every_device() {
        let dispatcher = Dispatcher::new(&ConnectConfig::default());
        let devices: Vec<_> = (0..3)
            .map(|i| Arc::new(MockDevice::new(format!("lamp-{i}"))))
            .collect();
        for device in &devices {
            dispatcher
                .register_device(device.name(), Arc::clone(device))
                .await;
        }

        let packet = Packet::from_bytes([5; 16]);
        let report = dispatcher.send_packet_and_wait(packet).await.unwrap();

        assert_eq!(report.update_id, 1);
        assert_eq!(report.done(), 3);
        for device in &devices {
            assert_eq!(device.writes(), vec![packet]);
        }
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_update_ids_increase() {
        let dispatcher: Dispatcher<MockDevice> = Dispatcher::new(&ConnectConfig::default());
        assert_eq!(dispatcher.send_packet(Packet::default()), 1);
        assert_eq!(dispatcher.send_packet(Packet::default()), 2);
        assert_eq!(dispatcher.latest_update_id(), 2);
    }

    #[tokio::test]
    async fn test_batch_without_devices_still_reports() {
        let dispatcher: Dispatcher<MockDevice> = Dispatcher::new(&ConnectConfig::default());
        let report = dispatcher
            .send_packet_and_wait(Packet::from_bytes([1; 16]))
            .await
            .unwrap();

        assert_eq!(report.update_id, 1);
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_packets_coalesce_to_latest() {
        let dispatcher = Dispatcher::new(&ConnectConfig::default());
        let device = slow("lamp", 50);
        dispatcher.register_device("lamp", Arc::clone(&device)).await;

        let a = Packet::from_bytes([0xaa; 16]);
        let b = Packet::from_bytes([0xbb; 16]);
        let c = Packet::from_bytes([0xcc; 16]);

        dispatcher.send_packet(a);
        dispatcher.send_packet(b);
        let report = dispatcher.send_packet_and_wait(c).await.unwrap();

        assert_eq!(report.update_id, 3);
        assert_eq!(device.writes(), vec![c]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_batch_drains_then_next_batch_runs() {
        let dispatcher = Dispatcher::new(&ConnectConfig::default());
        let device = slow("lamp", 100);
        dispatcher.register_device("lamp", Arc::clone(&device)).await;

        let first = Packet::from_bytes([1; 16]);
        let second = Packet::from_bytes([2; 16]);

        dispatcher.send_packet(first);
        // let the first batch reach the connect step
        tokio::time::sleep(Duration::from_millis(10)).await;
        let report = dispatcher.send_packet_and_wait(second).await.unwrap();
        assert_eq!(report.update_id, 2);
        assert_eq!(report.packet, second);

        // batch 1 drained first and aborted after connecting
        assert_eq!(device.writes(), vec![second]);
        assert_eq!(device.connect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_respects_concurrency_ceiling() {
        let dispatcher = Dispatcher::new(&ConnectConfig::default());
        let probe = ConcurrencyProbe::new();
        for i in 0..12 {
            let device = MockDevice::with_config(
                format!("lamp-{i}"),
                MockDeviceConfig {
                    connect_delay: Duration::from_millis(20),
                    write_delay: Duration::from_millis(20),
                    ..Default::default()
                },
            )
            .with_probe(probe.clone());
            dispatcher
                .register_device(format!("lamp-{i}"), Arc::new(device))
                .await;
        }

        let report = dispatcher
            .send_packet_and_wait(Packet::default())
            .await
            .unwrap();

        assert_eq!(report.done(), 12);
        assert_eq!(probe.max_observed(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_device_does_not_block_batch() {
        let dispatcher = Dispatcher::new(&ConnectConfig::default());
        let good = Arc::new(MockDevice::new("good"));
        let hung = slow("hung", 10_000);
        dispatcher.register_device("good", Arc::clone(&good)).await;
        dispatcher.register_device("hung", Arc::clone(&hung)).await;

        let report = dispatcher
            .send_packet_and_wait(Packet::default())
            .await
            .unwrap();

        assert_eq!(report.outcome_for("good"), Some(&DeviceOutcome::Done));
        assert!(matches!(
            report.outcome_for("hung"),
            Some(DeviceOutcome::Failed { .. })
        ));
        assert!(report.duration < Duration::from_millis(1100));
        // still registered for the next packet
        assert_eq!(dispatcher.device_count().await, 2);
    }

    #[tokio::test]
    async fn test_failed_device_retried_on_next_packet() {
        let dispatcher = Dispatcher::new(&ConnectConfig::default());
        let device = Arc::new(MockDevice::with_config(
            "lamp",
            MockDeviceConfig {
                fail_connect: true,
                ..Default::default()
            },
        ));
        dispatcher.register_device("lamp", Arc::clone(&device)).await;

        let report = dispatcher
            .send_packet_and_wait(Packet::default())
            .await
            .unwrap();
        assert_eq!(report.failed(), 1);

        device.set_fail_connect(false);
        let packet = Packet::from_bytes([9; 16]);
        let report = dispatcher.send_packet_and_wait(packet).await.unwrap();
        assert_eq!(report.done(), 1);
        assert_eq!(device.last_write(), Some(packet));
    }

    #[tokio::test]
    async fn test_skip_after_policy() {
        let config = ConnectConfig {
            retry_policy: DeviceRetryPolicy::SkipAfter { failures: 1 },
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(&config);
        let device = Arc::new(MockDevice::with_config(
            "lamp",
            MockDeviceConfig {
                fail_connect: true,
                ..Default::default()
            },
        ));
        dispatcher.register_device("lamp", Arc::clone(&device)).await;

        dispatcher
            .send_packet_and_wait(Packet::default())
            .await
            .unwrap();
        let report = dispatcher
            .send_packet_and_wait(Packet::default())
            .await
            .unwrap();
        assert_eq!(report.outcome_for("lamp"), Some(&DeviceOutcome::Skipped));

        // re-registration lifts the quarantine
        device.set_fail_connect(false);
        dispatcher.register_device("lamp", Arc::clone(&device)).await;
        let report = dispatcher
            .send_packet_and_wait(Packet::default())
            .await
            .unwrap();
        assert_eq!(report.done(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_pending_packet() {
        let dispatcher = Dispatcher::new(&ConnectConfig::default());
        let device = slow("lamp", 30);
        dispatcher.register_device("lamp", Arc::clone(&device)).await;

        let packet = Packet::from_bytes([3; 16]);
        dispatcher.send_packet(packet);
        dispatcher.shutdown().await;

        assert_eq!(device.writes(), vec![packet]);
    }

    #[tokio::test]
    async fn test_metrics_per_device() {
        let dispatcher = Dispatcher::new(&ConnectConfig::default());
        dispatcher
            .register_device("lamp", Arc::new(MockDevice::new("lamp")))
            .await;
        dispatcher
            .send_packet_and_wait(Packet::default())
            .await
            .unwrap();

        let metrics = dispatcher.metrics().await;
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].0, "lamp");
        assert_eq!(metrics[0].1.done_count, 1);
    }
}
