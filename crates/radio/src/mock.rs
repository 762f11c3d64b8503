//! Mock radios
//!
//! 用于单元测试和集成测试的 mock 实现，支持注入失败与延迟，并记录所有调用。

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{AdvertisingRadio, ContractError, DeviceLink, Packet};
use tokio::time::sleep;
use tracing::{debug, instrument};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Consume one scripted failure, if any are left
fn take_failure(remaining: &AtomicU32) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

async fn delay(duration: Duration) {
    if !duration.is_zero() {
        sleep(duration).await;
    }
}

/// Shared counter of radio calls in flight across many mock devices
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    inner: Arc<ProbeCounters>,
}

#[derive(Debug, Default)]
struct ProbeCounters {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest number of simultaneous calls observed
    pub fn max_observed(&self) -> usize {
        self.inner.max.load(Ordering::SeqCst)
    }

    /// Calls currently in flight
    pub fn current(&self) -> usize {
        self.inner.current.load(Ordering::SeqCst)
    }

    fn enter(&self) -> ProbeGuard {
        let now = self.inner.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max.fetch_max(now, Ordering::SeqCst);
        ProbeGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ProbeGuard {
    inner: Arc<ProbeCounters>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.inner.current.fetch_sub(1, Ordering::SeqCst);
    }
}

// ===== Advertiser =====

/// One call made against [`MockAdvertiser`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvertiserCall {
    Start {
        local_name: Option<String>,
        service_ids: Vec<String>,
    },
    Stop,
}

/// Mock peripheral-role radio
#[derive(Debug, Default)]
pub struct MockAdvertiser {
    stop_delay: Duration,
    start_delay: Duration,
    /// Remaining scripted stop failures
    stop_failures: AtomicU32,
    /// Remaining scripted start failures
    start_failures: AtomicU32,
    calls: Mutex<Vec<AdvertiserCall>>,
    /// Service list currently on air
    advertised: Mutex<Option<Vec<String>>>,
    starts_in_flight: AtomicUsize,
    max_starts_in_flight: AtomicUsize,
}

impl MockAdvertiser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Radio whose stop/start completions arrive after the given delays
    pub fn with_delays(stop_delay: Duration, start_delay: Duration) -> Self {
        Self {
            stop_delay,
            start_delay,
            ..Self::default()
        }
    }

    /// Fail the next `n` stop calls
    pub fn fail_next_stops(&self, n: u32) {
        self.stop_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` start calls
    pub fn fail_next_starts(&self, n: u32) {
        self.start_failures.store(n, Ordering::SeqCst);
    }

    /// Every call so far, in issue order
    pub fn calls(&self) -> Vec<AdvertiserCall> {
        lock(&self.calls).clone()
    }

    pub fn start_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, AdvertiserCall::Start { .. }))
            .count()
    }

    pub fn stop_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, AdvertiserCall::Stop))
            .count()
    }

    /// Service identifiers on air, `None` when not advertising
    pub fn advertised(&self) -> Option<Vec<String>> {
        lock(&self.advertised).clone()
    }

    /// Highest number of overlapping start calls observed
    pub fn max_concurrent_starts(&self) -> usize {
        self.max_starts_in_flight.load(Ordering::SeqCst)
    }
}

impl AdvertisingRadio for MockAdvertiser {
    #[instrument(name = "mock_start_advertising", skip(self, service_ids))]
    async fn start_advertising(
        &self,
        local_name: Option<&str>,
        service_ids: &[String],
    ) -> Result<(), ContractError> {
        lock(&self.calls).push(AdvertiserCall::Start {
            local_name: local_name.map(str::to_string),
            service_ids: service_ids.to_vec(),
        });

        let in_flight = self.starts_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_starts_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);
        delay(self.start_delay).await;
        self.starts_in_flight.fetch_sub(1, Ordering::SeqCst);

        if take_failure(&self.start_failures) {
            return Err(ContractError::radio("start_advertising", "mock failure"));
        }
        *lock(&self.advertised) = Some(service_ids.to_vec());
        debug!(services = ?service_ids, "mock advertising started");
        Ok(())
    }

    #[instrument(name = "mock_stop_advertising", skip(self))]
    async fn stop_advertising(&self) -> Result<(), ContractError> {
        lock(&self.calls).push(AdvertiserCall::Stop);
        delay(self.stop_delay).await;

        if take_failure(&self.stop_failures) {
            return Err(ContractError::radio("stop_advertising", "mock failure"));
        }
        *lock(&self.advertised) = None;
        Ok(())
    }
}

// ===== Device =====

/// Timing and failure script of a [`MockDevice`]
#[derive(Debug, Clone, Default)]
pub struct MockDeviceConfig {
    pub connect_delay: Duration,
    pub write_delay: Duration,
    pub disconnect_delay: Duration,
    pub fail_connect: bool,
    pub fail_write: bool,
    pub fail_disconnect: bool,
}

/// Mock central-role device link
#[derive(Debug)]
pub struct MockDevice {
    name: String,
    config: MockDeviceConfig,
    fail_connect: AtomicBool,
    fail_write: AtomicBool,
    writes: Mutex<Vec<Packet>>,
    connects: AtomicU32,
    disconnects: AtomicU32,
    connected: AtomicBool,
    probe: Option<ConcurrencyProbe>,
}

impl MockDevice {
    /// Device that succeeds instantly
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, MockDeviceConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: MockDeviceConfig) -> Self {
        Self {
            name: name.into(),
            fail_connect: AtomicBool::new(config.fail_connect),
            fail_write: AtomicBool::new(config.fail_write),
            config,
            writes: Mutex::new(Vec::new()),
            connects: AtomicU32::new(0),
            disconnects: AtomicU32::new(0),
            connected: AtomicBool::new(false),
            probe: None,
        }
    }

    /// Report every radio call to a shared probe
    pub fn with_probe(mut self, probe: ConcurrencyProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Change connect behaviour at runtime (e.g. device comes back in range)
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_write(&self, fail: bool) {
        self.fail_write.store(fail, Ordering::SeqCst);
    }

    /// Packets successfully written, oldest first
    pub fn writes(&self) -> Vec<Packet> {
        lock(&self.writes).clone()
    }

    pub fn last_write(&self) -> Option<Packet> {
        lock(&self.writes).last().copied()
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl DeviceLink for MockDevice {
    async fn connect(&self) -> Result<(), ContractError> {
        let _guard = self.probe.as_ref().map(ConcurrencyProbe::enter);
        self.connects.fetch_add(1, Ordering::SeqCst);
        delay(self.config.connect_delay).await;

        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ContractError::radio("connect", "mock failure"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&self, packet: &Packet) -> Result<(), ContractError> {
        let _guard = self.probe.as_ref().map(ConcurrencyProbe::enter);
        delay(self.config.write_delay).await;

        if !self.connected.load(Ordering::SeqCst) {
            return Err(ContractError::radio("write", "not connected"));
        }
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(ContractError::radio("write", "mock failure"));
        }
        lock(&self.writes).push(*packet);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ContractError> {
        let _guard = self.probe.as_ref().map(ConcurrencyProbe::enter);
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        delay(self.config.disconnect_delay).await;

        if self.config.fail_disconnect {
            return Err(ContractError::radio("disconnect", "mock failure"));
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
