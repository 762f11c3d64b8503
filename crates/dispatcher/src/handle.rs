//! DeviceHandle - one registered device and its per-update operation

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use contracts::{
    ContractError, DeviceId, DeviceLink, DeviceOutcome, DeviceRetryPolicy, DeviceUpdateState,
    Packet, UpdateId,
};
use tokio::sync::{watch, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::dispatcher::Latest;
use crate::metrics::DeviceMetrics;

/// Handle to a registered device
pub struct DeviceHandle<L> {
    id: DeviceId,
    /// Link with its cached write characteristic
    link: Arc<L>,
    metrics: DeviceMetrics,
    /// Step of the current or last update, `None` before the first one
    state: Mutex<Option<DeviceUpdateState>>,
}

impl<L> DeviceHandle<L> {
    pub fn new(id: DeviceId, link: Arc<L>) -> Self {
        Self {
            id,
            link,
            metrics: DeviceMetrics::new(),
            state: Mutex::new(None),
        }
    }

    pub fn state(&self) -> Option<DeviceUpdateState> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while an update is between `Started` and a terminal state
    pub fn is_updating(&self) -> bool {
        self.state().is_some_and(|state| !state.is_terminal())
    }

    fn transition(&self, state: DeviceUpdateState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = Some(state);
        debug!(device = %self.id, state = state.step_name(), "device update state");
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn link(&self) -> &Arc<L> {
        &self.link
    }

    pub fn metrics(&self) -> &DeviceMetrics {
        &self.metrics
    }
}

/// Device registry shared between the dispatcher and discovery
///
/// Cloning is cheap; all clones see the same devices.
pub struct DeviceRegistry<L> {
    devices: Arc<RwLock<HashMap<DeviceId, Arc<DeviceHandle<L>>>>>,
}

impl<L> Clone for DeviceRegistry<L> {
    fn clone(&self) -> Self {
        Self {
            devices: Arc::clone(&self.devices),
        }
    }
}

impl<L> Default for DeviceRegistry<L> {
    fn default() -> Self {
        Self {
            devices: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<L> DeviceRegistry<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a device; returns true when an existing handle was replaced
    ///
    /// Replacing resets the device's metrics, which also lifts a retry-policy
    /// quarantine.
    #[instrument(name = "registry_register", skip(self, link), fields(device = %id))]
    pub async fn register(&self, id: DeviceId, link: Arc<L>) -> bool {
        let handle = Arc::new(DeviceHandle::new(id.clone(), link));
        let mut devices = self.devices.write().await;
        let replaced = devices.insert(id, handle).is_some();
        observability::record_registered_devices(devices.len());
        info!(replaced, devices = devices.len(), "device registered");
        replaced
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn get(&self, id: &str) -> Option<Arc<DeviceHandle<L>>> {
        self.devices.read().await.get(id).cloned()
    }

    /// Handles borrowed for one batch
    pub async fn snapshot(&self) -> Vec<Arc<DeviceHandle<L>>> {
        self.devices.read().await.values().cloned().collect()
    }
}

/// Per-step settings of a device update
#[derive(Debug, Clone, Copy)]
pub(crate) struct UpdateSettings {
    pub step_timeout: Duration,
    pub retry_policy: DeviceRetryPolicy,
}

fn is_stale(latest: &watch::Receiver<Latest>, update_id: UpdateId) -> bool {
    latest.borrow().update_id != update_id
}

/// Run one radio step against the step timeout
///
/// The step runs as its own task. On timeout the task is left running and its
/// result is discarded.
async fn race_step<L, F, Fut>(
    link: &Arc<L>,
    state: DeviceUpdateState,
    limit: Duration,
    op: F,
) -> Result<(), ContractError>
where
    F: FnOnce(Arc<L>) -> Fut,
    Fut: Future<Output = Result<(), ContractError>> + Send + 'static,
{
    let step = tokio::spawn(op(Arc::clone(link)));
    match timeout(limit, step).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(ContractError::radio(state.step_name(), join.to_string())),
        Err(_) => Err(ContractError::timeout(
            state.step_name(),
            limit.as_millis() as u64,
        )),
    }
}

/// Best-effort disconnect; errors are ignored
fn release<L>(link: &Arc<L>)
where
    L: DeviceLink + Send + Sync + 'static,
{
    let link = Arc::clone(link);
    tokio::spawn(async move {
        if let Err(e) = link.disconnect().await {
            debug!(error = %e, "cleanup disconnect failed");
        }
    });
}

/// Push `packet` to one device
///
/// Staleness is checked on entry and again after connecting, so a superseded
/// update never reaches the write step.
#[instrument(
    name = "dispatcher_update_one",
    skip(handle, packet, latest, settings),
    fields(device = %handle.id())
)]
pub(crate) async fn update_one<L>(
    handle: &DeviceHandle<L>,
    packet: Packet,
    update_id: UpdateId,
    latest: &watch::Receiver<Latest>,
    settings: UpdateSettings,
) -> DeviceOutcome
where
    L: DeviceLink + Send + Sync + 'static,
{
    let outcome = run_steps(handle, packet, update_id, latest, settings).await;
    handle.metrics.record(&outcome);
    outcome
}

async fn run_steps<L>(
    handle: &DeviceHandle<L>,
    packet: Packet,
    update_id: UpdateId,
    latest: &watch::Receiver<Latest>,
    settings: UpdateSettings,
) -> DeviceOutcome
where
    L: DeviceLink + Send + Sync + 'static,
{
    if is_stale(latest, update_id) {
        debug!("superseded before start");
        handle.transition(DeviceUpdateState::Aborted);
        return DeviceOutcome::Aborted;
    }

    if let DeviceRetryPolicy::SkipAfter { failures } = settings.retry_policy {
        let consecutive = handle.metrics.consecutive_failures();
        if consecutive >= failures {
            debug!(consecutive, "device quarantined by retry policy");
            return DeviceOutcome::Skipped;
        }
    }

    handle.transition(DeviceUpdateState::Started);
    let link = &handle.link;
    let limit = settings.step_timeout;

    handle.transition(DeviceUpdateState::Connecting);
    let result = race_step(link, DeviceUpdateState::Connecting, limit, |link| async move {
        link.connect().await
    })
    .await;
    if let Err(e) = result {
        return fail(handle, DeviceUpdateState::Connecting, e);
    }

    if is_stale(latest, update_id) {
        debug!("superseded while connecting");
        release(link);
        handle.transition(DeviceUpdateState::Aborted);
        return DeviceOutcome::Aborted;
    }

    handle.transition(DeviceUpdateState::Writing);
    let result = race_step(link, DeviceUpdateState::Writing, limit, move |link| async move {
        link.write(&packet).await
    })
    .await;
    if let Err(e) = result {
        return fail(handle, DeviceUpdateState::Writing, e);
    }

    handle.transition(DeviceUpdateState::Disconnecting);
    let result = race_step(link, DeviceUpdateState::Disconnecting, limit, |link| async move {
        link.disconnect().await
    })
    .await;
    if let Err(e) = result {
        return fail(handle, DeviceUpdateState::Disconnecting, e);
    }

    handle.transition(DeviceUpdateState::Done);
    debug!("packet delivered");
    DeviceOutcome::Done
}

fn fail<L>(handle: &DeviceHandle<L>, step: DeviceUpdateState, error: ContractError) -> DeviceOutcome
where
    L: DeviceLink + Send + Sync + 'static,
{
    warn!(step = step.step_name(), error = %error, "device update failed");
    release(&handle.link);
    handle.transition(DeviceUpdateState::Failed);
    DeviceOutcome::Failed {
        error: error.to_string(),
    }
}
