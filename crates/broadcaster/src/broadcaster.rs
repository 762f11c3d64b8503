//! Advertisement broadcaster - restart state machine over an [`AdvertisingRadio`]

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{
    AdvertiseConfig, AdvertisingRadio, ContractError, IdentifierOrder, Packet, PowerState,
    RestartPolicy,
};
use observability::{record_advertise_event, AdvertiseEvent};
use packet_codec::{from_identifier, to_identifier};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::error::BroadcastError;
use crate::state::{BroadcastState, RestartOutcome};

/// State guarded together with the generation counter
#[derive(Debug, Default)]
struct Shared {
    /// Most recently requested packet
    packet: Packet,
    state: BroadcastState,
    powered_on: bool,
    /// Packet confirmed on air
    on_air: Option<Packet>,
}

#[derive(Debug, Clone, Copy)]
struct Plan {
    generation: u64,
    needs_stop: bool,
}

enum PowerAction {
    Start(Plan),
    Stop { generation: u64 },
    Nothing,
}

struct Inner<R> {
    radio: R,
    config: AdvertiseConfig,
    shared: Mutex<Shared>,
    /// Bumped under the `shared` lock on every request and power change
    generation: AtomicU64,
    /// Held for a whole restart so two starts never overlap
    restart_lock: AsyncMutex<()>,
}

/// Peripheral-role transport
///
/// Owns a single outgoing packet and keeps it on air through the radio. Every
/// request bumps a generation counter; completions of older generations are
/// dropped instead of touching shared state.
///
/// Requests mutate state when the method is called, and the returned future
/// drives the radio. The future is `'static` so it can be spawned.
pub struct Broadcaster<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for Broadcaster<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> Broadcaster<R>
where
    R: AdvertisingRadio + Send + Sync + 'static,
{
    /// Create an idle broadcaster holding the zero packet
    pub fn new(radio: R, config: AdvertiseConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                radio,
                config,
                shared: Mutex::new(Shared::default()),
                generation: AtomicU64::new(0),
                restart_lock: AsyncMutex::new(()),
            }),
        }
    }

    pub fn state(&self) -> BroadcastState {
        self.inner.lock_shared().state
    }

    /// Most recently requested packet
    pub fn packet(&self) -> Packet {
        self.inner.lock_shared().packet
    }

    /// Packet confirmed on air, if any
    pub fn on_air(&self) -> Option<Packet> {
        self.inner.lock_shared().on_air
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn radio(&self) -> &R {
        &self.inner.radio
    }

    /// Advertised service list for a packet, ordered per platform
    pub fn service_ids(&self, packet: &Packet) -> Vec<String> {
        self.inner.service_ids(packet)
    }

    /// Validate a 32-character identifier, then restart with its packet
    ///
    /// # Errors
    /// `InvalidLength` when the identifier is not exactly 32 lowercase hex
    /// characters; nothing is changed in that case.
    pub fn set_identifier(
        &self,
        identifier: &str,
    ) -> Result<
        impl Future<Output = Result<RestartOutcome, BroadcastError>> + Send + 'static,
        BroadcastError,
    > {
        let packet = from_identifier(identifier)?;
        Ok(self.set_packet(packet))
    }

    /// Store `packet` as the one to advertise and restart advertising
    ///
    /// While the radio is not powered the packet is only stored.
    pub fn set_packet(
        &self,
        packet: Packet,
    ) -> impl Future<Output = Result<RestartOutcome, BroadcastError>> + Send + 'static {
        let plan = self.inner.begin(packet);
        let inner = Arc::clone(&self.inner);
        async move {
            match plan {
                Some(plan) => inner.run(plan).await,
                None => Ok(RestartOutcome::Stored),
            }
        }
    }

    /// React to a radio power-state change
    ///
    /// Power-on while idle starts advertising the stored packet. Any other
    /// state moves to `Idle` and supersedes in-flight restarts.
    pub fn on_power_state(
        &self,
        power: PowerState,
    ) -> impl Future<Output = Result<RestartOutcome, BroadcastError>> + Send + 'static {
        let action = self.inner.power_changed(power);
        let inner = Arc::clone(&self.inner);
        async move {
            match action {
                PowerAction::Start(plan) => inner.run(plan).await,
                PowerAction::Stop { generation } => {
                    let _turn = inner.restart_lock.lock().await;
                    if inner.is_stale(generation) {
                        return Ok(inner.superseded(generation));
                    }
                    if let Err(e) = inner.radio.stop_advertising().await {
                        debug!(error = %e, "stop after power loss failed");
                    }
                    Ok(RestartOutcome::Stored)
                }
                PowerAction::Nothing => Ok(RestartOutcome::Unchanged),
            }
        }
    }
}

impl<R> Inner<R>
where
    R: AdvertisingRadio + Send + Sync + 'static,
{
    fn lock_shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn service_ids(&self, packet: &Packet) -> Vec<String> {
        let app = self.config.app_service_id.clone();
        let custom = to_identifier(packet);
        match self.config.identifier_order {
            IdentifierOrder::CustomLast => vec![app, custom],
            IdentifierOrder::CustomFirst => vec![custom, app],
        }
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn begin(&self, packet: Packet) -> Option<Plan> {
        let mut shared = self.lock_shared();
        shared.packet = packet;
        if !shared.powered_on {
            debug!("radio not powered, packet stored");
            return None;
        }

        let needs_stop = shared.state != BroadcastState::Idle;
        shared.state = BroadcastState::Restarting;
        Some(Plan {
            generation: self.bump_generation(),
            needs_stop,
        })
    }

    fn power_changed(&self, power: PowerState) -> PowerAction {
        let mut shared = self.lock_shared();
        info!(?power, state = %shared.state, "radio power state changed");

        if power.is_powered_on() {
            shared.powered_on = true;
            if shared.state != BroadcastState::Idle {
                return PowerAction::Nothing;
            }
            shared.state = BroadcastState::Restarting;
            return PowerAction::Start(Plan {
                generation: self.bump_generation(),
                needs_stop: false,
            });
        }

        shared.powered_on = false;
        shared.on_air = None;
        let previous = std::mem::replace(&mut shared.state, BroadcastState::Idle);
        let generation = self.bump_generation();
        if previous == BroadcastState::Idle {
            PowerAction::Nothing
        } else {
            PowerAction::Stop { generation }
        }
    }

    fn superseded(&self, generation: u64) -> RestartOutcome {
        record_advertise_event(AdvertiseEvent::StaleCompletion);
        debug!(generation, current = self.generation.load(Ordering::SeqCst), "restart superseded");
        RestartOutcome::Superseded
    }

    #[instrument(name = "broadcaster_restart", skip_all, fields(generation = plan.generation))]
    async fn run(self: Arc<Self>, plan: Plan) -> Result<RestartOutcome, BroadcastError> {
        let _turn = self.restart_lock.lock().await;
        record_advertise_event(AdvertiseEvent::Restart);

        if plan.needs_stop {
            loop {
                if self.is_stale(plan.generation) {
                    return Ok(self.superseded(plan.generation));
                }
                match self.stop().await {
                    Ok(()) => break,
                    Err(e) => {
                        record_advertise_event(AdvertiseEvent::StopFailure);
                        warn!(
                            error = %e,
                            retry_in_ms = self.config.stop_retry_delay_ms,
                            "stop advertising failed, retrying restart"
                        );
                        sleep(self.config.stop_retry_delay()).await;
                    }
                }
            }
        }

        if self.is_stale(plan.generation) {
            return Ok(self.superseded(plan.generation));
        }
        self.start(plan.generation).await
    }

    /// Stop according to the restart policy
    async fn stop(self: &Arc<Self>) -> Result<(), ContractError> {
        match self.config.restart_policy {
            RestartPolicy::Sequential => self.radio.stop_advertising().await,
            RestartPolicy::Eager => {
                let inner = Arc::clone(self);
                let pending: JoinHandle<Result<(), ContractError>> =
                    tokio::spawn(async move { inner.radio.stop_advertising().await });

                let tick = self.config.restart_tick();
                if tick.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    sleep(tick).await;
                }

                if pending.is_finished() {
                    return pending
                        .await
                        .unwrap_or_else(|e| Err(ContractError::radio("stop_advertising", e.to_string())));
                }

                // Start goes ahead; the late stop result is only logged
                tokio::spawn(async move {
                    match pending.await {
                        Ok(Ok(())) => debug!("deferred stop completed"),
                        Ok(Err(e)) => warn!(error = %e, "deferred stop failed"),
                        Err(e) => warn!(error = %e, "deferred stop task failed"),
                    }
                });
                Ok(())
            }
        }
    }

    /// Start with the latest packet; only the current generation may commit
    async fn start(&self, generation: u64) -> Result<RestartOutcome, BroadcastError> {
        let packet = self.lock_shared().packet;
        let services = self.service_ids(&packet);
        let result = self
            .radio
            .start_advertising(self.config.local_name.as_deref(), &services)
            .await;

        let mut shared = self.lock_shared();
        if self.is_stale(generation) {
            drop(shared);
            return Ok(self.superseded(generation));
        }

        match result {
            Ok(()) => {
                shared.state = BroadcastState::Advertising;
                shared.on_air = Some(packet);
                info!(services = ?services, "advertising");
                Ok(RestartOutcome::Advertising { generation })
            }
            Err(source) => {
                shared.state = BroadcastState::Idle;
                shared.on_air = None;
                drop(shared);
                record_advertise_event(AdvertiseEvent::StartFailure);
                warn!(error = %source, services = ?services, "start advertising failed");
                Err(BroadcastError::StartFailed { generation, source })
            }
        }
    }
}
