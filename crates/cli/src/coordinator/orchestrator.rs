//! Coordinator - owns the clock offset and the active transport.
//!
//! Every `blecast` command goes through the same steps: convert the remote
//! start time to the local clock, encode the show state, hand the packet to
//! the transport. Neither transport blocks the command loop.

use std::sync::Arc;
use std::time::Duration;

use broadcaster::Broadcaster;
use clock_sync::{BeatSchedule, ClockSync, LocalClock};
use contracts::{AdvertisingRadio, BatchReport, DeviceLink, Packet, UpdateId};
use dispatcher::Dispatcher;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{CoordinatorStats, OperatorCommand, ShowCommand};

/// Shortest gap between two beat log lines
const MIN_BEAT_WAIT: Duration = Duration::from_millis(1);

/// Transport selected at startup
pub enum Transport<A, L> {
    /// Peripheral role: the packet rides in our advertisement
    Advertise(Broadcaster<A>),
    /// Central role: connect to every device and write the packet
    Connect(Dispatcher<L>),
}

impl<A, L> Transport<A, L> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Advertise(_) => "advertise",
            Self::Connect(_) => "connect",
        }
    }
}

/// Operator command handler
pub struct Coordinator<A, L> {
    clock: Arc<dyn LocalClock>,
    sync: ClockSync,
    transport: Transport<A, L>,
    beat_task: Option<JoinHandle<()>>,
    last_packet: Option<Packet>,
    last_recorded: UpdateId,
    started: Instant,
    stats: CoordinatorStats,
}

impl<A, L> Coordinator<A, L>
where
    A: AdvertisingRadio + Send + Sync + 'static,
    L: DeviceLink + Send + Sync + 'static,
{
    pub fn new(clock: Arc<dyn LocalClock>, transport: Transport<A, L>) -> Self {
        Self {
            clock,
            sync: ClockSync::new(),
            transport,
            beat_task: None,
            last_packet: None,
            last_recorded: 0,
            started: Instant::now(),
            stats: CoordinatorStats::default(),
        }
    }

    pub fn clock_sync(&self) -> &ClockSync {
        &self.sync
    }

    pub fn transport(&self) -> &Transport<A, L> {
        &self.transport
    }

    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    /// Last packet handed to the transport
    pub fn last_packet(&self) -> Option<Packet> {
        self.last_packet
    }

    /// Batch reports of the connect transport
    pub fn subscribe_reports(&self) -> Option<watch::Receiver<Option<Arc<BatchReport>>>> {
        match &self.transport {
            Transport::Connect(dispatcher) => Some(dispatcher.subscribe_reports()),
            Transport::Advertise(_) => None,
        }
    }

    /// Handle one raw operator line
    ///
    /// Malformed or unknown commands are logged and skipped. Returns the
    /// packet when the line produced one.
    pub fn handle_line(&mut self, line: &str) -> Option<Packet> {
        if line.trim().is_empty() {
            return None;
        }
        self.stats.lines_received += 1;

        match OperatorCommand::parse(line) {
            Ok(command) => self.handle_command(command),
            Err(e) => {
                self.stats.lines_rejected += 1;
                warn!(error = %e, line = line.trim(), "Skipping operator line");
                None
            }
        }
    }

    pub fn handle_command(&mut self, command: OperatorCommand) -> Option<Packet> {
        debug!(cmd = command.name(), "Operator command");
        match command {
            OperatorCommand::SyncTime { client_time } => {
                let offset = self.sync.record_sync(self.clock.now_ms(), client_time);
                self.stats.syncs += 1;
                info!(offset_ms = offset, "Clock synced");
                None
            }
            OperatorCommand::Blecast(show) => Some(self.blecast(show)),
        }
    }

    fn blecast(&mut self, show: ShowCommand) -> Packet {
        let start_time = self.sync.to_local(show.start_time).floor() as i64;
        let state = show.into_show_state(start_time);
        let packet = packet_codec::encode(&state);

        let transport = self.transport.label();
        info!(
            transport,
            identifier = %packet_codec::to_identifier(&packet),
            start_time,
            bpm = state.bpm,
            "Sending show state"
        );
        observability::record_packet_requested(transport);
        self.stats.packets_requested += 1;

        match &self.transport {
            Transport::Advertise(broadcaster) => {
                let restart = broadcaster.set_packet(packet);
                tokio::spawn(async move {
                    match restart.await {
                        Ok(outcome) => debug!(?outcome, "Advertise restart finished"),
                        Err(e) => warn!(error = %e, "Advertise restart failed"),
                    }
                });
            }
            Transport::Connect(dispatcher) => {
                let update_id = dispatcher.send_packet(packet);
                debug!(update_id, "Batch requested");
            }
        }

        self.last_packet = Some(packet);
        self.restart_beat_log(start_time as f64, state.bpm);
        packet
    }

    fn restart_beat_log(&mut self, start_time: f64, bpm: f64) {
        if let Some(task) = self.beat_task.take() {
            task.abort();
        }
        match BeatSchedule::new(start_time, bpm) {
            Some(schedule) => {
                let clock = Arc::clone(&self.clock);
                self.beat_task = Some(tokio::spawn(log_beats(schedule, clock)));
            }
            None => debug!(bpm, "No beat grid for this tempo"),
        }
    }

    /// Fold a connect-transport batch report into the run statistics
    pub fn record_report(&mut self, report: &BatchReport) {
        if report.update_id <= self.last_recorded {
            return;
        }
        self.last_recorded = report.update_id;
        self.stats.dispatch.update(report);
    }

    /// Stop the beat log and drain the dispatcher
    pub async fn shutdown(mut self) -> CoordinatorStats {
        if let Some(task) = self.beat_task.take() {
            task.abort();
        }

        if let Transport::Connect(dispatcher) = self.transport {
            let reports = dispatcher.subscribe_reports();
            dispatcher.shutdown().await;
            let last = reports.borrow().clone();
            if let Some(report) = last {
                if report.update_id > self.last_recorded {
                    self.last_recorded = report.update_id;
                    self.stats.dispatch.update(&report);
                }
            }
        }

        self.stats.duration = self.started.elapsed();
        self.stats
    }
}

/// Log every beat of the schedule until aborted
async fn log_beats(schedule: BeatSchedule, clock: Arc<dyn LocalClock>) {
    let period = Duration::try_from_secs_f64(schedule.period_ms() / 1000.0)
        .unwrap_or(Duration::MAX)
        .max(MIN_BEAT_WAIT);

    loop {
        let now = clock.now_ms();
        let mut wait = schedule.next_beat_in(now);
        let mut beat = schedule.next_beat_index(now);
        if wait.is_zero() {
            // already on a beat, log the following one
            wait = period;
            beat += 1;
        }
        tokio::time::sleep(wait.max(MIN_BEAT_WAIT)).await;
        debug!(beat, "Beat");
    }
}
