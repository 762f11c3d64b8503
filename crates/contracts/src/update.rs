//! Dispatch bookkeeping shared by the dispatcher and its callers.

use std::time::Duration;

use crate::{DeviceId, Packet};

/// Monotonically increasing id of a `send_packet` request
pub type UpdateId = u64;

/// Per-device update state
///
/// `Done`, `Aborted` and `Failed` are terminal for one invocation; the device
/// stays registered either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceUpdateState {
    Started,
    Connecting,
    Writing,
    Disconnecting,
    Done,
    Aborted,
    Failed,
}

impl DeviceUpdateState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Failed)
    }

    /// Radio step name used in errors and logs
    pub fn step_name(self) -> &'static str {
        match self {
            Self::Started => "start",
            Self::Connecting => "connect",
            Self::Writing => "write",
            Self::Disconnecting => "disconnect",
            Self::Done => "done",
            Self::Aborted => "abort",
            Self::Failed => "fail",
        }
    }
}

/// Terminal result of one per-device update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOutcome {
    /// Packet written and connection closed
    Done,
    /// Superseded by a newer update before any write happened
    Aborted,
    /// A radio step failed or timed out
    Failed { error: String },
    /// Not attempted because the retry policy quarantined the device
    Skipped,
}

impl DeviceOutcome {
    /// Label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Aborted => "aborted",
            Self::Failed { .. } => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Result of one fan-out batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Update the batch was launched for
    pub update_id: UpdateId,

    /// Packet the batch attempted to write
    pub packet: Packet,

    /// Outcome per device, in completion order
    pub outcomes: Vec<(DeviceId, DeviceOutcome)>,

    /// Wall time of the whole batch
    pub duration: Duration,
}

impl BatchReport {
    pub fn count(&self, label: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.label() == label)
            .count()
    }

    pub fn done(&self) -> usize {
        self.count("done")
    }

    pub fn aborted(&self) -> usize {
        self.count("aborted")
    }

    pub fn failed(&self) -> usize {
        self.count("failed")
    }

    /// Outcome for one device, if it took part in the batch
    pub fn outcome_for(&self, device: &str) -> Option<&DeviceOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id.as_str() == device)
            .map(|(_, outcome)| outcome)
    }
}
