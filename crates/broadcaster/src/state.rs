//! Broadcaster state machine types

use std::fmt;

/// Advertising state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastState {
    /// Radio off, or the last start failed
    #[default]
    Idle,
    /// The current packet is on air
    Advertising,
    /// A stop/start sequence is in progress
    Restarting,
}

impl fmt::Display for BroadcastState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Advertising => "advertising",
            Self::Restarting => "restarting",
        };
        f.write_str(name)
    }
}

/// How a restart request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// Radio is not powered; the packet is stored for the next power-on
    Stored,
    /// Power event that needed no action
    Unchanged,
    /// This generation reached `Advertising`
    Advertising { generation: u64 },
    /// A newer request (or power change) took over; its completion was dropped
    Superseded,
}
