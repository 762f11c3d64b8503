//! ShowState - Coordinator output
//!
//! The logical record a packet is built from. All times are milliseconds on
//! the coordinator's local clock.

use serde::{Deserialize, Serialize};

/// Upper bound of the `energy` parameter
pub const ENERGY_MAX: f64 = 1000.0;

/// Upper bound of the `attack` and `release` envelope parameters (ms)
pub const ENVELOPE_MAX_MS: f64 = 600.0;

/// Show state pushed to every lighting device
///
/// Field names follow the operator command payload (`startTime`, `bpm`, ...).
/// Missing fields deserialize to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShowState {
    /// Beat zero, local-clock milliseconds.
    ///
    /// Encoded as a signed 32-bit value, so it wraps roughly every 24 days
    /// of coordinator uptime.
    pub start_time: i64,

    /// Tempo in beats per minute (0-255 on the wire)
    pub bpm: f64,

    /// Palette index
    pub gradient: i32,

    /// Energy, 0-1000
    pub energy: f64,

    /// Attack time, 0-600 ms
    pub attack: f64,

    /// Release time, 0-600 ms
    pub release: f64,

    /// Visual program selector
    pub program: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_operator_payload() {
        let json = r#"{"startTime": 1200, "bpm": 128.5, "energy": 700, "program": 3}"#;
        let state: ShowState = serde_json::from_str(json).unwrap();

        assert_eq!(state.start_time, 1200);
        assert_eq!(state.bpm, 128.5);
        assert_eq!(state.energy, 700.0);
        assert_eq!(state.program, 3);
        // absent fields default to zero
        assert_eq!(state.gradient, 0);
        assert_eq!(state.attack, 0.0);
    }
}
