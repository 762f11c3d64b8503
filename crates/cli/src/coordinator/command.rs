//! Operator commands received as newline-delimited JSON.

use contracts::ShowState;
use serde::Deserialize;

use crate::error::Result;

/// One line from the control surface
///
/// ```text
/// {"cmd":"syncTime","data":{"clientTime":1700}}
/// {"cmd":"blecast","data":{"startTime":1800,"bpm":120,"energy":500}}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", content = "data")]
pub enum OperatorCommand {
    /// Clock sync round-trip, `clientTime` is the remote clock at send
    #[serde(rename = "syncTime")]
    SyncTime {
        #[serde(rename = "clientTime")]
        client_time: f64,
    },

    /// New show state, `startTime` is on the remote clock
    #[serde(rename = "blecast")]
    Blecast(ShowCommand),
}

impl OperatorCommand {
    /// Parse a single line
    pub fn parse(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SyncTime { .. } => "syncTime",
            Self::Blecast(_) => "blecast",
        }
    }
}

/// Show-state payload as the operator sends it
///
/// The control surface sends plain JSON numbers for every field; absent
/// fields are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShowCommand {
    pub start_time: f64,
    pub bpm: f64,
    pub gradient: f64,
    pub energy: f64,
    pub attack: f64,
    pub release: f64,
    pub program: f64,
}

impl ShowCommand {
    /// Build the show state with `start_time` already on the local clock
    pub fn into_show_state(self, start_time_local: i64) -> ShowState {
        ShowState {
            start_time: start_time_local,
            bpm: self.bpm,
            gradient: self.gradient as i32,
            energy: self.energy,
            attack: self.attack,
            release: self.release,
            program: self.program as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_time() {
        let cmd = OperatorCommand::parse(r#"{"cmd":"syncTime","data":{"clientTime":100}}"#).unwrap();
        assert_eq!(cmd, OperatorCommand::SyncTime { client_time: 100.0 });
        assert_eq!(cmd.name(), "syncTime");
    }

    #[test]
    fn test_parse_blecast_with_missing_fields() {
        let line = r#"{"cmd":"blecast","data":{"startTime":100,"bpm":120,"energy":500}}"#;
        let OperatorCommand::Blecast(show) = OperatorCommand::parse(line).unwrap() else {
            panic!("expected blecast");
        };
        assert_eq!(show.start_time, 100.0);
        assert_eq!(show.bpm, 120.0);
        assert_eq!(show.attack, 0.0);
        assert_eq!(show.program, 0.0);

        let state = show.into_show_state(1000);
        assert_eq!(state.start_time, 1000);
        assert_eq!(state.energy, 500.0);
    }

    #[test]
    fn test_parse_rejects_unknown_and_malformed() {
        assert!(OperatorCommand::parse(r#"{"cmd":"reboot","data":{}}"#).is_err());
        assert!(OperatorCommand::parse("not json").is_err());
        assert!(OperatorCommand::parse(r#"{"cmd":"syncTime"}"#).is_err());
    }

    #[test]
    fn test_parse_ignores_surrounding_whitespace() {
        let cmd =
            OperatorCommand::parse("  {\"cmd\":\"syncTime\",\"data\":{\"clientTime\":5.5}}\r\n")
                .unwrap();
        assert_eq!(cmd, OperatorCommand::SyncTime { client_time: 5.5 });
    }
}
