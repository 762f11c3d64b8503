//! BeatcastConfig - Config Loader output
//!
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete coordinator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatcastConfig {
    /// Configuration version
    pub version: ConfigVersion,

    /// Coordinator settings
    pub coordinator: CoordinatorConfig,

    /// Peripheral-role transport settings
    pub advertise: AdvertiseConfig,

    /// Central-role transport settings
    pub connect: ConnectConfig,
}

/// Which transport carries packets to the devices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Embed the packet in our own advertisement
    #[default]
    Advertise,
    /// Connect to every known device and write the packet
    Connect,
}

/// Coordinator settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Active transport
    pub transport: TransportMode,

    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Position of the packet identifier in the advertised service list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierOrder {
    /// `[app_service_id, packet_id]`
    #[default]
    CustomLast,
    /// `[packet_id, app_service_id]`
    CustomFirst,
}

/// How the broadcaster sequences stop/start on a packet change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Issue stop, do not wait for it, start after a deferred tick
    Eager,
    /// Issue stop, wait for its completion, then start
    #[default]
    Sequential,
}

/// Advertisement broadcaster settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvertiseConfig {
    /// Static application service identifier advertised next to the packet
    pub app_service_id: String,

    /// Advertised local name (None = no name)
    pub local_name: Option<String>,

    /// Position of the packet identifier in the service list
    pub identifier_order: IdentifierOrder,

    /// Restart sequencing
    pub restart_policy: RestartPolicy,

    /// Delay between stop and start under the eager policy (ms)
    pub restart_tick_ms: u64,

    /// Delay before retrying a restart whose stop failed (ms)
    pub stop_retry_delay_ms: u64,
}

impl AdvertiseConfig {
    pub fn restart_tick(&self) -> Duration {
        Duration::from_millis(self.restart_tick_ms)
    }

    pub fn stop_retry_delay(&self) -> Duration {
        Duration::from_millis(self.stop_retry_delay_ms)
    }
}

impl Default for AdvertiseConfig {
    fn default() -> Self {
        Self {
            app_service_id: "b0ef".to_string(),
            local_name: None,
            identifier_order: IdentifierOrder::CustomLast,
            restart_policy: RestartPolicy::Sequential,
            restart_tick_ms: 0,
            stop_retry_delay_ms: 1000,
        }
    }
}

/// What to do with devices that keep failing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DeviceRetryPolicy {
    /// Retry every device on every batch
    #[default]
    Always,
    /// Skip a device after this many consecutive failures, until it is
    /// registered again
    SkipAfter { failures: u32 },
}

/// Fan-out dispatcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Maximum simultaneous per-device operations
    pub max_concurrency: usize,

    /// Timeout of each connect / write / disconnect step (ms)
    pub step_timeout_ms: u64,

    /// Failure handling per device
    pub retry_policy: DeviceRetryPolicy,

    /// Service identifier devices are discovered by
    pub scan_service_id: String,

    /// Characteristic the packet is written to
    pub write_characteristic_id: String,
}

impl ConnectConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            step_timeout_ms: 1000,
            retry_policy: DeviceRetryPolicy::Always,
            scan_service_id: "b33d".to_string(),
            write_characteristic_id: "b00d".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let config = BeatcastConfig::default();
        assert_eq!(config.coordinator.transport, TransportMode::Advertise);
        assert_eq!(config.advertise.stop_retry_delay(), Duration::from_millis(1000));
        assert_eq!(config.connect.max_concurrency, 5);
        assert_eq!(config.connect.step_timeout(), Duration::from_millis(1000));
        assert_eq!(config.connect.retry_policy, DeviceRetryPolicy::Always);
    }

    #[test]
    fn test_retry_policy_serde() {
        let policy: DeviceRetryPolicy =
            serde_json::from_str(r#"{"kind": "skip_after", "failures": 3}"#).unwrap();
        assert_eq!(policy, DeviceRetryPolicy::SkipAfter { failures: 3 });

        let policy: DeviceRetryPolicy = serde_json::from_str(r#"{"kind": "always"}"#).unwrap();
        assert_eq!(policy, DeviceRetryPolicy::Always);
    }
}
