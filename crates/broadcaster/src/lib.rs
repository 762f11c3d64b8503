//! # Broadcaster
//!
//! 广播传输（peripheral 角色）。
//!
//! 负责：
//! - 把当前数据包编码为 32 位十六进制服务标识并随应用服务标识一起广播
//! - 数据包变化时按配置策略（eager / sequential）重启广播
//! - stop 失败时固定间隔无限重试，start 失败时报告给调用方
//! - 用 generation 计数器丢弃过期的完成回调
//!
//! ## 使用示例
//!
//! ```ignore
//! let broadcaster = Broadcaster::new(radio, config.advertise.clone());
//! broadcaster.on_power_state(PowerState::PoweredOn).await?;
//! tokio::spawn(broadcaster.set_packet(packet));
//! ```

mod broadcaster;
mod error;
mod state;

pub use broadcaster::Broadcaster;
pub use contracts::{AdvertisingRadio, PowerState};
pub use error::BroadcastError;
pub use state::{BroadcastState, RestartOutcome};
