//! # Dispatcher
//!
//! 连接分发模块（central 角色）。
//!
//! 负责：
//! - 维护设备注册表，设备失败后仍保留，等待下一个数据包自愈
//! - 合并快速连续的 `send_packet`，只推送最新的数据包
//! - 以有限并发 fan-out 到每个设备，每个无线电步骤独立超时

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;

pub use contracts::{BatchReport, DeviceLink, DeviceOutcome, UpdateId};
pub use dispatcher::Dispatcher;
pub use error::DispatcherError;
pub use handle::{DeviceHandle, DeviceRegistry};
pub use metrics::{DeviceMetrics, MetricsSnapshot};
