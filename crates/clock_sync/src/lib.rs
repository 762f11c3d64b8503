//! # Clock Sync
//!
//! Remote control-surface clock → local clock conversion.
//!
//! 负责：
//! - 保存最近一次同步得到的 offset (`local - remote`)，每次同步直接覆盖
//! - 把操作员提供的 `startTime` 转换为本地时间
//! - 本地单调时钟与节拍计算
//!
//! ## 使用示例
//!
//! ```
//! use clock_sync::ClockSync;
//!
//! let sync = ClockSync::new();
//! sync.record_sync(1000.0, 100.0);
//! assert_eq!(sync.to_local(100.0), 1000.0);
//! ```

pub mod beat;
mod clock;
mod tracker;

pub use beat::{next_beat_offset, period_ms, BeatSchedule};
pub use clock::{LocalClock, ManualClock, MonotonicClock};
pub use tracker::ClockSync;
