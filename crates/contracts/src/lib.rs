//! # Contracts
//!
//! Frozen interface contracts shared by every beatcast crate.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - All times are milliseconds on the coordinator's local monotonic clock
//! - Remote (control surface) times are converted by `clock_sync` before they
//!   reach a [`ShowState`]

mod config;
mod device_id;
mod error;
mod packet;
mod radio;
mod show_state;
mod update;

pub use config::*;
pub use device_id::DeviceId;
pub use error::*;
pub use packet::{offsets, Packet, IDENTIFIER_LEN, PACKET_LEN};
pub use radio::{AdvertisingRadio, DeviceLink, LocalAdvertisingRadio, LocalDeviceLink, PowerState};
pub use show_state::{ShowState, ENERGY_MAX, ENVELOPE_MAX_MS};
pub use update::*;
