//! # Radio
//!
//! BLE radio backends for the two transports.
//!
//! Responsibilities:
//! - Scriptable mock radios (failure / delay injection, call recording)
//! - Simulated radios that only log, for running without hardware
//! - Real BLE central backend with device discovery
//!
//! ## Feature Flags
//!
//! - `real-ble`: Enable the btleplug central backend (connect transport only;
//!   btleplug has no peripheral role, so advertising stays simulated)

pub mod mock;
pub mod simulated;

#[cfg(feature = "real-ble")]
pub mod ble;

pub use contracts::{AdvertisingRadio, DeviceLink, PowerState};
pub use mock::{AdvertiserCall, ConcurrencyProbe, MockAdvertiser, MockDevice, MockDeviceConfig};
pub use simulated::{SimulatedAdvertiser, SimulatedDevice};

#[cfg(feature = "real-ble")]
pub use ble::{BleCentral, BleDeviceLink};
