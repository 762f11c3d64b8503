//! Radio traits - transport output interfaces
//!
//! The broadcaster drives an [`AdvertisingRadio`] (peripheral role), the
//! dispatcher drives one [`DeviceLink`] per registered device (central role).
//! Completion of each async call is the "completion callback" of the radio
//! stack.

use crate::{ContractError, Packet};

/// Adapter power state as reported by the radio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    PoweredOn,
    PoweredOff,
    Resetting,
    Unauthorized,
    Unsupported,
    Unknown,
}

impl PowerState {
    pub fn is_powered_on(self) -> bool {
        matches!(self, Self::PoweredOn)
    }
}

/// Peripheral-role advertising radio
#[trait_variant::make(AdvertisingRadio: Send)]
pub trait LocalAdvertisingRadio {
    /// Start advertising the given service identifiers, in list order
    ///
    /// # Errors
    /// Returns `RadioTransient` when the stack rejects the request
    async fn start_advertising(
        &self,
        local_name: Option<&str>,
        service_ids: &[String],
    ) -> Result<(), ContractError>;

    /// Stop advertising
    async fn stop_advertising(&self) -> Result<(), ContractError>;
}

/// Central-role link to one device's write characteristic
#[trait_variant::make(DeviceLink: Send)]
pub trait LocalDeviceLink {
    /// Open a connection to the device
    async fn connect(&self) -> Result<(), ContractError>;

    /// Write a packet to the cached characteristic
    async fn write(&self, packet: &Packet) -> Result<(), ContractError>;

    /// Close the connection
    async fn disconnect(&self) -> Result<(), ContractError>;
}
