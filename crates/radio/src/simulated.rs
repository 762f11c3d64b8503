//! Simulated radios - log every call via tracing and always succeed
//!
//! Used by the coordinator when no BLE hardware backend is available.

use contracts::{AdvertisingRadio, ContractError, DeviceLink, Packet};
use tracing::{info, instrument};

/// Advertiser that only logs what it would put on air
pub struct SimulatedAdvertiser {
    name: String,
}

impl SimulatedAdvertiser {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl AdvertisingRadio for SimulatedAdvertiser {
    #[instrument(name = "sim_start_advertising", skip(self, service_ids), fields(radio = %self.name))]
    async fn start_advertising(
        &self,
        local_name: Option<&str>,
        service_ids: &[String],
    ) -> Result<(), ContractError> {
        info!(
            local_name = local_name.unwrap_or("-"),
            services = ?service_ids,
            "advertising"
        );
        Ok(())
    }

    #[instrument(name = "sim_stop_advertising", skip(self), fields(radio = %self.name))]
    async fn stop_advertising(&self) -> Result<(), ContractError> {
        info!("advertising stopped");
        Ok(())
    }
}

/// Device link that logs each step of a push
pub struct SimulatedDevice {
    name: String,
}

impl SimulatedDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl DeviceLink for SimulatedDevice {
    async fn connect(&self) -> Result<(), ContractError> {
        info!(device = %self.name, "connected");
        Ok(())
    }

    #[instrument(name = "sim_device_write", skip(self, packet), fields(device = %self.name))]
    async fn write(&self, packet: &Packet) -> Result<(), ContractError> {
        info!(packet = ?packet, "packet written");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ContractError> {
        info!(device = %self.name, "disconnected");
        Ok(())
    }
}
