//! Real BLE central backend (btleplug)
//!
//! 扫描带有指定服务的设备，首次发现时解析写入特征并断开连接，
//! 然后把设备链接交给调用方注册到分发器。

use std::collections::HashSet;

use btleplug::api::bleuuid::uuid_from_u16;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use contracts::{ContractError, DeviceId, DeviceLink, Packet};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

fn ble_error(operation: &str, err: btleplug::Error) -> ContractError {
    ContractError::radio(operation, err.to_string())
}

/// Parse a 16-bit short form ("b33d") or a full UUID
pub fn parse_uuid(id: &str) -> Result<Uuid, ContractError> {
    if id.len() == 4 {
        let short = u16::from_str_radix(id, 16)
            .map_err(|e| ContractError::Other(format!("invalid service id '{id}': {e}")))?;
        return Ok(uuid_from_u16(short));
    }
    Uuid::parse_str(id).map_err(|e| ContractError::Other(format!("invalid uuid '{id}': {e}")))
}

/// Link to one discovered device with its cached write characteristic
#[derive(Debug, Clone)]
pub struct BleDeviceLink {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

impl DeviceLink for BleDeviceLink {
    async fn connect(&self) -> Result<(), ContractError> {
        self.peripheral
            .connect()
            .await
            .map_err(|e| ble_error("connect", e))
    }

    async fn write(&self, packet: &Packet) -> Result<(), ContractError> {
        self.peripheral
            .write(&self.characteristic, packet.as_bytes(), WriteType::WithResponse)
            .await
            .map_err(|e| ble_error("write", e))
    }

    async fn disconnect(&self) -> Result<(), ContractError> {
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| ble_error("disconnect", e))
    }
}

/// First local adapter in the central role
pub struct BleCentral {
    adapter: Adapter,
}

impl BleCentral {
    /// Open the first Bluetooth adapter on the host
    pub async fn first_adapter() -> Result<Self, ContractError> {
        let manager = Manager::new()
            .await
            .map_err(|e| ble_error("open_manager", e))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| ble_error("list_adapters", e))?
            .into_iter()
            .next()
            .ok_or_else(|| ContractError::radio("list_adapters", "no bluetooth adapter found"))?;
        Ok(Self { adapter })
    }

    /// Scan until the receiver is dropped, sending each newly resolved device
    ///
    /// Devices whose characteristic cannot be resolved are logged and retried
    /// on their next discovery event.
    #[instrument(name = "ble_discovery", skip(self, devices))]
    pub async fn run_discovery(
        &self,
        scan_service_id: &str,
        write_characteristic_id: &str,
        devices: mpsc::Sender<(DeviceId, BleDeviceLink)>,
    ) -> Result<(), ContractError> {
        let service = parse_uuid(scan_service_id)?;
        let characteristic_uuid = parse_uuid(write_characteristic_id)?;

        let mut events = self
            .adapter
            .events()
            .await
            .map_err(|e| ble_error("events", e))?;
        self.adapter
            .start_scan(ScanFilter {
                services: vec![service],
            })
            .await
            .map_err(|e| ble_error("start_scan", e))?;
        info!(%service, "scanning for devices");

        let mut known: HashSet<String> = HashSet::new();
        while let Some(event) = events.next().await {
            let CentralEvent::DeviceDiscovered(peripheral_id) = event else {
                continue;
            };
            let key = peripheral_id.to_string();
            if known.contains(&key) {
                continue;
            }

            let peripheral = match self.adapter.peripheral(&peripheral_id).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(device = %key, error = %e, "peripheral lookup failed");
                    continue;
                }
            };

            match resolve_link(peripheral, characteristic_uuid).await {
                Ok(link) => {
                    known.insert(key.clone());
                    info!(device = %key, "device discovered");
                    if devices.send((DeviceId::from(key), link)).await.is_err() {
                        debug!("discovery receiver dropped, stopping scan");
                        break;
                    }
                }
                Err(e) => warn!(device = %key, error = %e, "characteristic resolution failed"),
            }
        }

        self.adapter
            .stop_scan()
            .await
            .map_err(|e| ble_error("stop_scan", e))
    }
}

async fn resolve_link(
    peripheral: Peripheral,
    characteristic_uuid: Uuid,
) -> Result<BleDeviceLink, ContractError> {
    peripheral
        .connect()
        .await
        .map_err(|e| ble_error("connect", e))?;

    let resolved = async {
        peripheral
            .discover_services()
            .await
            .map_err(|e| ble_error("discover_services", e))?;
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic_uuid)
            .ok_or_else(|| {
                ContractError::radio("discover_services", "write characteristic not found")
            })
    }
    .await;

    // 连接只用于解析特征，推送时再重新连接
    if let Err(e) = peripheral.disconnect().await {
        debug!(error = %e, "disconnect after discovery failed");
    }

    Ok(BleDeviceLink {
        characteristic: resolved?,
        peripheral,
    })
}
