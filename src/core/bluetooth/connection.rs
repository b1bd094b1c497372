//! Bluetooth connection handling for the ESP32 peripherals
//! This module handles connecting to and disconnecting from a peripheral

use anyhow::{anyhow, Result};
use bluest::{Adapter, Characteristic, Device, Uuid};
use log::{info, warn};
use std::time::Duration;

/// Connection manager for the peripherals
#[derive(Clone)]
pub struct ConnectionManager {
    adapter: Adapter,
    max_retries: u32,
    retry_delay: u64,
}

impl ConnectionManager {
    pub fn new(adapter: Adapter, max_retries: u32, retry_delay: u64) -> Self {
        Self {
            adapter,
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// Connect to the peripheral with retry mechanism and return the requested characteristic
    pub async fn connect_with_retry(
        &self,
        device: &Device,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<Characteristic> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.try_connect(device, service_uuid, characteristic_uuid).await {
                Ok(characteristic) => {
                    info!("Successfully connected to device {}", device.id());
                    return Ok(characteristic);
                }
                Err(e) => {
                    warn!("Connection attempt {} failed: {}", attempt, e);
                    last_error = Some(e);

                    if attempt < self.max_retries {
                        info!("Retrying connection in {} ms...", self.retry_delay);
                        tokio::time::sleep(Duration::from_millis(self.retry_delay)).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to connect after {} attempts", self.max_retries)))
    }

    /// Try to connect to the peripheral once
    async fn try_connect(
        &self,
        device: &Device,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<Characteristic> {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let id = device.id().to_string();
        info!("Device details - ID: {}, Name: {:?}", id, name);

        if !device.is_connected().await {
            info!("Initiating connection to {}...", id);
            self.adapter.connect_device(device).await?;
        }

        info!("Connection successful, discovering services...");
        let services = device.discover_services_with_uuid(service_uuid).await?;
        let service = services
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Service not found: {}", service_uuid))?;
        info!("Found service: {}", service.uuid());

        let characteristic = service
            .discover_characteristics_with_uuid(characteristic_uuid)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Characteristic not found: {}", characteristic_uuid))?;
        info!("Found characteristic: {}", characteristic.uuid());

        Ok(characteristic)
    }

    /// Disconnect from the peripheral
    pub async fn disconnect(&self, device: &Device) -> Result<()> {
        if device.is_connected().await {
            info!("Disconnecting from device {}", device.id());
            self.adapter.disconnect_device(device).await?;
            info!("Successfully disconnected");
        } else {
            info!("Device {} not connected", device.id());
        }
        Ok(())
    }
}
