//! Bluetooth manager for the Droctopus bridge
//! This module provides the main interface for bluetooth operations

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use bluest::{Adapter, Characteristic, Device};
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::config::bluetooth_config::{BluetoothConfig, PeripheralConfig};
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::types::{BluetoothDevice, ConnectedPeripheral};

/// Manages Bluetooth operations
pub struct BluetoothManager {
    config: BluetoothConfig,
    /// Discovered peripherals keyed by advertised name
    devices: HashMap<String, Device>,
    /// Peripherals connected during this session
    connected: Vec<ConnectedPeripheral>,
    /// Connection manager
    connection_manager: ConnectionManager,
    /// Bluetooth scanner
    scanner: BluetoothScanner,
}

impl BluetoothManager {
    /// Creates a new BluetoothManager on the default adapter
    pub async fn new(config: BluetoothConfig) -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        let connection_manager = ConnectionManager::new(
            adapter.clone(),
            config.max_connect_retries,
            config.connect_retry_delay_ms,
        );
        let scanner = BluetoothScanner::new(adapter);

        Ok(Self {
            config,
            devices: HashMap::new(),
            connected: Vec::new(),
            connection_manager,
            scanner,
        })
    }

    fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.config.scan_duration_secs)
    }

    /// Finds every named peripheral or fails with the names seen so far
    pub async fn discover(&mut self, names: &[&str], cancel_token: &CancellationToken) -> Result<()> {
        let outcome = self
            .scanner
            .find_named(names, self.scan_duration(), cancel_token)
            .await?;

        let missing = outcome.missing(names);
        if !missing.is_empty() {
            error!("Could not find {}!", missing.join(", "));
            info!("Found devices so far: {:?}", outcome.seen);
            return Err(anyhow!(
                "Could not find {} (seen: {:?})",
                missing.join(", "),
                outcome.seen
            ));
        }

        for (name, device) in outcome.found {
            info!("{} at {}", name, device.id());
            self.devices.insert(name, device);
        }
        Ok(())
    }

    /// Connects to a discovered peripheral and returns its configured characteristic
    pub async fn connect(&mut self, peripheral: &PeripheralConfig) -> Result<Characteristic> {
        let device = self
            .devices
            .get(&peripheral.name)
            .cloned()
            .ok_or_else(|| anyhow!("Device not discovered: {}", peripheral.name))?;

        let characteristic = self
            .connection_manager
            .connect_with_retry(&device, peripheral.service_uuid, peripheral.characteristic_uuid)
            .await?;

        self.connected.push(ConnectedPeripheral {
            name: peripheral.name.clone(),
            device,
        });
        info!("Connected to {}!", peripheral.name);
        Ok(characteristic)
    }

    /// Lists advertising devices for the configured scan duration
    pub async fn list_devices(
        &self,
        cancel_token: &CancellationToken,
    ) -> Result<Vec<BluetoothDevice>> {
        self.scanner.list(self.scan_duration(), cancel_token).await
    }

    /// Disconnects every peripheral connected during this session
    pub async fn disconnect_all(&mut self) {
        for peripheral in self.connected.drain(..) {
            if let Err(e) = self.connection_manager.disconnect(&peripheral.device).await {
                error!("Failed to disconnect {}: {}", peripheral.name, e);
            }
        }
    }
}
