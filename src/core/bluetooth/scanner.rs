use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use bluest::{Adapter, AdvertisingDevice, Device};
use futures_util::StreamExt;
use log::{debug, info};
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::types::BluetoothDevice;

/// Result of looking for a set of named peripherals
pub struct ScanOutcome {
    /// Requested peripherals that were found, keyed by advertised name
    pub found: HashMap<String, Device>,
    /// Every advertised name seen while scanning, for diagnostics
    pub seen: Vec<String>,
}

impl ScanOutcome {
    /// Requested names that were not found, in request order
    pub fn missing<'a>(&self, names: &[&'a str]) -> Vec<&'a str> {
        missing_names(names, &self.found)
    }
}

fn missing_names<'a, V>(names: &[&'a str], found: &HashMap<String, V>) -> Vec<&'a str> {
    names
        .iter()
        .copied()
        .filter(|n| !found.contains_key(*n))
        .collect()
}

pub struct BluetoothScanner {
    adapter: Adapter,
}

impl BluetoothScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Scans until every name in `names` has been seen, the scan duration
    /// elapses, or `cancel_token` fires.
    pub async fn find_named(
        &self,
        names: &[&str],
        duration: Duration,
        cancel_token: &CancellationToken,
    ) -> Result<ScanOutcome> {
        let mut outcome = ScanOutcome {
            found: HashMap::new(),
            seen: Vec::new(),
        };

        // find connected devices first
        info!("Checking for connected devices");
        for device in self.adapter.connected_devices().await? {
            if let Ok(name) = device.name() {
                if names.contains(&name.as_str()) {
                    info!("{} is already connected", name);
                    outcome.found.insert(name, device);
                }
            }
        }
        if outcome.missing(names).is_empty() {
            return Ok(outcome);
        }

        info!("Scanning for devices...");
        let mut scan_stream = self.adapter.scan(&[]).await?;
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    let Some(discovered) = result else {
                        info!("Bluetooth scan stream has ended.");
                        break;
                    };
                    let Some(name) = advertised_name(&discovered) else {
                        continue;
                    };
                    debug!("Found device - Name: {}, RSSI: {:?}", name, discovered.rssi);
                    if !outcome.seen.contains(&name) {
                        outcome.seen.push(name.clone());
                    }
                    if names.contains(&name.as_str()) && !outcome.found.contains_key(&name) {
                        info!("Found {} ({})", name, discovered.device.id());
                        outcome.found.insert(name, discovered.device);
                        if outcome.missing(names).is_empty() {
                            break;
                        }
                    }
                }
                _ = &mut deadline => {
                    info!("Scan duration elapsed.");
                    break;
                }
                _ = cancel_token.cancelled() => {
                    info!("Scan cancelled.");
                    break;
                }
            }
        }

        Ok(outcome)
    }

    /// Lists every advertising device seen during `duration`, or until `cancel_token` fires
    pub async fn list(
        &self,
        duration: Duration,
        cancel_token: &CancellationToken,
    ) -> Result<Vec<BluetoothDevice>> {
        let mut devices: HashMap<String, BluetoothDevice> = HashMap::new();
        let mut scan_stream = self.adapter.scan(&[]).await?;
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    let Some(discovered) = result else { break };
                    let id = discovered.device.id().to_string();
                    let address = extract_mac_address(&id).unwrap_or_else(|| "N/A".to_string());
                    let name = advertised_name(&discovered);
                    devices.insert(
                        id.clone(),
                        BluetoothDevice::new(name, address, id, discovered.rssi),
                    );
                }
                _ = &mut deadline => break,
                _ = cancel_token.cancelled() => {
                    info!("Scan cancelled.");
                    break;
                }
            }
        }

        let mut devices: Vec<BluetoothDevice> = devices.into_values().collect();
        devices.sort_by(|a, b| b.rssi.cmp(&a.rssi));
        Ok(devices)
    }
}

/// Name from the advertisement, falling back to the name the OS cached for the device
fn advertised_name(discovered: &AdvertisingDevice) -> Option<String> {
    discovered
        .adv_data
        .local_name
        .clone()
        .or_else(|| discovered.device.name().ok())
        .filter(|name| !name.is_empty())
}

fn extract_mac_address(device_id_str: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok()?;
    re.find_iter(device_id_str)
        .last()
        .map(|m| m.as_str().to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_address_is_extracted_from_platform_ids() {
        assert_eq!(
            extract_mac_address("/org/bluez/hci0/dev_aa:bb:cc:dd:ee:0f"),
            Some("AA:BB:CC:DD:EE:0F".to_string())
        );
        assert_eq!(
            extract_mac_address("BluetoothLE#BluetoothLE00:11:22:33:44:55-24:6f:28:aa:bb:cc"),
            Some("24:6F:28:AA:BB:CC".to_string())
        );
        assert_eq!(extract_mac_address("6F1C2A30-1111-2222-3333-444455556666"), None);
    }

    #[test]
    fn missing_names_keep_request_order() {
        let mut found = HashMap::new();
        found.insert("ESP32_Receiver".to_string(), ());

        let names = ["ESP32_Sender", "ESP32_Receiver", "ESP32_Spare"];
        assert_eq!(missing_names(&names, &found), vec!["ESP32_Sender", "ESP32_Spare"]);

        found.insert("ESP32_Sender".to_string(), ());
        found.insert("ESP32_Spare".to_string(), ());
        assert!(missing_names(&names, &found).is_empty());
    }

    #[test]
    fn empty_outcome_misses_every_name() {
        let outcome = ScanOutcome {
            found: HashMap::new(),
            seen: vec!["Other".to_string()],
        };
        assert_eq!(
            outcome.missing(&["ESP32_Sender", "ESP32_Receiver"]),
            vec!["ESP32_Sender", "ESP32_Receiver"]
        );
        assert!(outcome.missing(&[]).is_empty());
    }
}
