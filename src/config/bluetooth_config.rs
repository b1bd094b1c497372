use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::{
    CONNECT_RETRY_DELAY_MS, DEFAULT_SCAN_DURATION_SECS, MAX_CONNECT_RETRIES, RECEIVER_NAME,
    SENDER_NAME, UUID_RECEIVER_SERVICE, UUID_RECEIVER_WRITE_CHAR, UUID_SENDER_NOTIFY_CHAR,
    UUID_SENDER_SERVICE,
};

/// A peripheral addressed by advertised name and one characteristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeripheralConfig {
    /// Advertised name used during discovery
    pub name: String,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Peripheral whose notifications carry raw motor data
    pub sender: PeripheralConfig,
    /// Peripheral that accepts framed motor data
    pub receiver: PeripheralConfig,
    /// How long discovery runs before giving up, in seconds
    pub scan_duration_secs: u64,
    pub max_connect_retries: u32,
    pub connect_retry_delay_ms: u64,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        BluetoothConfig {
            sender: PeripheralConfig {
                name: SENDER_NAME.to_string(),
                service_uuid: UUID_SENDER_SERVICE,
                characteristic_uuid: UUID_SENDER_NOTIFY_CHAR,
            },
            receiver: PeripheralConfig {
                name: RECEIVER_NAME.to_string(),
                service_uuid: UUID_RECEIVER_SERVICE,
                characteristic_uuid: UUID_RECEIVER_WRITE_CHAR,
            },
            scan_duration_secs: DEFAULT_SCAN_DURATION_SECS,
            max_connect_retries: MAX_CONNECT_RETRIES,
            connect_retry_delay_ms: CONNECT_RETRY_DELAY_MS,
        }
    }
}
