//! Defines shared data structures for the Bluetooth module.

use bluest::Device;

/// Represents a discovered Bluetooth device
#[derive(Debug, Clone)]
pub struct BluetoothDevice {
    /// The advertised name of the device, if available
    pub name: Option<String>,
    /// The address of the device (MAC address on most platforms, "N/A" when the id carries none)
    pub address: String,
    /// Platform-specific unique identifier for the device
    pub id: String,
    /// The signal strength (RSSI) of the device
    pub rssi: Option<i16>,
}

impl BluetoothDevice {
    pub fn new(name: Option<String>, address: String, id: String, rssi: Option<i16>) -> Self {
        Self {
            name,
            address,
            id,
            rssi,
        }
    }
}

/// A peripheral connected during the session, kept so it can be disconnected at the end
#[derive(Clone)]
pub struct ConnectedPeripheral {
    /// The advertised name the peripheral was found under
    pub name: String,
    /// The device handle, used for disconnecting.
    pub device: Device,
}
