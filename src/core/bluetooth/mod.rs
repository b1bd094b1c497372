//! Bluetooth functionality for the Droctopus bridge
//! This module handles all bluetooth operations including scanning,
//! connecting, relaying notifications and writing motor frames.

mod commands;
mod connection;
mod constants;
mod manager;
mod notification;
mod scanner;
mod types;

// Re-export types that should be publicly accessible
pub use commands::{BluestFrameSender, FrameSender};
pub use connection::ConnectionManager;
pub use constants::*; // Re-export all constants
pub use manager::BluetoothManager;
pub use notification::NotificationHandler;
pub use scanner::{BluetoothScanner, ScanOutcome};
pub use types::{BluetoothDevice, ConnectedPeripheral};
