//! Core functionality for the Droctopus bridge
//! Frame encoding, the relay buffer, arm state, and the BLE and serial transports.

pub mod arm;
pub mod bluetooth;
pub mod frame;
pub mod relay;
pub mod serial;

// Re-export commonly used types
pub use bluetooth::BluetoothManager;
pub use frame::{FrameError, MotorFrame};
