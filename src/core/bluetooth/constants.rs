//! Constants used throughout the application
//! This module contains all the constant values used for talking to the
//! ESP32 peripherals, such as UUIDs, names, timeouts and intervals.

use uuid::Uuid;

/// Advertised name of the peripheral that produces motor data
pub const SENDER_NAME: &str = "ESP32_Sender";

/// Advertised name of the peripheral that drives the haptic motors
pub const RECEIVER_NAME: &str = "ESP32_Receiver";

/// Service exposed by the sender
pub const UUID_SENDER_SERVICE: Uuid = Uuid::from_u128(0x12345678_1234_1234_1234_1234567890ab);

/// Notification characteristic carrying raw motor data from the sender
pub const UUID_SENDER_NOTIFY_CHAR: Uuid = Uuid::from_u128(0xabcdefab_1234_5678_1234_abcdefabcdef);

/// Service exposed by the receiver
pub const UUID_RECEIVER_SERVICE: Uuid = Uuid::from_u128(0x87654321_4321_4321_4321_0987654321ba);

/// Write characteristic accepting framed motor data on the receiver
pub const UUID_RECEIVER_WRITE_CHAR: Uuid = Uuid::from_u128(0xfedcbafe_4321_8765_4321_fedcbafedcba);

/// Maximum number of connection retries
pub const MAX_CONNECT_RETRIES: u32 = 3;

/// Delay between connection retries in milliseconds
pub const CONNECT_RETRY_DELAY_MS: u64 = 1000;

/// Scan duration in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 5;

/// Interval between frames in keyboard arm control, in milliseconds
pub const FRAME_INTERVAL_MS: u64 = 100;
