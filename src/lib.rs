//! Droctopus bridge library
//! Relays haptic motor frames between the ESP32 peripherals, drives the robot
//! arm over serial and renders the terminal dashboard.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod dashboard;
pub mod logging;
pub mod mapping;
pub mod state;
pub mod utils;
