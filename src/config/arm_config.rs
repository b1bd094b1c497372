use serde::{Deserialize, Serialize};

use crate::core::arm::JointAngles;
use crate::core::bluetooth::FRAME_INTERVAL_MS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    /// Baud rate of the arm's serial port
    pub baud_rate: u32,
    /// Radians added or removed per key press
    pub step: f64,
    /// Joint angles are kept within `[-angle_limit, angle_limit]`
    pub angle_limit: f64,
    /// `spd` field of every serial command
    pub speed: u32,
    /// `acc` field of every serial command
    pub acceleration: u32,
    /// Pose sent when the serial link is opened
    pub initial_pose: JointAngles,
    /// Interval between pose frames written to the receiver, in milliseconds
    pub frame_interval_ms: u64,
}

impl Default for ArmConfig {
    fn default() -> Self {
        ArmConfig {
            baud_rate: 115_200,
            step: 0.1,
            angle_limit: 3.14,
            speed: 0,
            acceleration: 10,
            initial_pose: JointAngles::default(),
            frame_interval_ms: FRAME_INTERVAL_MS,
        }
    }
}
