//! Robot arm joint state
//! Joint angles are owned by a single controller task; key actions are sent to it
//! over a channel and every consumer observes the latest pose through a watch channel.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::core::frame::{MotorFrame, FRAME_HEADER, MOTOR_COUNT};

/// "All angle control" command id understood by the arm firmware
pub const ALL_ANGLE_CONTROL: u16 = 102;

/// Byte used in place of a data byte that would collide with the frame header
pub const HEADER_ESCAPE: u8 = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joint {
    Base,
    Shoulder,
    Elbow,
    Hand,
}

impl Joint {
    pub const ALL: [Joint; 4] = [Joint::Base, Joint::Shoulder, Joint::Elbow, Joint::Hand];

    pub fn label(&self) -> &'static str {
        match self {
            Joint::Base => "Base",
            Joint::Shoulder => "Shoulder",
            Joint::Elbow => "Elbow",
            Joint::Hand => "Hand",
        }
    }
}

/// Base, shoulder, elbow and hand angles in radians
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointAngles {
    pub base: f64,
    pub shoulder: f64,
    pub elbow: f64,
    pub hand: f64,
}

impl Default for JointAngles {
    fn default() -> Self {
        Self {
            base: 0.0,
            shoulder: 0.0,
            elbow: 1.57,
            hand: 3.14,
        }
    }
}

impl JointAngles {
    pub fn get(&self, joint: Joint) -> f64 {
        match joint {
            Joint::Base => self.base,
            Joint::Shoulder => self.shoulder,
            Joint::Elbow => self.elbow,
            Joint::Hand => self.hand,
        }
    }

    fn get_mut(&mut self, joint: Joint) -> &mut f64 {
        match joint {
            Joint::Base => &mut self.base,
            Joint::Shoulder => &mut self.shoulder,
            Joint::Elbow => &mut self.elbow,
            Joint::Hand => &mut self.hand,
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.base, self.shoulder, self.elbow, self.hand]
    }

    pub fn clamped(&self, limit: f64) -> Self {
        Self {
            base: self.base.clamp(-limit, limit),
            shoulder: self.shoulder.clamp(-limit, limit),
            elbow: self.elbow.clamp(-limit, limit),
            hand: self.hand.clamp(-limit, limit),
        }
    }

    /// Moves one joint by `delta`, staying inside `[-limit, limit]`
    pub fn step(&mut self, joint: Joint, delta: f64, limit: f64) -> f64 {
        let angle = self.get_mut(joint);
        *angle = (*angle + delta).clamp(-limit, limit);
        *angle
    }

    /// Encodes the pose as a motor frame: each joint drives an antagonistic
    /// motor pair (negated angle, angle); the last two motors stay off.
    pub fn to_frame(&self, limit: f64) -> MotorFrame {
        let mut values = [0u8; MOTOR_COUNT];
        for (i, angle) in self.as_array().into_iter().enumerate() {
            values[2 * i] = angle_to_byte(-angle, limit);
            values[2 * i + 1] = angle_to_byte(angle, limit);
        }
        MotorFrame::new(values)
    }
}

/// Maps an angle in `[-limit, limit]` linearly onto `0..=255`.
/// The header value is never produced so arm frames stay unambiguous.
pub fn angle_to_byte(angle: f64, limit: f64) -> u8 {
    let scaled = (255.0 * (angle + limit) / (2.0 * limit)).trunc();
    let value = scaled.clamp(0.0, 255.0) as u8;
    if value == FRAME_HEADER {
        HEADER_ESCAPE
    } else {
        value
    }
}

/// Serial command for the arm, serialised as one JSON object per line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmCommand {
    #[serde(rename = "T")]
    pub command_type: u16,
    pub base: f64,
    pub shoulder: f64,
    pub elbow: f64,
    pub hand: f64,
    pub spd: u32,
    pub acc: u32,
}

impl ArmCommand {
    pub fn all_angles(angles: &JointAngles, spd: u32, acc: u32) -> Self {
        Self {
            command_type: ALL_ANGLE_CONTROL,
            base: angles.base,
            shoulder: angles.shoulder,
            elbow: angles.elbow,
            hand: angles.hand,
            spd,
            acc,
        }
    }
}

/// What a key press asks the arm to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArmAction {
    Increase(Joint),
    Decrease(Joint),
    Quit,
}

impl ArmAction {
    /// Keyboard layout: W/S shoulder, A/D base, Q/E elbow, T/G hand, X quits
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'w' => Some(Self::Increase(Joint::Shoulder)),
            's' => Some(Self::Decrease(Joint::Shoulder)),
            'a' => Some(Self::Decrease(Joint::Base)),
            'd' => Some(Self::Increase(Joint::Base)),
            'q' => Some(Self::Increase(Joint::Elbow)),
            'e' => Some(Self::Decrease(Joint::Elbow)),
            't' => Some(Self::Increase(Joint::Hand)),
            'g' => Some(Self::Decrease(Joint::Hand)),
            'x' => Some(Self::Quit),
            _ => None,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Increase(Joint::Shoulder) => "Shoulder up",
            Self::Decrease(Joint::Shoulder) => "Shoulder down",
            Self::Decrease(Joint::Base) => "Base rotate left",
            Self::Increase(Joint::Base) => "Base rotate right",
            Self::Increase(Joint::Elbow) => "Elbow up",
            Self::Decrease(Joint::Elbow) => "Elbow down",
            Self::Increase(Joint::Hand) => "Hand rotate open",
            Self::Decrease(Joint::Hand) => "Hand rotate close",
            Self::Quit => "Exiting keyboard control...",
        }
    }
}

pub const KEYBOARD_HELP: &str =
    "Keyboard control active (W/S: Shoulder, A/D: Base, Q/E: Elbow, T/G: Hand, X: Quit)";

/// A clonable handle that sends actions to the arm controller task.
#[derive(Clone)]
pub struct ArmControllerSender {
    tx: mpsc::Sender<ArmAction>,
}

impl ArmControllerSender {
    pub async fn send(&self, action: ArmAction) -> anyhow::Result<()> {
        self.tx.send(action).await?;
        Ok(())
    }
}

/// Sole owner of the joint angles
pub struct ArmController {
    angles: JointAngles,
    step: f64,
    limit: f64,
}

impl ArmController {
    pub fn new(initial: JointAngles, step: f64, limit: f64) -> Self {
        Self {
            angles: initial.clamped(limit),
            step,
            limit,
        }
    }

    /// Applies an action; returns false when the action ends the session
    pub fn apply(&mut self, action: ArmAction) -> bool {
        let (joint, delta) = match action {
            ArmAction::Increase(joint) => (joint, self.step),
            ArmAction::Decrease(joint) => (joint, -self.step),
            ArmAction::Quit => {
                info!("{}", action.describe());
                return false;
            }
        };
        let angle = self.angles.step(joint, delta, self.limit);
        info!("{}: {:.2}", action.describe(), angle);
        true
    }

    pub fn angles(&self) -> JointAngles {
        self.angles
    }

    /// Moves the controller onto its own task.
    /// The task ends on `Quit` (cancelling `cancel_token`) or when the token is cancelled.
    pub fn spawn(
        mut self,
        cancel_token: CancellationToken,
    ) -> (ArmControllerSender, watch::Receiver<JointAngles>) {
        let (tx, mut rx) = mpsc::channel(32);
        let (angles_tx, angles_rx) = watch::channel(self.angles);

        tokio::spawn(async move {
            debug!("Arm controller task started.");
            loop {
                tokio::select! {
                    action = rx.recv() => {
                        let Some(action) = action else { break };
                        if !self.apply(action) {
                            cancel_token.cancel();
                            break;
                        }
                        angles_tx.send_if_modified(|current| {
                            let changed = *current != self.angles;
                            *current = self.angles;
                            changed
                        });
                    }
                    _ = cancel_token.cancelled() => break,
                }
            }
            debug!("Arm controller task stopped.");
        });

        (ArmControllerSender { tx }, angles_rx)
    }
}
