//! Motor frame encoding and validation
//! A frame is a constant header byte followed by one intensity byte per haptic motor.

use std::fmt;
use std::num::IntErrorKind;
use std::str::FromStr;

use thiserror::Error;

/// Header byte that starts every frame sent to the receiver
pub const FRAME_HEADER: u8 = 0xAA;

/// Number of haptic motors driven by one frame
pub const MOTOR_COUNT: usize = 10;

/// Total frame length on the wire (header + payload)
pub const FRAME_LEN: usize = MOTOR_COUNT + 1;

/// Reasons a frame or an input line is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("You must enter exactly 10 integers.")]
    WrongCount(usize),
    #[error("Please enter only valid integers.")]
    NotInteger(String),
    #[error("Integers must be between 0 and 255.")]
    OutOfRange(String),
    #[error("Expected {expected} bytes, got {actual}")]
    BadLength { expected: usize, actual: usize },
    #[error("Frame header must be 0xAA, got 0x{0:02X}")]
    BadHeader(u8),
}

/// Intensities for the ten haptic motors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorFrame([u8; MOTOR_COUNT]);

impl MotorFrame {
    pub fn new(values: [u8; MOTOR_COUNT]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[u8; MOTOR_COUNT] {
        &self.0
    }

    /// Wire representation: header followed by the motor values
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[0] = FRAME_HEADER;
        bytes[1..].copy_from_slice(&self.0);
        bytes
    }

    /// Builds a frame from an unframed payload chunk
    pub fn from_chunk(chunk: &[u8]) -> Result<Self, FrameError> {
        let values: [u8; MOTOR_COUNT] = chunk.try_into().map_err(|_| FrameError::BadLength {
            expected: MOTOR_COUNT,
            actual: chunk.len(),
        })?;
        Ok(Self(values))
    }

    /// Parses a complete frame including its header
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != FRAME_LEN {
            return Err(FrameError::BadLength {
                expected: FRAME_LEN,
                actual: bytes.len(),
            });
        }
        if bytes[0] != FRAME_HEADER {
            return Err(FrameError::BadHeader(bytes[0]));
        }
        Self::from_chunk(&bytes[1..])
    }
}

impl FromStr for MotorFrame {
    type Err = FrameError;

    /// Parses a line of whitespace separated integers typed at the prompt
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != MOTOR_COUNT {
            return Err(FrameError::WrongCount(tokens.len()));
        }

        // An integer too large for i64 is still an integer, just out of range
        let numbers = tokens
            .iter()
            .map(|t| match t.parse::<i64>() {
                Ok(n) => Ok(Some(n)),
                Err(e)
                    if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) =>
                {
                    Ok(None)
                }
                Err(_) => Err(FrameError::NotInteger(t.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut values = [0u8; MOTOR_COUNT];
        for ((slot, n), token) in values.iter_mut().zip(numbers).zip(&tokens) {
            *slot = n
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| FrameError::OutOfRange(token.to_string()))?;
        }
        Ok(Self(values))
    }
}

/// Formats bytes the way frames are logged: `[0xaa, 0x01, ...]`
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "0x{:02x}", b)?;
        }
        write!(f, "]")
    }
}
