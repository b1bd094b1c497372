//! Receive buffer for the sender → receiver relay
//! Notifications arrive in arbitrary sizes; they are accumulated and cut into motor frames.

use crate::core::frame::{MotorFrame, MOTOR_COUNT};

/// Byte accumulator drained in fixed-size motor chunks
#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    data: Vec<u8>,
}

impl ReceiveBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Removes every complete chunk from the front of the buffer.
    /// Fewer than `MOTOR_COUNT` bytes remain afterwards.
    pub fn drain_frames(&mut self) -> Vec<MotorFrame> {
        let complete = self.data.len() - self.data.len() % MOTOR_COUNT;
        let frames = self.data[..complete]
            .chunks_exact(MOTOR_COUNT)
            .filter_map(|chunk| MotorFrame::from_chunk(chunk).ok())
            .collect();
        self.data.drain(..complete);
        frames
    }

    /// Bytes waiting for the rest of their chunk
    pub fn pending(&self) -> usize {
        self.data.len()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_notifications_wait_for_a_full_chunk() {
        let mut buffer = ReceiveBuffer::new();
        buffer.extend(&[1, 2, 3, 4]);
        assert!(buffer.drain_frames().is_empty());
        assert_eq!(buffer.pending(), 4);

        buffer.extend(&[5, 6, 7, 8, 9, 10, 11]);
        let frames = buffer.drain_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].values(), &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(buffer.pending(), 1);
    }

    #[test]
    fn drain_consumes_whole_chunks_only() {
        let mut buffer = ReceiveBuffer::new();
        for len in [0usize, 9, 10, 19, 20, 35] {
            buffer.clear();
            buffer.extend(&vec![7u8; len]);
            let frames = buffer.drain_frames();
            assert_eq!(frames.len(), len / MOTOR_COUNT);
            assert_eq!(buffer.pending(), len % MOTOR_COUNT);
        }
    }

    #[test]
    fn chunks_keep_arrival_order() {
        let mut buffer = ReceiveBuffer::new();
        let bytes: Vec<u8> = (0..25).collect();
        buffer.extend(&bytes);
        let frames = buffer.drain_frames();
        assert_eq!(frames[0].values()[0], 0);
        assert_eq!(frames[1].values()[0], 10);
        assert_eq!(buffer.pending(), 5);

        buffer.extend(&[25, 26, 27, 28, 29]);
        let frames = buffer.drain_frames();
        assert_eq!(frames[0].values(), &[20, 21, 22, 23, 24, 25, 26, 27, 28, 29]);
        assert_eq!(buffer.pending(), 0);
    }
}
