//! Frame writing to the receiver peripheral
//! Writes are fire-and-forget: nothing is read back from the receiver.

use anyhow::Result;
use bluest::Characteristic;
use log::{debug, info, warn};

use crate::core::frame::{HexBytes, MotorFrame};

/// Frame sender trait
#[async_trait::async_trait]
pub trait FrameSender: Send + Sync {
    /// Send one framed motor update to the receiver
    async fn send_frame(&self, frame: &MotorFrame) -> Result<()>;
}

#[async_trait::async_trait]
impl<T: FrameSender + ?Sized> FrameSender for std::sync::Arc<T> {
    async fn send_frame(&self, frame: &MotorFrame) -> Result<()> {
        (**self).send_frame(frame).await
    }
}

#[derive(Clone)]
pub struct BluestFrameSender {
    write_char: Characteristic,
    without_response: bool,
}

impl BluestFrameSender {
    /// Wraps the receiver's write characteristic, preferring write-without-response
    /// when the characteristic advertises it.
    pub async fn new(write_char: Characteristic) -> Self {
        let without_response = match write_char.properties().await {
            Ok(props) => props.write_without_response,
            Err(e) => {
                warn!("Could not read characteristic properties, using acknowledged writes: {}", e);
                false
            }
        };
        debug!(
            "Frame writes to {} use {}",
            write_char.uuid(),
            if without_response { "write-without-response" } else { "write" }
        );
        Self {
            write_char,
            without_response,
        }
    }
}

#[async_trait::async_trait]
impl FrameSender for BluestFrameSender {
    async fn send_frame(&self, frame: &MotorFrame) -> Result<()> {
        let data = frame.to_bytes();
        if self.without_response {
            self.write_char.write_without_response(&data).await?;
        } else {
            self.write_char.write(&data).await?;
        }
        info!("Sent: {}", HexBytes(&data));
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::core::frame::{FRAME_HEADER, FRAME_LEN};

    /// Records every frame instead of writing it to a peripheral
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSender {
        pub frames: Arc<Mutex<Vec<[u8; FRAME_LEN]>>>,
    }

    impl RecordingSender {
        pub fn sent(&self) -> Vec<[u8; FRAME_LEN]> {
            self.frames.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl FrameSender for RecordingSender {
        async fn send_frame(&self, frame: &MotorFrame) -> Result<()> {
            self.frames.lock().unwrap().push(frame.to_bytes());
            Ok(())
        }
    }

    #[tokio::test]
    async fn shared_sender_forwards_through_arc() {
        let recorder = RecordingSender::default();
        let shared: Arc<dyn FrameSender> = Arc::new(recorder.clone());
        shared.send_frame(&MotorFrame::new([3; 10])).await.unwrap();

        let sent = recorder.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][0], FRAME_HEADER);
    }
}
