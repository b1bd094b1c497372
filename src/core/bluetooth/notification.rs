//! Notification handling for the sender peripheral
//! Raw notification payloads are buffered, cut into motor frames and forwarded
//! to the receiver.

use anyhow::Result;
use bluest::Characteristic;
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::commands::FrameSender;
use crate::core::frame::MotorFrame;
use crate::core::relay::ReceiveBuffer;

/// Relays sender notifications to the receiver
pub struct NotificationHandler<S: FrameSender> {
    frame_sender: S,
    buffer: ReceiveBuffer,
    /// Last frame forwarded to the receiver
    last_frame: watch::Sender<MotorFrame>,
}

impl<S: FrameSender> NotificationHandler<S> {
    pub fn new(frame_sender: S) -> (Self, watch::Receiver<MotorFrame>) {
        let (last_frame, last_frame_rx) = watch::channel(MotorFrame::default());
        let handler = Self {
            frame_sender,
            buffer: ReceiveBuffer::new(),
            last_frame,
        };
        (handler, last_frame_rx)
    }

    /// Buffers one notification payload and forwards every complete frame.
    /// Returns the number of frames forwarded.
    pub async fn handle_notification(&mut self, data: &[u8]) -> usize {
        info!("Received from sender: {:?}", data);
        self.buffer.extend(data);

        let mut forwarded = 0;
        for frame in self.buffer.drain_frames() {
            match self.frame_sender.send_frame(&frame).await {
                Ok(()) => {
                    forwarded += 1;
                    self.last_frame.send_replace(frame);
                }
                Err(e) => error!("Failed to forward frame to receiver: {}", e),
            }
        }
        if self.buffer.pending() > 0 {
            debug!("{} bytes waiting for the rest of their frame", self.buffer.pending());
        }
        forwarded
    }

    /// Subscribes to the sender's notifications and relays them until the stream
    /// ends or `cancel_token` fires. Partial data is dropped when the relay stops.
    pub async fn run(&mut self, notify_char: Characteristic, cancel_token: CancellationToken) -> Result<()> {
        info!("Subscribing to notifications...");
        let mut notification_stream = notify_char.notify().await?;
        info!("Listening for notifications from sender...");

        let result = loop {
            tokio::select! {
                item = notification_stream.next() => match item {
                    Some(Ok(value)) => {
                        self.handle_notification(&value).await;
                    }
                    Some(Err(e)) => {
                        error!("Error in notification stream: {}", e);
                        break Err(e.into());
                    }
                    None => {
                        info!("Notification stream ended");
                        break Ok(());
                    }
                },
                _ = cancel_token.cancelled() => break Ok(()),
            }
        };

        self.buffer.clear();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::commands::tests::RecordingSender;
    use crate::core::frame::FRAME_HEADER;

    #[tokio::test]
    async fn forwards_each_complete_chunk_with_header() {
        let recorder = RecordingSender::default();
        let (mut handler, last_frame) = NotificationHandler::new(recorder.clone());

        assert_eq!(handler.handle_notification(&[1, 2, 3, 4, 5, 6]).await, 0);
        assert_eq!(handler.handle_notification(&(7..=15).collect::<Vec<u8>>()).await, 1);
        assert_eq!(handler.handle_notification(&(16..=20).collect::<Vec<u8>>()).await, 1);

        let sent = recorder.sent();
        assert_eq!(sent.len(), 2);
        for frame in &sent {
            assert_eq!(frame.len(), 11);
            assert_eq!(frame[0], FRAME_HEADER);
        }
        assert_eq!(&sent[0][1..], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(&sent[1][1..], &[11, 12, 13, 14, 15, 16, 17, 18, 19, 20]);
        assert_eq!(last_frame.borrow().values()[0], 11);
    }

    #[tokio::test]
    async fn large_notification_yields_several_frames() {
        let recorder = RecordingSender::default();
        let (mut handler, _) = NotificationHandler::new(recorder.clone());

        assert_eq!(handler.handle_notification(&[0u8; 33]).await, 3);
        assert_eq!(recorder.sent().len(), 3);
    }
}
