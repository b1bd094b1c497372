//! Serial link to the robot arm
//! Commands are written as newline-delimited JSON objects.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::arm::{ArmCommand, JointAngles};

/// Writes arm commands to any byte sink (a serial port in production)
pub struct ArmLink<W: Write> {
    writer: W,
}

impl<W: Write> ArmLink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn send(&mut self, command: &ArmCommand) -> Result<()> {
        let mut line = serde_json::to_vec(command)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        info!("Sent robot command: {}", String::from_utf8_lossy(&line[..line.len() - 1]));
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Opens the arm's serial port with RTS and DTR held low so the board is not reset
pub fn open_port(path: &str, baud_rate: u32) -> Result<ArmLink<Box<dyn serialport::SerialPort>>> {
    let mut port = serialport::new(path, baud_rate)
        .timeout(Duration::from_millis(500))
        .open()
        .with_context(|| format!("Failed to open serial port {}", path))?;
    port.write_request_to_send(false)?;
    port.write_data_terminal_ready(false)?;
    info!("Opened serial port {} at {} baud", path, baud_rate);
    Ok(ArmLink::new(port))
}

/// Sends the current pose, then one command per pose change, until cancelled.
pub async fn run_command_loop<W: Write>(
    mut link: ArmLink<W>,
    mut angles_rx: watch::Receiver<JointAngles>,
    spd: u32,
    acc: u32,
    cancel_token: CancellationToken,
) -> Result<ArmLink<W>> {
    loop {
        let angles = *angles_rx.borrow_and_update();
        if let Err(e) = link.send(&ArmCommand::all_angles(&angles, spd, acc)) {
            error!("Failed to send robot command: {}", e);
        }

        tokio::select! {
            changed = angles_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = cancel_token.cancelled() => break,
        }
    }
    Ok(link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_is_one_json_line() {
        let mut link = ArmLink::new(Vec::new());
        link.send(&ArmCommand::all_angles(&JointAngles::default(), 0, 10))
            .unwrap();
        let written = String::from_utf8(link.into_inner()).unwrap();
        assert!(written.ends_with('\n'));
        assert_eq!(written.matches('\n').count(), 1);

        let parsed: ArmCommand = serde_json::from_str(written.trim_end()).unwrap();
        assert_eq!(parsed.command_type, 102);
        assert_eq!(parsed.elbow, 1.57);
    }

    #[tokio::test]
    async fn loop_sends_initial_pose_and_each_change() {
        let (angles_tx, angles_rx) = watch::channel(JointAngles::default());
        let token = CancellationToken::new();
        let task = tokio::spawn(run_command_loop(
            ArmLink::new(Vec::new()),
            angles_rx,
            0,
            10,
            token.clone(),
        ));

        tokio::task::yield_now().await;
        angles_tx.send_replace(JointAngles { base: 0.1, ..JointAngles::default() });
        tokio::task::yield_now().await;
        // Dropping the sender ends the loop once the last change has been sent
        drop(angles_tx);

        let link = task.await.unwrap().unwrap();
        let written = String::from_utf8(link.into_inner()).unwrap();
        let commands: Vec<ArmCommand> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(commands.first().unwrap().base, 0.0);
        assert_eq!(commands.last().unwrap().base, 0.1);
    }
}
