//! Bridge sessions
//! This module defines the sessions that can be started from the command line.

use std::io::BufReader;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::bluetooth_config::PeripheralConfig;
use crate::core::arm::{ArmCommand, ArmController, JointAngles, KEYBOARD_HELP};
use crate::core::bluetooth::{BluestFrameSender, FrameSender, NotificationHandler};
use crate::core::frame::{FrameError, MotorFrame};
use crate::core::serial;
use crate::mapping::keyboard::{self, LineEditor, LineEvent, RawModeGuard};
use crate::state::AppState;

const PROMPT: &str = "Enter 10 integers (0-255) separated by spaces: ";

/// Lists advertising devices
pub async fn scan_devices(app_state: &AppState) -> Result<()> {
    let bluetooth_manager_arc = app_state.get_bluetooth_manager_arc();
    let bluetooth_manager_guard = bluetooth_manager_arc.lock().await;

    info!("Scanning for devices...");
    let devices = bluetooth_manager_guard
        .list_devices(&app_state.cancel_token)
        .await?;
    if devices.is_empty() {
        println!("No devices found.");
    }
    for device in devices {
        println!(
            "{:<24} {:<18} RSSI {:>4}  {}",
            device.name.as_deref().unwrap_or("<unnamed>"),
            device.address,
            device.rssi.map(|r| r.to_string()).unwrap_or_else(|| "?".to_string()),
            device.id
        );
    }
    Ok(())
}

/// Discovers and connects to every peripheral in `peripherals`, in order
async fn connect_peripherals(
    app_state: &AppState,
    peripherals: &[&PeripheralConfig],
) -> Result<Vec<bluest::Characteristic>> {
    let bluetooth_manager_arc = app_state.get_bluetooth_manager_arc();
    let mut bluetooth_manager_guard = bluetooth_manager_arc.lock().await;

    app_state.set_status("Scanning...");
    let names: Vec<&str> = peripherals.iter().map(|p| p.name.as_str()).collect();
    if let Err(e) = bluetooth_manager_guard
        .discover(&names, &app_state.cancel_token)
        .await
    {
        app_state.set_status("Device not found");
        return Err(e);
    }

    let mut characteristics = Vec::with_capacity(peripherals.len());
    for peripheral in peripherals {
        match bluetooth_manager_guard.connect(peripheral).await {
            Ok(characteristic) => characteristics.push(characteristic),
            Err(e) => {
                app_state.set_status(format!("Error: {}", e));
                bluetooth_manager_guard.disconnect_all().await;
                return Err(e);
            }
        }
    }
    app_state.set_status("Connected");
    Ok(characteristics)
}

async fn disconnect(app_state: &AppState) {
    app_state
        .get_bluetooth_manager_arc()
        .lock()
        .await
        .disconnect_all()
        .await;
    app_state.set_status("Disconnected");
}

/// Relays sender notifications to the receiver.
/// When `serial_port` is given the arm is first moved to its initial pose.
pub async fn run_relay(app_state: &AppState, serial_port: Option<&str>) -> Result<()> {
    let arm_config = &app_state.config.arm;
    if let Some(port) = serial_port {
        let mut link = serial::open_port(port, arm_config.baud_rate)?;
        link.send(&ArmCommand::all_angles(
            &arm_config.initial_pose,
            arm_config.speed,
            arm_config.acceleration,
        ))?;
    }

    let bluetooth = &app_state.config.bluetooth;
    let characteristics =
        connect_peripherals(app_state, &[&bluetooth.sender, &bluetooth.receiver]).await?;
    let [notify_char, write_char]: [bluest::Characteristic; 2] = characteristics
        .try_into()
        .map_err(|_| anyhow::anyhow!("Expected sender and receiver characteristics"))?;

    let frame_sender = BluestFrameSender::new(write_char).await;
    let (mut handler, mut last_frame) = NotificationHandler::new(frame_sender);

    let result = tokio::select! {
        result = handler.run(notify_char, app_state.cancel_token.clone()) => result,
        _ = async {
            while last_frame.changed().await.is_ok() {
                let motors = *last_frame.borrow_and_update().values();
                app_state.update_dashboard(|state| state.motors = motors);
            }
            std::future::pending::<()>().await
        } => Ok(()),
    };

    disconnect(app_state).await;
    result
}

/// Outcome of one line typed at the prompt
#[derive(Debug, PartialEq)]
pub enum Submission {
    Sent(MotorFrame),
    Rejected(FrameError),
}

/// Validates a prompt line and writes the resulting frame
pub async fn submit_line<S: FrameSender>(line: &str, frame_sender: &S) -> Result<Submission> {
    let frame = match line.parse::<MotorFrame>() {
        Ok(frame) => frame,
        Err(e) => return Ok(Submission::Rejected(e)),
    };
    frame_sender.send_frame(&frame).await?;
    Ok(Submission::Sent(frame))
}

/// Reads motor values typed by the user and sends them to the receiver
pub async fn run_console(app_state: &AppState, with_dashboard: bool) -> Result<()> {
    let bluetooth = &app_state.config.bluetooth;
    let mut characteristics = connect_peripherals(app_state, &[&bluetooth.receiver]).await?;
    let write_char = characteristics
        .pop()
        .context("Receiver characteristic missing")?;
    let frame_sender = BluestFrameSender::new(write_char).await;

    let result = if with_dashboard {
        console_from_keys(app_state, &frame_sender).await
    } else {
        console_from_stdin(app_state, &frame_sender).await
    };

    disconnect(app_state).await;
    result
}

async fn console_from_stdin<S: FrameSender>(app_state: &AppState, frame_sender: &S) -> Result<()> {
    let mut lines = keyboard::spawn_line_reader(BufReader::new(std::io::stdin()));
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(PROMPT.as_bytes()).await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.recv() => line.transpose()?,
            _ = app_state.cancel_token.cancelled() => None,
        };
        let Some(line) = line else {
            println!("\nExiting...");
            return Ok(());
        };

        match submit_line(&line, frame_sender).await? {
            Submission::Sent(frame) => {
                app_state.update_dashboard(|state| state.motors = *frame.values());
            }
            Submission::Rejected(e) => println!("Error: {}", e),
        }
    }
}

async fn console_from_keys<S: FrameSender>(app_state: &AppState, frame_sender: &S) -> Result<()> {
    let mut keys = keyboard::spawn_key_reader(app_state.cancel_token.clone());
    let mut editor = LineEditor::default();
    app_state.update_dashboard(|state| state.input = Some(String::new()));

    loop {
        let input = tokio::select! {
            input = keys.recv() => input,
            _ = app_state.cancel_token.cancelled() => None,
        };
        let Some(input) = input else { return Ok(()) };

        match editor.handle(input) {
            LineEvent::Editing => {
                let line = editor.line().to_string();
                app_state.update_dashboard(|state| state.input = Some(line));
            }
            LineEvent::Submitted(line) => {
                let submission = submit_line(&line, frame_sender).await?;
                app_state.update_dashboard(|state| {
                    state.input = Some(String::new());
                    match submission {
                        Submission::Sent(frame) => {
                            state.motors = *frame.values();
                            state.message = None;
                        }
                        Submission::Rejected(e) => state.message = Some(format!("Error: {}", e)),
                    }
                });
            }
            LineEvent::Interrupted => {
                app_state.cancel_token.cancel();
                return Ok(());
            }
        }
    }
}

/// Writes the current pose as a motor frame every `interval` until cancelled.
/// `on_frame` observes every frame that was written.
pub async fn stream_pose_frames<S: FrameSender>(
    frame_sender: &S,
    angles_rx: watch::Receiver<JointAngles>,
    angle_limit: f64,
    interval: Duration,
    mut on_frame: impl FnMut(&JointAngles, &MotorFrame),
    cancel_token: CancellationToken,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    // A slow write delays the next frame instead of triggering catch-up frames
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Ok(()),
            _ = ticker.tick() => {}
        }
        let angles = *angles_rx.borrow();
        let frame = angles.to_frame(angle_limit);
        frame_sender.send_frame(&frame).await?;
        on_frame(&angles, &frame);
    }
}

/// Keyboard arm control: every pose change goes to the arm over serial and,
/// as a motor frame, to the receiver.
pub async fn run_arm(app_state: &AppState, serial_port: &str, with_dashboard: bool) -> Result<()> {
    let arm_config = app_state.config.arm.clone();
    let cancel_token = app_state.cancel_token.clone();

    let link = serial::open_port(serial_port, arm_config.baud_rate)?;
    let bluetooth = &app_state.config.bluetooth;
    let mut characteristics = connect_peripherals(app_state, &[&bluetooth.receiver]).await?;
    let write_char = characteristics
        .pop()
        .context("Receiver characteristic missing")?;
    let frame_sender = BluestFrameSender::new(write_char).await;

    let controller = ArmController::new(arm_config.initial_pose, arm_config.step, arm_config.angle_limit);
    let (arm, angles_rx) = controller.spawn(cancel_token.clone());
    app_state.update_dashboard(|state| state.joints = Some(*angles_rx.borrow()));

    // The dashboard already switched the terminal to raw mode
    let _raw_mode = if with_dashboard {
        None
    } else {
        Some(RawModeGuard::enable()?)
    };
    info!("{}", KEYBOARD_HELP);
    let keys = keyboard::spawn_key_reader(cancel_token.clone());

    let serial_task = tokio::spawn(serial::run_command_loop(
        link,
        angles_rx.clone(),
        arm_config.speed,
        arm_config.acceleration,
        cancel_token.clone(),
    ));

    let stream = stream_pose_frames(
        &frame_sender,
        angles_rx,
        arm_config.angle_limit,
        Duration::from_millis(arm_config.frame_interval_ms),
        |angles, frame| {
            app_state.update_dashboard(|state| {
                state.joints = Some(*angles);
                state.motors = *frame.values();
            })
        },
        cancel_token.clone(),
    );
    let stream = async {
        let result = stream.await;
        if let Err(e) = &result {
            error!("Connection error: {}", e);
            app_state.set_status(format!("Error: {}", e));
            cancel_token.cancel();
        }
        result
    };
    let (_, stream_result) = tokio::join!(keyboard::drive_arm(keys, arm, cancel_token.clone()), stream);

    match serial_task.await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => error!("Serial command loop failed: {}", e),
        Err(e) => error!("Serial command task panicked: {}", e),
    }
    disconnect(app_state).await;
    stream_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::FrameSender;
    use crate::core::frame::FRAME_HEADER;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct Recorder {
        frames: Arc<Mutex<Vec<MotorFrame>>>,
    }

    #[async_trait::async_trait]
    impl FrameSender for Recorder {
        async fn send_frame(&self, frame: &MotorFrame) -> Result<()> {
            self.frames.lock().unwrap().push(*frame);
            Ok(())
        }
    }

    #[tokio::test]
    async fn valid_line_is_sent_invalid_line_is_not() {
        let recorder = Recorder::default();

        let sent = submit_line("1 2 3 4 5 6 7 8 9 10", &recorder).await.unwrap();
        assert_eq!(sent, Submission::Sent(MotorFrame::new([1, 2, 3, 4, 5, 6, 7, 8, 9, 10])));

        let rejected = submit_line("1 2 3 4 5 6 7 8 9 300", &recorder).await.unwrap();
        assert_eq!(rejected, Submission::Rejected(FrameError::OutOfRange("300".to_string())));

        assert_eq!(recorder.frames.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pose_frames_follow_the_latest_angles() {
        let recorder = Recorder::default();
        let (angles_tx, angles_rx) = watch::channel(JointAngles::default());
        let token = CancellationToken::new();
        let mut seen = 0;

        let stop = token.clone();
        stream_pose_frames(
            &recorder,
            angles_rx,
            3.14,
            Duration::from_millis(1),
            |_, frame| {
                seen += 1;
                assert_eq!(frame.to_bytes()[0], FRAME_HEADER);
                if seen == 1 {
                    angles_tx.send_replace(JointAngles { base: 3.14, ..JointAngles::default() });
                }
                if seen == 3 {
                    stop.cancel();
                }
            },
            token,
        )
        .await
        .unwrap();

        let frames = recorder.frames.lock().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].values()[1], 127);
        assert_eq!(frames[2].values()[0], 0);
        assert_eq!(frames[2].values()[1], 255);
    }

    /// Records when each frame was written; the first write stalls like a slow BLE link
    #[derive(Default)]
    struct StallingSender {
        written_at: Mutex<Vec<Instant>>,
    }

    #[async_trait::async_trait]
    impl FrameSender for StallingSender {
        async fn send_frame(&self, _frame: &MotorFrame) -> Result<()> {
            let first = self.written_at.lock().unwrap().is_empty();
            if first {
                tokio::time::sleep(Duration::from_millis(60)).await;
            }
            self.written_at.lock().unwrap().push(Instant::now());
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_write_does_not_cause_a_burst_of_frames() {
        let sender = StallingSender::default();
        let (_angles_tx, angles_rx) = watch::channel(JointAngles::default());
        let token = CancellationToken::new();
        let stop = token.clone();
        let mut seen = 0;

        stream_pose_frames(
            &sender,
            angles_rx,
            3.14,
            Duration::from_millis(10),
            |_, _| {
                seen += 1;
                if seen == 4 {
                    stop.cancel();
                }
            },
            token,
        )
        .await
        .unwrap();

        let written_at = sender.written_at.lock().unwrap();
        assert_eq!(written_at.len(), 4);
        // after the stall the stream is back to one frame per interval
        for pair in written_at[1..].windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(8));
        }
    }
}
