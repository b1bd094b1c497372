use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::crossterm::terminal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::arm::{ArmAction, ArmControllerSender};

/// Poll period of the key reader; bounds how long it takes to notice cancellation
const KEY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A key press relevant to the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Enter,
    Backspace,
    /// Ctrl-C or Esc
    Interrupt,
}

impl KeyInput {
    pub fn from_event(key: KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Self::Interrupt)
            }
            KeyCode::Char(c) => Some(Self::Char(c)),
            KeyCode::Enter => Some(Self::Enter),
            KeyCode::Backspace => Some(Self::Backspace),
            KeyCode::Esc => Some(Self::Interrupt),
            _ => None,
        }
    }
}

/// Keeps the terminal in raw mode while alive
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Reads key presses on a dedicated thread and forwards them over a channel.
/// The terminal must already be in raw mode.
pub fn spawn_key_reader(cancel_token: CancellationToken) -> mpsc::UnboundedReceiver<KeyInput> {
    let (tx, rx) = mpsc::unbounded_channel();

    thread::spawn(move || {
        info!("Key reader thread started.");
        while !cancel_token.is_cancelled() {
            match event::poll(KEY_POLL_INTERVAL) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => {
                        if let Some(input) = KeyInput::from_event(key) {
                            if tx.send(input).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Failed to read terminal event: {}", e);
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    error!("Failed to poll terminal events: {}", e);
                    break;
                }
            }
        }
        info!("Key reader thread stopped.");
    });

    rx
}

/// Reads lines on a dedicated thread and forwards them over a channel.
/// A read still blocked when the session ends is abandoned with its thread,
/// so it never holds up runtime shutdown.
pub fn spawn_line_reader<R>(reader: R) -> mpsc::UnboundedReceiver<io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    thread::spawn(move || {
        for line in reader.lines() {
            let failed = line.is_err();
            if tx.send(line).is_err() || failed {
                break;
            }
        }
    });

    rx
}

/// Feeds key presses to the arm controller until interrupted or cancelled
pub async fn drive_arm(
    mut keys: mpsc::UnboundedReceiver<KeyInput>,
    arm: ArmControllerSender,
    cancel_token: CancellationToken,
) {
    loop {
        let input = tokio::select! {
            input = keys.recv() => input,
            _ = cancel_token.cancelled() => break,
        };
        match input {
            Some(KeyInput::Char(c)) => {
                if let Some(action) = ArmAction::from_key(c) {
                    if arm.send(action).await.is_err() {
                        break;
                    }
                }
            }
            Some(KeyInput::Interrupt) | None => {
                cancel_token.cancel();
                break;
            }
            Some(_) => {}
        }
    }
}

/// Outcome of feeding one key to the line editor
#[derive(Debug, PartialEq, Eq)]
pub enum LineEvent {
    Editing,
    Submitted(String),
    Interrupted,
}

/// Single-line input edited key by key, used while the dashboard owns the terminal
#[derive(Debug, Default)]
pub struct LineEditor {
    line: String,
}

impl LineEditor {
    pub fn handle(&mut self, input: KeyInput) -> LineEvent {
        match input {
            KeyInput::Char(c) => {
                self.line.push(c);
                LineEvent::Editing
            }
            KeyInput::Backspace => {
                self.line.pop();
                LineEvent::Editing
            }
            KeyInput::Enter => LineEvent::Submitted(std::mem::take(&mut self.line)),
            KeyInput::Interrupt => LineEvent::Interrupted,
        }
    }

    pub fn line(&self) -> &str {
        &self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arm::{ArmController, JointAngles};
    use std::io::{BufReader, Cursor, Read};
    use std::time::Instant;

    /// A reader that blocks until its sender is dropped, like a terminal nobody types into
    struct BlockedReader(std::sync::mpsc::Receiver<()>);

    impl Read for BlockedReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[tokio::test]
    async fn line_reader_forwards_lines_then_closes() {
        let mut lines = spawn_line_reader(Cursor::new("1 2 3\n4 5 6\n"));
        assert_eq!(lines.recv().await.unwrap().unwrap(), "1 2 3");
        assert_eq!(lines.recv().await.unwrap().unwrap(), "4 5 6");
        assert!(lines.recv().await.is_none());
    }

    #[test]
    fn pending_line_read_does_not_block_shutdown() {
        let (_keep_blocked, blocked) = std::sync::mpsc::channel::<()>();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let started = Instant::now();

        runtime.block_on(async {
            let mut lines = spawn_line_reader(BufReader::new(BlockedReader(blocked)));
            let token = CancellationToken::new();
            let cancel = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            });
            tokio::select! {
                line = lines.recv() => panic!("unexpected line: {:?}", line),
                _ = token.cancelled() => {}
            }
        });
        drop(runtime);

        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn ctrl_c_and_esc_interrupt() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(KeyInput::from_event(ctrl_c), Some(KeyInput::Interrupt));
        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(KeyInput::from_event(esc), Some(KeyInput::Interrupt));
        let c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        assert_eq!(KeyInput::from_event(c), Some(KeyInput::Char('c')));
        let tab = KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(KeyInput::from_event(tab), None);
    }

    #[test]
    fn line_editor_submits_and_resets() {
        let mut editor = LineEditor::default();
        for c in "12 3x".chars() {
            assert_eq!(editor.handle(KeyInput::Char(c)), LineEvent::Editing);
        }
        editor.handle(KeyInput::Backspace);
        assert_eq!(editor.line(), "12 3");
        assert_eq!(editor.handle(KeyInput::Enter), LineEvent::Submitted("12 3".to_string()));
        assert_eq!(editor.line(), "");
        assert_eq!(editor.handle(KeyInput::Interrupt), LineEvent::Interrupted);
    }

    #[tokio::test]
    async fn keys_move_the_arm_and_interrupt_cancels() {
        let token = CancellationToken::new();
        let controller = ArmController::new(JointAngles::default(), 0.1, 3.14);
        let (arm, mut angles_rx) = controller.spawn(token.clone());
        let (tx, rx) = mpsc::unbounded_channel();

        let driver = tokio::spawn(drive_arm(rx, arm, token.clone()));
        tx.send(KeyInput::Char('D')).unwrap();
        angles_rx.changed().await.unwrap();
        assert!((angles_rx.borrow().base - 0.1).abs() < 1e-9);

        tx.send(KeyInput::Interrupt).unwrap();
        driver.await.unwrap();
        assert!(token.is_cancelled());
    }
}
