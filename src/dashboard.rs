//! Terminal dashboard
//! Live view of the joint angles, the ten motor intensities, the connection
//! status, the console input line and recent log output.

use std::time::Duration;

use anyhow::Result;
use log::Level;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Gauge, List, ListItem, Paragraph};
use ratatui::Frame;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::arm::{Joint, JointAngles};
use crate::core::frame::MOTOR_COUNT;
use crate::logging::{LogBuffer, LogMessage};

const REFRESH_INTERVAL: Duration = Duration::from_millis(50);

/// One colour per haptic motor
pub const MOTOR_COLORS: [(u8, u8, u8); MOTOR_COUNT] = [
    (57, 252, 3),
    (65, 181, 129),
    (65, 250, 228),
    (247, 173, 255),
    (40, 119, 209),
    (232, 32, 76),
    (255, 183, 3),
    (226, 237, 173),
    (60, 60, 145),
    (156, 11, 71),
];

/// Everything the dashboard shows, published by the running session
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub title: String,
    pub status: String,
    /// Present when the session controls the arm
    pub joints: Option<JointAngles>,
    pub angle_limit: f64,
    pub motors: [u8; MOTOR_COUNT],
    /// Present when the session reads motor values from the prompt
    pub input: Option<String>,
    /// Feedback on the last submitted line
    pub message: Option<String>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            title: "Haptic Motor Visualizer".to_string(),
            status: "Disconnected".to_string(),
            joints: None,
            angle_limit: 3.14,
            motors: [0; MOTOR_COUNT],
            input: None,
            message: None,
        }
    }
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Error => Color::Red,
        Level::Warn => Color::Yellow,
        Level::Info => Color::Green,
        Level::Debug | Level::Trace => Color::DarkGray,
    }
}

fn render_joints(frame: &mut Frame, area: Rect, joints: &JointAngles, limit: f64) {
    let columns = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(area);
    for (joint, column) in Joint::ALL.iter().zip(columns.iter()) {
        let angle = joints.get(*joint);
        let ratio = ((angle + limit) / (2.0 * limit)).clamp(0.0, 1.0);
        let gauge = Gauge::default()
            .block(Block::bordered().title(joint.label()))
            .gauge_style(Style::new().fg(Color::Cyan))
            .ratio(ratio)
            .label(format!("{:.2} rad", angle));
        frame.render_widget(gauge, *column);
    }
}

fn render_motors(frame: &mut Frame, area: Rect, motors: &[u8; MOTOR_COUNT]) {
    let block = Block::bordered().title("Haptic Motor Feedback");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::vertical([Constraint::Length(1); MOTOR_COUNT]).split(inner);
    for (i, (value, row)) in motors.iter().zip(rows.iter()).enumerate() {
        let (r, g, b) = MOTOR_COLORS[i];
        let gauge = Gauge::default()
            .gauge_style(Style::new().fg(Color::Rgb(r, g, b)))
            .ratio(f64::from(*value) / 255.0)
            .label(format!("Motor {}: {}", i + 1, value));
        frame.render_widget(gauge, *row);
    }
}

fn render_input(frame: &mut Frame, area: Rect, input: &str, message: Option<&str>) {
    let mut lines = vec![Line::from(vec![
        Span::styled("> ", Style::new().add_modifier(Modifier::BOLD)),
        Span::raw(input.to_string()),
    ])];
    if let Some(message) = message {
        lines.push(Line::styled(message.to_string(), Style::new().fg(Color::Yellow)));
    }
    let paragraph = Paragraph::new(lines)
        .block(Block::bordered().title("Enter 10 integers (0-255) separated by spaces"));
    frame.render_widget(paragraph, area);
}

fn render_logs(frame: &mut Frame, area: Rect, logs: &[LogMessage]) {
    let visible = area.height.saturating_sub(2) as usize;
    let skip = logs.len().saturating_sub(visible);
    let items: Vec<ListItem> = logs
        .iter()
        .skip(skip)
        .map(|entry| {
            ListItem::new(Line::from(vec![
                Span::styled(entry.timestamp.clone(), Style::new().fg(Color::DarkGray)),
                Span::raw(" "),
                Span::styled(
                    format!("{:<5}", entry.level),
                    Style::new().fg(level_color(entry.level)),
                ),
                Span::raw(" "),
                Span::raw(entry.message.clone()),
            ]))
        })
        .collect();
    frame.render_widget(List::new(items).block(Block::bordered().title("Log")), area);
}

/// Draws one complete dashboard frame
pub fn render(frame: &mut Frame, state: &DashboardState, logs: &[LogMessage]) {
    let mut constraints = vec![Constraint::Length(3)];
    if state.joints.is_some() {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Length(MOTOR_COUNT as u16 + 2));
    if state.input.is_some() {
        constraints.push(Constraint::Length(4));
    }
    constraints.push(Constraint::Min(3));

    let areas = Layout::vertical(constraints).split(frame.area());
    let mut areas = areas.iter().copied();

    if let Some(header) = areas.next() {
        let status = Paragraph::new(Line::from(format!("Status: {}", state.status)))
            .block(Block::bordered().title(state.title.as_str()));
        frame.render_widget(status, header);
    }
    if let Some(joints) = &state.joints {
        if let Some(area) = areas.next() {
            render_joints(frame, area, joints, state.angle_limit);
        }
    }
    if let Some(area) = areas.next() {
        render_motors(frame, area, &state.motors);
    }
    if let Some(input) = &state.input {
        if let Some(area) = areas.next() {
            render_input(frame, area, input, state.message.as_deref());
        }
    }
    if let Some(area) = areas.next() {
        render_logs(frame, area, logs);
    }
}

/// Owns the terminal and redraws until `cancel_token` fires
pub async fn run(
    state_rx: watch::Receiver<DashboardState>,
    logs: LogBuffer,
    cancel_token: CancellationToken,
) -> Result<()> {
    let mut terminal = ratatui::try_init()?;
    let mut ticker = tokio::time::interval(REFRESH_INTERVAL);

    let result = loop {
        tokio::select! {
            _ = ticker.tick() => {
                let state = state_rx.borrow().clone();
                let entries = logs.recent(200);
                if let Err(e) = terminal.draw(|frame| render(frame, &state, &entries)) {
                    break Err(e.into());
                }
            }
            _ = cancel_token.cancelled() => break Ok(()),
        }
    };

    ratatui::restore();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn draw(state: &DashboardState, logs: &[LogMessage]) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|frame| render(frame, state, logs)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn shows_status_and_motor_values() {
        let state = DashboardState {
            status: "Connected".to_string(),
            motors: [20, 80, 150, 255, 190, 60, 30, 210, 100, 245],
            ..DashboardState::default()
        };
        let screen = draw(&state, &[]);
        assert!(screen.contains("Status: Connected"));
        assert!(screen.contains("Motor 1: 20"));
        assert!(screen.contains("Motor 10: 245"));
        assert!(!screen.contains("Shoulder"));
    }

    #[test]
    fn shows_joints_input_and_logs_when_present() {
        let state = DashboardState {
            joints: Some(JointAngles::default()),
            input: Some("1 2 3".to_string()),
            message: Some("You must enter exactly 10 integers.".to_string()),
            ..DashboardState::default()
        };
        let logs = vec![LogMessage {
            level: Level::Info,
            message: "Connected to ESP32_Receiver!".to_string(),
            timestamp: "12:00:00.000".to_string(),
        }];
        let screen = draw(&state, &logs);
        assert!(screen.contains("Shoulder"));
        assert!(screen.contains("1.57 rad"));
        assert!(screen.contains("> 1 2 3"));
        assert!(screen.contains("You must enter exactly 10 integers."));
        assert!(screen.contains("Connected to ESP32_Receiver!"));
    }
}
