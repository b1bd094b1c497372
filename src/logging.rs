use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// One captured log record
#[derive(Debug, Clone)]
pub struct LogMessage {
    pub level: Level,
    pub message: String,
    pub timestamp: String,
}

/// Bounded in-memory log history shown by the dashboard
#[derive(Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogMessage>>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, message: LogMessage) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(message);
        }
    }

    /// The newest `count` messages, oldest first
    pub fn recent(&self, count: usize) -> Vec<LogMessage> {
        match self.entries.lock() {
            Ok(entries) => {
                let skip = entries.len().saturating_sub(count);
                entries.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }
}

/// Where log records end up
pub enum LogTarget {
    /// Plain `env_logger` output on stderr
    Stderr,
    /// Stderr while the terminal is in raw mode (lines need an explicit carriage return)
    RawTerminal,
    /// Captured for the dashboard's log pane
    Dashboard(LogBuffer),
}

enum Sink {
    RawTerminal,
    Buffer(LogBuffer),
}

pub struct BridgeLogger {
    /// Used only for its filtering; records are written by `sink`
    filter: env_logger::Logger,
    sink: Sink,
}

impl BridgeLogger {
    /// `filters` uses the `RUST_LOG` syntax and refines `level`
    fn new(level: LevelFilter, filters: Option<&str>, sink: Sink) -> Self {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level);
        if let Some(filters) = filters {
            builder.parse_filters(filters);
        }
        Self {
            filter: builder.build(),
            sink,
        }
    }

    pub fn max_level(&self) -> LevelFilter {
        self.filter.filter()
    }

    fn message(record: &Record) -> LogMessage {
        LogMessage {
            level: record.level(),
            message: record.args().to_string(),
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }
}

impl Log for BridgeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.filter.matches(record) {
            return;
        }
        let message = Self::message(record);
        match &self.sink {
            Sink::RawTerminal => {
                let mut stderr = std::io::stderr().lock();
                let _ = write!(
                    stderr,
                    "[{} {:<5}] {}\r\n",
                    message.timestamp, message.level, message.message
                );
            }
            Sink::Buffer(buffer) => buffer.push(message),
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Installs the global logger. `RUST_LOG` still refines the stderr target.
pub fn init(target: LogTarget, level: LevelFilter) -> Result<()> {
    let sink = match target {
        LogTarget::Stderr => {
            env_logger::Builder::new()
                .filter_level(level)
                .parse_default_env()
                .try_init()?;
            log::info!("Logging initialized");
            return Ok(());
        }
        LogTarget::RawTerminal => Sink::RawTerminal,
        LogTarget::Dashboard(buffer) => Sink::Buffer(buffer),
    };

    let filters = std::env::var("RUST_LOG").ok();
    let logger = BridgeLogger::new(level, filters.as_deref(), sink);
    let max_level = logger.max_level();
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(max_level);
    log::info!("Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_keeps_only_the_newest_entries() {
        let buffer = LogBuffer::new(2);
        for i in 0..3 {
            buffer.push(LogMessage {
                level: Level::Info,
                message: format!("message {}", i),
                timestamp: String::new(),
            });
        }
        let recent = buffer.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "message 1");
        assert_eq!(buffer.recent(1)[0].message, "message 2");
    }

    #[test]
    fn dashboard_logger_filters_by_level() {
        let buffer = LogBuffer::new(8);
        let logger = BridgeLogger::new(LevelFilter::Info, None, Sink::Buffer(buffer.clone()));

        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .args(format_args!("hidden"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .args(format_args!("shown"))
                .build(),
        );

        let recent = buffer.recent(8);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].message, "shown");
        assert_eq!(recent[0].level, Level::Warn);
    }

    #[test]
    fn rust_log_filters_refine_the_dashboard_logger() {
        let buffer = LogBuffer::new(8);
        let logger = BridgeLogger::new(
            LevelFilter::Info,
            Some("warn,droctopus_bridge_lib::core=debug"),
            Sink::Buffer(buffer.clone()),
        );
        assert_eq!(logger.max_level(), LevelFilter::Debug);

        for (target, level, text) in [
            ("droctopus_bridge_lib::core::relay", Level::Debug, "relay debug"),
            ("droctopus_bridge_lib::commands", Level::Info, "session info"),
            ("droctopus_bridge_lib::commands", Level::Error, "session error"),
        ] {
            logger.log(
                &Record::builder()
                    .target(target)
                    .level(level)
                    .args(format_args!("{}", text))
                    .build(),
            );
        }

        let messages: Vec<String> = buffer.recent(8).into_iter().map(|m| m.message).collect();
        assert_eq!(messages, vec!["relay debug", "session error"]);
    }
}
