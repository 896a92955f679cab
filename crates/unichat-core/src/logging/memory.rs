//! In-memory logger
//!
//! Captures lines as `LEVEL message` so tests can assert on what a
//! component reported.

use parking_lot::Mutex;

use super::file_logger::LogLevel;
use super::traits::Logger;

#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .map(|(level, message)| format!("{} {}", level.as_str(), message))
            .collect()
    }

    /// Captured messages at `level`
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Whether any captured message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|(_, message)| message.contains(needle))
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }

    fn push(&self, level: LogLevel, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}

impl Logger for MemoryLogger {
    fn debug(&self, message: &str) {
        self.push(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }
}
