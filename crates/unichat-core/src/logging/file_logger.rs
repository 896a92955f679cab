//! File-based debug log
//!
//! A global log file for troubleshooting hosts where stdout/stderr are not
//! visible. Disabled unless `UNICHAT_DEBUG` is `1`/`true`; the minimum level
//! comes from `UNICHAT_LOG_LEVEL` and the path from `UNICHAT_LOG_FILE`
//! (default `<temp dir>/unichat-debug.log`).

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::SystemTime;

use super::traits::Logger;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Parse a level name, case-insensitive
    pub fn parse(value: &str) -> Option<LogLevel> {
        match value.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:<5}", self.as_str())
    }
}

struct FileLogState {
    path: PathBuf,
    file: Option<File>,
    min_level: LogLevel,
    enabled: bool,
}

impl FileLogState {
    fn from_env() -> Self {
        let path = std::env::var_os("UNICHAT_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(default_log_path);
        let enabled = std::env::var("UNICHAT_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let min_level = std::env::var("UNICHAT_LOG_LEVEL")
            .ok()
            .and_then(|v| LogLevel::parse(&v))
            .unwrap_or(LogLevel::Debug);
        let file = if enabled { open_append(&path) } else { None };

        Self {
            path,
            file,
            min_level,
            enabled,
        }
    }

    fn write(&mut self, level: LogLevel, component: &str, message: &str) {
        if !self.enabled || level < self.min_level {
            return;
        }
        if let Some(file) = self.file.as_mut() {
            let _ = writeln!(file, "[{}] [{}] [{}] {}", timestamp(), level, component, message);
            let _ = file.flush();
        }
    }
}

fn default_log_path() -> PathBuf {
    std::env::temp_dir().join("unichat-debug.log")
}

fn open_append(path: &PathBuf) -> Option<File> {
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// `HH:MM:SS.mmm` (UTC)
fn timestamp() -> String {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| {
            let secs = d.as_secs();
            format!(
                "{:02}:{:02}:{:02}.{:03}",
                (secs % 86400) / 3600,
                (secs % 3600) / 60,
                secs % 60,
                d.subsec_millis()
            )
        })
        .unwrap_or_else(|_| "??:??:??.???".to_string())
}

static STATE: OnceLock<Mutex<FileLogState>> = OnceLock::new();

fn state() -> &'static Mutex<FileLogState> {
    STATE.get_or_init(|| Mutex::new(FileLogState::from_env()))
}

/// Write one line to the debug log
pub fn log(level: LogLevel, component: &str, message: &str) {
    state().lock().write(level, component, message);
}

/// Path of the debug log file
pub fn log_file_path() -> PathBuf {
    state().lock().path.clone()
}

/// Whether the debug log is active
pub fn is_enabled() -> bool {
    state().lock().enabled
}

/// Truncate the log file and reopen it
pub fn clear_log() {
    let mut state = state().lock();
    if !state.enabled {
        return;
    }
    if let Ok(file) = File::create(&state.path) {
        drop(file);
    }
    state.file = open_append(&state.path);
}

/// Logger backed by the global debug log file
#[derive(Debug, Clone)]
pub struct FileLogger {
    component: String,
}

impl Default for FileLogger {
    fn default() -> Self {
        Self::new("unichat")
    }
}

impl FileLogger {
    /// `component` is written as the third bracketed field of every line
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }
}

impl Logger for FileLogger {
    fn debug(&self, message: &str) {
        log(LogLevel::Debug, &self.component, message);
    }

    fn info(&self, message: &str) {
        log(LogLevel::Info, &self.component, message);
    }

    fn warn(&self, message: &str) {
        log(LogLevel::Warn, &self.component, message);
    }

    fn error(&self, message: &str) {
        log(LogLevel::Error, &self.component, message);
    }
}

/// Log to the debug file with the calling module as component
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        $crate::logging::file_logger::log(
            $crate::logging::LogLevel::Debug,
            module_path!(),
            &format!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        $crate::logging::file_logger::log(
            $crate::logging::LogLevel::Warn,
            module_path!(),
            &format!($($arg)*),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert!(LogLevel::Debug > LogLevel::Trace);
        assert!(LogLevel::Error > LogLevel::Warn);
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogLevel::Info.to_string(), "INFO ");
    }

    #[test]
    fn test_file_logger_does_not_panic() {
        let logger = FileLogger::default();
        logger.debug("[Test] debug");
        logger.error("[Test] error");
        crate::debug_log!("[Test] {}", 1);
        crate::warn_log!("[Test] {}", 2);
        assert!(log_file_path().to_string_lossy().len() > 0);
    }
}
