//! Logging abstractions for runtime-agnostic logging

mod console;
pub mod file_logger;
mod memory;
mod traits;

pub use console::ConsoleLogger;
pub use memory::MemoryLogger;
pub use traits::{Logger, NoOpLogger, SharedLogger};

// Re-export file logger functions for convenience
pub use file_logger::{clear_log, log, log_file_path, FileLogger, LogLevel};
