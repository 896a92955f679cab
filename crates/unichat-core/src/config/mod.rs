//! Configuration provider abstractions
//!
//! Supports multiple configuration sources:
//! - `MemoryConfigProvider`: In-memory for testing
//! - `FileConfigProvider`: YAML file-based (user/workspace level)

mod file;
mod memory;
mod settings;
mod traits;

pub use file::{ConfigFile, ConfigLevel, FileConfigProvider};
pub use memory::MemoryConfigProvider;
pub use settings::{CompletionSettings, DEFAULT_MAX_TOOL_ROUNDS};
pub use traits::{ConfigError, ConfigProvider, ConfigResult};
