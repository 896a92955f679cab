//! Completion orchestration
//!
//! [`Orchestrator::run`] drives one turn on its own task and hands back a
//! [`StreamHandle`]:
//!
//! ```rust,ignore
//! let orchestrator = Orchestrator::new(registry, logger).with_tools(tools);
//! let mut handle = orchestrator.run(input, "claude-sonnet-4", TurnOptions::new()
//!     .on_update(|text, _reasoning| render(text)));
//! let outcome = handle.wait().await?;
//! ```
//!
//! Retries only cover connection establishment: once any event has reached
//! the caller a failure is terminal.

mod handle;
mod retry;
mod runner;
mod sink;

pub use handle::{StreamHandle, TurnOptions};
pub use retry::{Backoff, RetryPolicy};
pub use runner::Orchestrator;
pub use sink::{ChunkCallback, UpdateCallback};
