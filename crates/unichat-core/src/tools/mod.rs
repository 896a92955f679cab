//! Tool management module
//!
//! Tool discovery, filtering, execution and the round-trip loop for LLM
//! tool calling.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  ToolCoordinator (per turn)                 │
//! │    Idle → Requesting → Executing            │
//! │         → Resubmitting → Idle | Terminal    │
//! └─────────────────────────────────────────────┘
//!           │
//!           ▼
//! ┌─────────────────────────────────────────────┐
//! │  ToolRegistry                               │
//! │  - Caches declarations from executors       │
//! │  - Hides internal tools (unichat_*)         │
//! │  - Applies user preferences                 │
//! │  - Shapes results ("Error: ..." on failure) │
//! └─────────────────────────────────────────────┘
//!           │
//!           │ ToolExecutor (list_tools, call_tool)
//!           ▼
//! ┌─────────────────────────────────────────────┐
//! │  McpClient (rmcp) │ LocalToolExecutor       │
//! └─────────────────────────────────────────────┘
//! ```

mod coordinator;
mod executor;
mod local;
mod registry;

pub use coordinator::{CoordinatorState, ToolCoordinator};
pub use executor::{ToolExecutor, ToolOutput};
pub use local::LocalToolExecutor;
pub use registry::{is_internal_tool, ToolFilter, ToolInfo, ToolRegistry, INTERNAL_TOOL_PREFIX};
