//! Patchwright core library
//!
//! Tools that issue-resolving agents use to look at and change a checked-out
//! project:
//! - `edit` - exact, uniqueness-checked file editing with per-path undo
//! - `index` - grammar-aware chunking, embedding, and semantic search
//! - `tools` - the agent-facing tool surface over both engines
//!
//! Both engines operate against a [`WorkspaceContext`] handed to them at
//! construction.

pub mod ai;
pub mod config;
pub mod edit;
pub mod index;
pub mod tools;
pub mod workspace;

pub use config::Config;
pub use edit::{EditError, FileEditor};
pub use index::{CodebaseIndex, IndexError, Retriever};
pub use tools::{ToolRegistry, ToolResult, ToolSession};
pub use workspace::WorkspaceContext;
