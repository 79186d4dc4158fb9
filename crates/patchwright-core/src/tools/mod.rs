//! Tool surface exposed to agents
//!
//! Every tool returns a [`ToolResult`] envelope; failures never escape as
//! errors past this boundary.

pub mod implementations;
pub mod registry;
pub mod session;

pub use registry::{Tool, ToolDefinition, ToolRegistry, ToolResult};
pub use session::ToolSession;
