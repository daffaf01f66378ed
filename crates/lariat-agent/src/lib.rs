//! lariat-agent: Agent runtime with tool execution
//!
//! This crate provides the agent loop that handles multi-turn conversations
//! with LLMs, including tool execution and per-turn context size management.

pub mod agent;
pub mod conversation;
pub mod error;
pub mod events;
pub mod guard;
pub mod tool;
pub mod transport;

pub use agent::{Agent, AgentConfig};
pub use conversation::Conversation;
pub use error::Error;
pub use events::AgentEvent;
pub use guard::{GuardOutcome, Reduction, ResponseSizeGuard};
pub use tool::{BoxedTool, Tool, ToolResult};
pub use transport::{ProviderTransport, RetryConfig, Transport};
