//! lariat-mcp: Model Context Protocol client integration
//!
//! Connects to MCP tool servers declared in a TOML manifest and exposes
//! their tools through the agent `Tool` trait. Supports stdio and
//! streamable HTTP transports.

pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod tool;

pub use client::{McpClient, ToolDescriptor};
pub use config::{resolve_servers_path, ServerConfig, ServersConfig};
pub use error::Error;
pub use manager::McpManager;
pub use tool::McpTool;
