//! Adapter exposing MCP server tools through the agent `Tool` trait

use std::sync::Arc;

use async_trait::async_trait;
use lariat_agent::{Tool, ToolResult};
use tokio_util::sync::CancellationToken;

use crate::client::{McpClient, ToolDescriptor};

/// A single tool served by a connected MCP server
pub struct McpTool {
    client: Arc<McpClient>,
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

impl McpTool {
    pub fn new(client: Arc<McpClient>, descriptor: ToolDescriptor) -> Self {
        Self {
            client,
            name: descriptor.name,
            description: descriptor.description,
            input_schema: descriptor.input_schema,
        }
    }

    /// Name of the server this tool belongs to
    pub fn server_name(&self) -> &str {
        self.client.server_name()
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.input_schema.clone()
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        cancel: CancellationToken,
    ) -> ToolResult {
        let call = self.client.call_tool(&self.name, arguments);
        tokio::select! {
            result = call => match result {
                Ok((text, false)) => ToolResult::text(text),
                Ok((text, true)) => ToolResult::error(text),
                Err(e) => ToolResult::error(format!(
                    "MCP tool '{}' failed: {}",
                    self.name, e
                )),
            },
            _ = cancel.cancelled() => ToolResult::error("Tool execution cancelled"),
        }
    }
}
