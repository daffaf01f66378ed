//! Connecting configured servers and collecting their tools

use std::sync::Arc;

use lariat_agent::BoxedTool;

use crate::client::McpClient;
use crate::config::ServersConfig;
use crate::tool::McpTool;

/// Holds live server connections and the tools they provide. A server
/// that fails to connect or list tools is skipped with a warning so one
/// bad entry does not take down the whole agent.
#[derive(Default)]
pub struct McpManager {
    clients: Vec<Arc<McpClient>>,
    tools: Vec<BoxedTool>,
}

impl McpManager {
    /// Connect to every server in the manifest
    pub async fn connect_all(config: &ServersConfig) -> Self {
        let mut manager = Self::default();

        for (name, server) in &config.servers {
            let client = match McpClient::connect(name, server).await {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    tracing::warn!("failed to connect to MCP server '{}': {}", name, e);
                    continue;
                }
            };

            let descriptors = match client.list_tools().await {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    tracing::warn!("failed to list tools on MCP server '{}': {}", name, e);
                    continue;
                }
            };

            tracing::info!(
                "connected to MCP server '{}' with {} tools",
                name,
                descriptors.len()
            );
            for descriptor in descriptors {
                manager
                    .tools
                    .push(Arc::new(McpTool::new(client.clone(), descriptor)) as BoxedTool);
            }
            manager.clients.push(client);
        }

        manager
    }

    /// Tools collected from all connected servers
    pub fn tools(&self) -> &[BoxedTool] {
        &self.tools
    }

    /// Take ownership of the tools for handing to an agent
    pub fn into_tools(self) -> Vec<BoxedTool> {
        self.tools
    }

    /// Number of connected servers
    pub fn server_count(&self) -> usize {
        self.clients.len()
    }
}
