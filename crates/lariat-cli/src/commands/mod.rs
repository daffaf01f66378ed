//! CLI subcommands

pub mod chat;
pub mod eval;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use lariat_agent::{Agent, AgentConfig, ProviderTransport, ResponseSizeGuard, Transport};
use lariat_mcp::{resolve_servers_path, McpManager, ServersConfig};

use crate::config::{Config, GuardSettings};
use crate::prompts;

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Build the guard from settings. Summarize is the default strategy;
/// "off" disables the guard entirely.
fn build_guard(
    settings: &GuardSettings,
    transport: Arc<dyn Transport>,
    default_model: &str,
) -> Option<ResponseSizeGuard> {
    let trigger = settings
        .trigger_tokens
        .unwrap_or(lariat_agent::guard::DEFAULT_TRIGGER_TOKENS);

    match settings.strategy.as_deref().unwrap_or("summarize") {
        "off" => None,
        "truncate" => Some(ResponseSizeGuard::truncate(
            trigger,
            settings.head_units.unwrap_or(4000),
            settings.tail_units.unwrap_or(4000),
        )),
        "summarize" => {
            let model = settings
                .summary_model
                .clone()
                .unwrap_or_else(|| default_model.to_string());
            Some(ResponseSizeGuard::summarize(
                transport,
                model,
                trigger,
                settings
                    .summary_max_tokens
                    .unwrap_or(lariat_agent::guard::DEFAULT_SUMMARY_MAX_TOKENS),
            ))
        }
        other => {
            tracing::warn!("unknown guard strategy '{}', guard disabled", other);
            None
        }
    }
}

/// Assemble the agent: transport, system prompt, guard, and MCP tools.
pub async fn build_agent(
    config: &Config,
    model_override: Option<String>,
    temperature_override: Option<f32>,
) -> anyhow::Result<Agent> {
    let transport: Arc<dyn Transport> = Arc::new(
        ProviderTransport::from_env()
            .context("No API key found. Set ANTHROPIC_API_KEY in your environment.")?,
    );

    let model = model_override
        .or_else(|| config.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let agent_config = AgentConfig {
        system_prompt: Some(prompts::render_prompt(&prompts::load_prompt_template(
            config,
        ))),
        model: model.clone(),
        max_tokens: config.max_tokens.unwrap_or(4096),
        max_turns: config.max_turns.unwrap_or(50),
        temperature: temperature_override.or(config.temperature),
    };

    let mut agent = Agent::new(agent_config, transport.clone());
    if let Some(guard) = build_guard(&config.guard, transport, &model) {
        agent = agent.with_guard(guard);
    }

    let candidates = [
        std::path::PathBuf::from("servers.toml"),
        Config::config_dir().join("servers.toml"),
    ];
    let servers_path =
        resolve_servers_path(config.mcp_servers.as_deref().map(Path::new), &candidates);
    if let Some(path) = servers_path {
        let servers = ServersConfig::load(&path)
            .with_context(|| format!("failed to load MCP manifest {}", path.display()))?;
        let manager = McpManager::connect_all(&servers).await;
        tracing::info!(
            "{} MCP server(s) connected, {} tool(s) available",
            manager.server_count(),
            manager.tools().len()
        );
        agent.set_tools(manager.into_tools());
    } else {
        tracing::info!("no MCP servers manifest found, starting without tools");
    }

    Ok(agent)
}
