//! MCP server manifest loading
//!
//! Servers are declared in a TOML manifest:
//!
//! ```toml
//! [servers.filesystem]
//! transport = "stdio"
//! command = "npx"
//! args = ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
//!
//! [servers.deepwiki]
//! transport = "streamable_http"
//! url = "https://mcp.deepwiki.com/mcp"
//! headers = { Authorization = "Bearer ${DEEPWIKI_TOKEN}" }
//! ```
//!
//! `${VAR}` references anywhere in a string value are replaced from the
//! process environment at load time. Unset variables expand to the empty
//! string with a warning, matching how a missing secret should fail at
//! the server rather than at config parse time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Environment variable naming an explicit servers manifest path
pub const SERVERS_PATH_ENV: &str = "LARIAT_MCP_SERVERS";

/// Default manifest file name
pub const SERVERS_FILE_NAME: &str = "servers.toml";

/// The full servers manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServersConfig {
    /// Server name -> connection settings
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
}

/// Connection settings for a single MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum ServerConfig {
    /// Child process speaking JSON-RPC over stdin/stdout
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    /// Streamable HTTP endpoint
    StreamableHttp {
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    /// Legacy SSE endpoint (accepted in the manifest, rejected at connect)
    Sse {
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl ServersConfig {
    /// Load and parse a manifest, expanding `${VAR}` references
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse manifest text, expanding `${VAR}` references
    pub fn parse(raw: &str) -> Result<Self> {
        let config: ServersConfig = toml::from_str(raw)?;
        Ok(config.expand_env())
    }

    fn expand_env(mut self) -> Self {
        for server in self.servers.values_mut() {
            match server {
                ServerConfig::Stdio { command, args, env } => {
                    *command = expand_vars(command);
                    for arg in args.iter_mut() {
                        *arg = expand_vars(arg);
                    }
                    for value in env.values_mut() {
                        *value = expand_vars(value);
                    }
                }
                ServerConfig::StreamableHttp { url, headers }
                | ServerConfig::Sse { url, headers } => {
                    *url = expand_vars(url);
                    for value in headers.values_mut() {
                        *value = expand_vars(value);
                    }
                }
            }
        }
        self
    }
}

/// Replace every `${NAME}` in `input` with the value of the environment
/// variable `NAME`. Unset variables expand to the empty string.
fn expand_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => {
                        tracing::warn!("environment variable '{}' is not set", name);
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated reference, keep the literal text
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Pick the servers manifest path: an explicit path wins, then the
/// `LARIAT_MCP_SERVERS` environment variable, then the first existing
/// entry of the caller-supplied candidate list. Returns `None` when no
/// manifest exists, which simply means no MCP tools.
pub fn resolve_servers_path(explicit: Option<&Path>, candidates: &[PathBuf]) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(SERVERS_PATH_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    candidates.iter().find(|p| p.exists()).cloned()
}
