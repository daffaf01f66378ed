//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for lariat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default model to use
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Maximum tokens per response
    pub max_tokens: Option<u32>,
    /// Maximum model turns per run
    pub max_turns: Option<u32>,
    /// Custom system prompt file path
    pub system_prompt_file: Option<String>,
    /// MCP servers manifest path (defaults to servers.toml)
    pub mcp_servers: Option<String>,
    /// Response size guard settings
    #[serde(default)]
    pub guard: GuardSettings,
    /// Evaluation settings
    #[serde(default)]
    pub eval: EvalSettings,
}

/// Response size guard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardSettings {
    /// "summarize", "truncate", or "off"
    pub strategy: Option<String>,
    /// Size estimate above which the latest tool result is reduced
    pub trigger_tokens: Option<u32>,
    /// Target size for a model-written summary
    pub summary_max_tokens: Option<u32>,
    /// Model used for summaries (defaults to the main model)
    pub summary_model: Option<String>,
    /// Leading words kept when truncating
    pub head_units: Option<usize>,
    /// Trailing words kept when truncating
    pub tail_units: Option<usize>,
}

/// Evaluation harness configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalSettings {
    /// Judge model for LLM-as-judge scoring
    pub judge_model: Option<String>,
    /// Tracing project name
    pub project: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lariat")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for LARIAT_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("LARIAT_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            model: Some("claude-sonnet-4-20250514".to_string()),
            temperature: Some(0.1),
            max_tokens: Some(4096),
            max_turns: Some(50),
            ..Default::default()
        };

        default_config.save()?;
        Ok(path)
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# lariat configuration file
# Place at ~/.config/lariat/config.toml (Linux/Mac) or %APPDATA%\lariat\config.toml (Windows)

# Default model to use
model = "claude-sonnet-4-20250514"

# Sampling temperature
temperature = 0.1

# Maximum tokens per response
max_tokens = 4096

# Maximum model turns per run
max_turns = 50

# Custom system prompt file (optional)
# system_prompt_file = "~/.config/lariat/system_prompt.txt"

# MCP servers manifest (optional, defaults to ./servers.toml)
# mcp_servers = "servers.toml"

# Response size guard for oversized tool results
[guard]
# "summarize", "truncate", or "off"
strategy = "summarize"
trigger_tokens = 8000
summary_max_tokens = 256
# Used by the truncate strategy
# head_units = 4000
# tail_units = 4000

# Evaluation harness
[eval]
# judge_model = "claude-3-5-sonnet-latest"
# project = "lariat-agent"
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            model = "claude-sonnet-4-20250514"
            max_turns = 25

            [guard]
            strategy = "truncate"
            trigger_tokens = 4000
            head_units = 2000
            tail_units = 2000
            "#,
        )
        .unwrap();

        assert_eq!(config.model.as_deref(), Some("claude-sonnet-4-20250514"));
        assert_eq!(config.max_turns, Some(25));
        assert_eq!(config.guard.strategy.as_deref(), Some("truncate"));
        assert_eq!(config.guard.head_units, Some(2000));
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.model.is_none());
        assert!(config.guard.strategy.is_none());
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.guard.strategy.as_deref(), Some("summarize"));
        assert_eq!(config.guard.trigger_tokens, Some(8000));
    }
}
