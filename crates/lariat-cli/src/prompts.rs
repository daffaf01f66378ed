//! System prompt loading and rendering

use crate::config::Config;

/// Built-in system prompt, used when no prompt file is configured
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful AI agent with tool access over the Model Context Protocol (MCP).

## Your Capabilities
You have access to tools provided by configured MCP servers and should use \
them to help users accomplish their goals.

## Guidelines
1. Use UTC timestamps when working with time-sensitive data
2. Be precise and methodical in your reasoning
3. Ask for clarification if goals are ambiguous
4. Use the most appropriate tool for each task
5. Provide clear, concise responses about what you've accomplished

## Time Context
Current UTC time: {current_time}
";

/// Load the system prompt template: the configured file wins, otherwise
/// the built-in default.
pub fn load_prompt_template(config: &Config) -> String {
    let Some(path) = &config.system_prompt_file else {
        return DEFAULT_SYSTEM_PROMPT.to_string();
    };

    match std::fs::read_to_string(expand_tilde(path)) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(
                "failed to read system prompt file '{}': {}, using built-in prompt",
                path,
                e
            );
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}

/// Render the template, substituting `{current_time}`. Other braced
/// placeholders are left alone so prompt text with literal braces is safe.
pub fn render_prompt(template: &str) -> String {
    template.replace("{current_time}", &format_current_time())
}

/// Current UTC time formatted for prompts
pub fn format_current_time() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn expand_tilde(path: &str) -> std::path::PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    std::path::PathBuf::from(path)
}
