//! Core types for LLM interactions

use serde::{Deserialize, Serialize};

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u32,
    pub output: u32,
    pub cache_read: u32,
    pub cache_write: u32,
}

/// Reason why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of response
    Stop,
    /// Maximum tokens reached
    Length,
    /// Tool use requested
    ToolUse,
    /// Error occurred
    Error,
}

/// Content blocks in messages.
///
/// A closed set of variants: plain text, structured JSON (tool output that
/// arrived as data rather than prose), and tool call requests. `to_text`
/// is total over all variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Text content
    Text { text: String },
    /// Structured content (rendered to JSON when sent to a model)
    Json { value: serde_json::Value },
    /// Tool call request
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
}

impl Content {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create structured content
    pub fn json(value: serde_json::Value) -> Self {
        Self::Json { value }
    }

    /// Create a tool call
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Get text if this is text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Render this block as plain text. Total: structured content is
    /// serialized, tool calls render as `name(arguments)`.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Json { value } => serde_json::to_string(value).unwrap_or_default(),
            Self::ToolCall {
                name, arguments, ..
            } => format!(
                "{}({})",
                name,
                serde_json::to_string(arguments).unwrap_or_default()
            ),
        }
    }

    /// Check if this is a tool call
    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }
}

/// Message roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// User message
    User {
        content: Vec<Content>,
        #[serde(default)]
        timestamp: i64,
    },
    /// Assistant response
    Assistant {
        content: Vec<Content>,
        #[serde(flatten)]
        metadata: AssistantMetadata,
    },
    /// Tool result
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        content: Vec<Content>,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        timestamp: i64,
    },
}

/// Metadata for assistant messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMetadata {
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Usage,
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub timestamp: i64,
}

impl Message {
    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            content: vec![Content::text(text)],
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create an assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: vec![Content::text(text)],
            metadata: AssistantMetadata {
                timestamp: chrono::Utc::now().timestamp_millis(),
                ..Default::default()
            },
        }
    }

    /// Create a tool result message
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: Vec<Content>,
        is_error: bool,
    ) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content,
            is_error,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Get the role as a string
    pub fn role(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::ToolResult { .. } => "tool_result",
        }
    }

    /// Get the content blocks
    pub fn content(&self) -> &[Content] {
        match self {
            Self::User { content, .. } => content,
            Self::Assistant { content, .. } => content,
            Self::ToolResult { content, .. } => content,
        }
    }

    /// Extract all tool calls from an assistant message
    pub fn tool_calls(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        match self {
            Self::Assistant { content, .. } => content
                .iter()
                .filter_map(|c| match c {
                    Content::ToolCall {
                        id,
                        name,
                        arguments,
                    } => Some((id.as_str(), name.as_str(), arguments)),
                    _ => None,
                })
                .collect(),
            _ => vec![],
        }
    }

    /// Get combined text content. Structured blocks are serialized;
    /// tool call blocks are skipped.
    pub fn text(&self) -> String {
        self.content()
            .iter()
            .filter_map(|c| match c {
                Content::Text { .. } | Content::Json { .. } => Some(c.to_text()),
                Content::ToolCall { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Tool definition for function calling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name (used in API calls)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for parameters
    pub input_schema: serde_json::Value,
}

impl ToolSpec {
    /// Create a new tool definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A single completion request
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Model identifier (e.g., "claude-sonnet-4-20250514")
    pub model: String,
    /// System prompt
    pub system: Option<String>,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Available tools
    pub tools: Vec<ToolSpec>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 - 1.0)
    pub temperature: Option<f32>,
}

/// A completed model response
#[derive(Debug, Clone)]
pub struct Completion {
    /// The assistant message
    pub message: Message,
    /// Why generation stopped
    pub stop_reason: StopReason,
    /// Token usage for this request
    pub usage: Usage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_to_text_total() {
        assert_eq!(Content::text("hi").to_text(), "hi");
        assert_eq!(
            Content::json(serde_json::json!({"a": 1})).to_text(),
            "{\"a\":1}"
        );
        let call = Content::tool_call("id1", "read", serde_json::json!({"path": "/x"}));
        assert_eq!(call.to_text(), "read({\"path\":\"/x\"})");
    }

    #[test]
    fn test_message_text_skips_tool_calls() {
        let msg = Message::Assistant {
            content: vec![
                Content::text("let me check"),
                Content::tool_call("id1", "list", serde_json::json!({})),
            ],
            metadata: AssistantMetadata::default(),
        };
        assert_eq!(msg.text(), "let me check");
    }

    #[test]
    fn test_message_text_renders_json_blocks() {
        let msg = Message::tool_result(
            "call_1",
            "search",
            vec![Content::json(serde_json::json!(["a", "b"]))],
            false,
        );
        assert_eq!(msg.text(), "[\"a\",\"b\"]");
    }

    #[test]
    fn test_tool_calls_extraction() {
        let msg = Message::Assistant {
            content: vec![
                Content::text("running"),
                Content::tool_call("c1", "read", serde_json::json!({"path": "/a"})),
                Content::tool_call("c2", "write", serde_json::json!({"path": "/b"})),
            ],
            metadata: AssistantMetadata::default(),
        };
        let calls = msg.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, "read");
        assert_eq!(calls[1].0, "c2");
    }

    #[test]
    fn test_tool_calls_empty_for_user() {
        assert!(Message::user("hi").tool_calls().is_empty());
    }
}
