//! Anthropic Messages API client (non-streaming)

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    types::{ChatRequest, Completion, Content, Message, StopReason, ToolSpec, Usage},
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API client
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    /// Create a new client with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from the ANTHROPIC_API_KEY environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::InvalidApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Override the API base URL (for proxies and tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Request a single completion from the Messages API.
    pub async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
        let wire = build_request(request);
        let url = format!("{}/v1/messages", self.base_url);

        tracing::debug!(model = %request.model, url = %url, "anthropic request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("accept", "application/json")
            .json(&wire)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(Error::RateLimited { retry_after });
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(parse_error_body(&body, status));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| Error::UnexpectedResponse(format!("{}: {}", e, truncate(&body, 200))))?;

        Ok(build_completion(parsed))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn parse_error_body(body: &str, status: reqwest::StatusCode) -> Error {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => Error::api(parsed.error.error_type, parsed.error.message),
        Err(_) => Error::api(
            format!("http_{}", status.as_u16()),
            truncate(body, 200).to_string(),
        ),
    }
}

fn build_completion(response: MessagesResponse) -> Completion {
    let content: Vec<Content> = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ResponseBlock::Text { text } => Some(Content::Text { text }),
            ResponseBlock::ToolUse { id, name, input } => Some(Content::ToolCall {
                id,
                name,
                arguments: input,
            }),
            ResponseBlock::Unknown => None,
        })
        .collect();

    let stop_reason = map_stop_reason(response.stop_reason.as_deref());
    let usage = Usage {
        input: response.usage.input_tokens,
        output: response.usage.output_tokens,
        cache_read: response.usage.cache_read_input_tokens.unwrap_or(0),
        cache_write: response.usage.cache_creation_input_tokens.unwrap_or(0),
    };

    let message = Message::Assistant {
        content,
        metadata: crate::types::AssistantMetadata {
            model: Some(response.model),
            usage: usage.clone(),
            stop_reason: Some(stop_reason),
            timestamp: chrono::Utc::now().timestamp_millis(),
        },
    };

    Completion {
        message,
        stop_reason,
        usage,
    }
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

fn build_request(request: &ChatRequest) -> WireRequest {
    let tools = if request.tools.is_empty() {
        None
    } else {
        Some(convert_tools(&request.tools))
    };

    WireRequest {
        model: request.model.clone(),
        messages: convert_messages(&request.messages),
        max_tokens: request.max_tokens,
        system: request.system.clone(),
        temperature: request.temperature,
        tools,
    }
}

fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
    let mut result = vec![];

    for message in messages {
        match message {
            Message::User { content, .. } => {
                let blocks: Vec<serde_json::Value> = content
                    .iter()
                    .map(|c| serde_json::json!({ "type": "text", "text": c.to_text() }))
                    .collect();
                result.push(WireMessage {
                    role: "user".to_string(),
                    content: serde_json::Value::Array(blocks),
                });
            }
            Message::Assistant { content, .. } => {
                let blocks: Vec<serde_json::Value> = content
                    .iter()
                    .map(|c| match c {
                        Content::ToolCall {
                            id,
                            name,
                            arguments,
                        } => serde_json::json!({
                            "type": "tool_use",
                            "id": id,
                            "name": name,
                            "input": arguments
                        }),
                        other => serde_json::json!({ "type": "text", "text": other.to_text() }),
                    })
                    .collect();

                if !blocks.is_empty() {
                    result.push(WireMessage {
                        role: "assistant".to_string(),
                        content: serde_json::Value::Array(blocks),
                    });
                }
            }
            Message::ToolResult {
                tool_call_id,
                content,
                is_error,
                ..
            } => {
                // Tool results ride in user-role messages on this API
                let text_content: String = content
                    .iter()
                    .map(|c| c.to_text())
                    .collect::<Vec<_>>()
                    .join("\n");

                let tool_result = serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": tool_call_id,
                    "content": text_content,
                    "is_error": is_error
                });

                result.push(WireMessage {
                    role: "user".to_string(),
                    content: serde_json::Value::Array(vec![tool_result]),
                });
            }
        }
    }

    result
}

fn convert_tools(tools: &[ToolSpec]) -> Vec<WireTool> {
    tools
        .iter()
        .map(|tool| {
            let input_schema = if tool.input_schema.is_object() {
                let mut schema = tool.input_schema.clone();
                if let Some(obj) = schema.as_object_mut() {
                    obj.entry("type").or_insert(serde_json::json!("object"));
                }
                schema
            } else {
                serde_json::json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                })
            };

            WireTool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema,
            }
        })
        .collect()
}

fn map_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("end_turn") | Some("stop_sequence") => StopReason::Stop,
        Some("max_tokens") => StopReason::Length,
        Some("tool_use") => StopReason::ToolUse,
        _ => StopReason::Stop,
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
    cache_read_input_tokens: Option<u32>,
    cache_creation_input_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(messages: Vec<Message>) -> ChatRequest {
        ChatRequest {
            model: "claude-sonnet-4-20250514".into(),
            system: Some("be brief".into()),
            messages,
            tools: vec![],
            max_tokens: 1024,
            temperature: Some(0.1),
        }
    }

    #[test]
    fn test_tool_result_becomes_user_role() {
        let messages = vec![Message::tool_result(
            "call_9",
            "list",
            vec![Content::text("a.txt\nb.txt")],
            false,
        )];
        let wire = convert_messages(&messages);
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].role, "user");
        let block = &wire[0].content[0];
        assert_eq!(block["type"], "tool_result");
        assert_eq!(block["tool_use_id"], "call_9");
        assert_eq!(block["content"], "a.txt\nb.txt");
    }

    #[test]
    fn test_structured_tool_result_serialized() {
        let messages = vec![Message::tool_result(
            "call_1",
            "search",
            vec![Content::json(serde_json::json!({"hits": 3}))],
            false,
        )];
        let wire = convert_messages(&messages);
        assert_eq!(wire[0].content[0]["content"], "{\"hits\":3}");
    }

    #[test]
    fn test_assistant_tool_call_block() {
        let messages = vec![Message::Assistant {
            content: vec![
                Content::text("checking"),
                Content::tool_call("c1", "read", serde_json::json!({"path": "/f"})),
            ],
            metadata: Default::default(),
        }];
        let wire = convert_messages(&messages);
        assert_eq!(wire[0].role, "assistant");
        assert_eq!(wire[0].content[0]["type"], "text");
        assert_eq!(wire[0].content[1]["type"], "tool_use");
        assert_eq!(wire[0].content[1]["name"], "read");
    }

    #[test]
    fn test_build_request_omits_empty_tools() {
        let wire = build_request(&request_with(vec![Message::user("hi")]));
        assert!(wire.tools.is_none());
        assert_eq!(wire.system.as_deref(), Some("be brief"));
    }

    #[test]
    fn test_tool_schema_defaulted_when_malformed() {
        let tools = vec![ToolSpec::new("broken", "bad schema", serde_json::json!(42))];
        let wire = convert_tools(&tools);
        assert_eq!(wire[0].input_schema["type"], "object");
        assert!(wire[0].input_schema["properties"].is_object());
    }

    #[test]
    fn test_tool_schema_type_defaulted_on_object() {
        let tools = vec![ToolSpec::new(
            "list",
            "list things",
            serde_json::json!({"properties": {"path": {"type": "string"}}}),
        )];
        let wire = convert_tools(&tools);
        assert_eq!(wire[0].input_schema["type"], "object");
    }

    #[test]
    fn test_map_stop_reason() {
        assert_eq!(map_stop_reason(Some("end_turn")), StopReason::Stop);
        assert_eq!(map_stop_reason(Some("max_tokens")), StopReason::Length);
        assert_eq!(map_stop_reason(Some("tool_use")), StopReason::ToolUse);
        assert_eq!(map_stop_reason(None), StopReason::Stop);
    }

    #[test]
    fn test_parse_response_body() {
        let body = r#"{
            "id": "msg_1",
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "text", "text": "hello"},
                {"type": "tool_use", "id": "c1", "name": "read", "input": {"path": "/x"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;
        let parsed: MessagesResponse = serde_json::from_str(body).unwrap();
        let completion = build_completion(parsed);
        assert_eq!(completion.stop_reason, StopReason::ToolUse);
        assert_eq!(completion.usage.input, 10);
        assert_eq!(completion.message.tool_calls().len(), 1);
        assert_eq!(completion.message.text(), "hello");
    }

    #[test]
    fn test_parse_error_body_typed() {
        let body = r#"{"type": "error", "error": {"type": "overloaded_error", "message": "busy"}}"#;
        let err = parse_error_body(body, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        match err {
            Error::Api {
                error_type,
                message,
            } => {
                assert_eq!(error_type, "overloaded_error");
                assert_eq!(message, "busy");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_body_unstructured() {
        let err = parse_error_body("<html>gateway</html>", reqwest::StatusCode::BAD_GATEWAY);
        match err {
            Error::Api { error_type, .. } => assert_eq!(error_type, "http_502"),
            other => panic!("expected Api error, got {:?}", other),
        }
    }
}
