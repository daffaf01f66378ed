//! Agent state management and execution

use std::collections::HashMap;
use std::sync::Arc;

use lariat_ai::{ChatRequest, Content, Message, Usage};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{
    conversation::Conversation,
    error::{Error, Result},
    events::AgentEvent,
    guard::ResponseSizeGuard,
    tool::{to_api_tool, BoxedTool, ToolResult},
    transport::Transport,
};

/// Agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// System prompt
    pub system_prompt: Option<String>,
    /// Model identifier
    pub model: String,
    /// Maximum tokens per response
    pub max_tokens: u32,
    /// Maximum model turns per run before giving up
    pub max_turns: u32,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8192,
            max_turns: 50,
            temperature: None,
        }
    }
}

/// The main agent that orchestrates conversations
pub struct Agent {
    config: AgentConfig,
    conversation: Conversation,
    tools: Vec<BoxedTool>,
    transport: Arc<dyn Transport>,
    guard: Option<ResponseSizeGuard>,
    event_tx: broadcast::Sender<AgentEvent>,
    cancel: Mutex<CancellationToken>,

    /// Cached compiled JSON schema validators keyed by tool name
    schema_cache: HashMap<String, Arc<jsonschema::Validator>>,
}

impl Agent {
    /// Create a new agent
    pub fn new(config: AgentConfig, transport: Arc<dyn Transport>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            conversation: Conversation::default(),
            tools: vec![],
            transport,
            guard: None,
            event_tx,
            cancel: Mutex::new(CancellationToken::new()),
            schema_cache: HashMap::new(),
        }
    }

    /// Install a response size guard applied to the per-turn context
    pub fn with_guard(mut self, guard: ResponseSizeGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Subscribe to agent events
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.event_tx.subscribe()
    }

    /// Get the current conversation state
    pub fn state(&self) -> &Conversation {
        &self.conversation
    }

    /// Get the agent config
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Set the system prompt
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.config.system_prompt = Some(prompt.into());
    }

    /// Add a tool
    pub fn add_tool(&mut self, tool: BoxedTool) {
        self.cache_tool_schema(&tool);
        self.tools.push(tool);
    }

    /// Set tools (replaces existing)
    pub fn set_tools(&mut self, tools: Vec<BoxedTool>) {
        self.schema_cache.clear();
        for tool in &tools {
            self.cache_tool_schema(tool);
        }
        self.tools = tools;
    }

    /// Compile and cache the JSON schema validator for a tool.
    fn cache_tool_schema(&mut self, tool: &BoxedTool) {
        let schema = tool.parameters_schema();
        match jsonschema::validator_for(&schema) {
            Ok(validator) => {
                self.schema_cache
                    .insert(tool.name().to_string(), Arc::new(validator));
            }
            Err(e) => {
                tracing::warn!(
                    "Invalid tool parameter schema for '{}', skipping validation: {}",
                    tool.name(),
                    e
                );
            }
        }
    }

    /// Get tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Clear all messages
    pub fn clear_messages(&mut self) {
        self.conversation.messages.clear();
        self.conversation.total_usage = Usage::default();
        self.conversation.error = None;
    }

    /// Set messages (for loading from a saved session)
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.conversation.messages = messages;
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.conversation.messages
    }

    /// Cancel the current run
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Send a message and run the agent loop
    pub async fn prompt(&mut self, input: &str) -> Result<()> {
        self.prompt_with_content(vec![Content::text(input)]).await
    }

    /// Send a message with multiple content blocks
    pub async fn prompt_with_content(&mut self, content: Vec<Content>) -> Result<()> {
        let user_message = Message::User {
            content,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        self.run_with_message(user_message).await
    }

    /// Build the completion request for the current turn.
    fn build_request(&self, messages: Vec<Message>) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            system: self.config.system_prompt.clone(),
            messages,
            tools: self.tools.iter().map(|t| to_api_tool(t.as_ref())).collect(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Derive the context for this turn, applying the response size guard.
    /// The canonical history is left untouched.
    async fn derive_context(&self) -> Result<Vec<Message>> {
        let Some(guard) = &self.guard else {
            return Ok(self.conversation.messages.clone());
        };

        let outcome = guard.apply(&self.conversation.messages).await?;
        if let Some(reduction) = outcome.reduction {
            if let Some(Message::ToolResult { tool_call_id, .. }) = outcome.messages.last() {
                let _ = self.event_tx.send(AgentEvent::GuardTriggered {
                    tool_call_id: tool_call_id.clone(),
                    tokens_before: reduction.tokens_before,
                    tokens_after: reduction.tokens_after,
                });
            }
        }
        Ok(outcome.messages)
    }

    /// Add turn usage to cumulative totals.
    fn accumulate_usage(&mut self, turn_usage: &Usage) {
        self.conversation.total_usage.input += turn_usage.input;
        self.conversation.total_usage.output += turn_usage.output;
        self.conversation.total_usage.cache_read += turn_usage.cache_read;
        self.conversation.total_usage.cache_write += turn_usage.cache_write;
    }

    /// Execute the tool calls from an assistant message in order.
    async fn execute_tool_calls(
        &self,
        tool_calls: Vec<(String, String, serde_json::Value)>,
    ) -> Vec<Message> {
        let mut tool_results = vec![];

        for (id, name, args) in tool_calls {
            let tool = self.tools.iter().find(|t| t.name() == name);

            let _ = self.event_tx.send(AgentEvent::ToolExecutionStart {
                tool_call_id: id.clone(),
                tool_name: name.clone(),
                arguments: args.clone(),
            });

            let result = if let Some(tool) = tool {
                let validation_error = self
                    .schema_cache
                    .get(name.as_str())
                    .and_then(|validator| validate_with_validator(&args, validator));

                if let Some(err) = validation_error {
                    ToolResult::error(err)
                } else {
                    let cancel = self.cancel.lock().clone();
                    tool.execute(&id, args, cancel).await
                }
            } else {
                ToolResult::error(format!("Tool not found: {}", name))
            };

            let _ = self.event_tx.send(AgentEvent::ToolExecutionEnd {
                tool_call_id: id.clone(),
                tool_name: name.clone(),
                result: result.text_content(),
                is_error: result.is_error,
            });

            tool_results.push(Message::tool_result(id, name, result.content, result.is_error));
        }

        tool_results
    }

    /// Core agent loop.
    async fn run_with_message(&mut self, user_message: Message) -> Result<()> {
        *self.cancel.lock() = CancellationToken::new();
        self.conversation.error = None;
        self.conversation.messages.push(user_message);
        let _ = self.event_tx.send(AgentEvent::AgentStart);

        let mut turn = 0u32;
        let result = loop {
            if turn >= self.config.max_turns {
                break Err(Error::TurnLimit(self.config.max_turns));
            }
            if self.cancel.lock().is_cancelled() {
                break Err(Error::Cancelled);
            }
            turn += 1;
            let _ = self.event_tx.send(AgentEvent::TurnStart { turn_number: turn });

            let context = match self.derive_context().await {
                Ok(context) => context,
                Err(e) => break Err(e),
            };
            let request = self.build_request(context);

            let completion = match self.transport.complete(request).await {
                Ok(completion) => completion,
                Err(e) => break Err(Error::Ai(e)),
            };

            self.accumulate_usage(&completion.usage);
            self.conversation.messages.push(completion.message.clone());
            let _ = self.event_tx.send(AgentEvent::MessageEnd {
                message: completion.message.clone(),
            });
            let _ = self.event_tx.send(AgentEvent::TurnEnd {
                turn_number: turn,
                usage: completion.usage.clone(),
            });

            let tool_calls: Vec<(String, String, serde_json::Value)> = completion
                .message
                .tool_calls()
                .into_iter()
                .map(|(id, name, args)| (id.to_string(), name.to_string(), args.clone()))
                .collect();

            if tool_calls.is_empty() {
                break Ok(());
            }

            let tool_results = self.execute_tool_calls(tool_calls).await;
            self.conversation.messages.extend(tool_results);
        };

        if let Err(e) = &result {
            let message = e.to_string();
            self.conversation.error = Some(message.clone());
            let _ = self.event_tx.send(AgentEvent::Error { message });
        }

        let _ = self.event_tx.send(AgentEvent::AgentEnd {
            total_turns: turn,
            total_usage: self.conversation.total_usage.clone(),
        });

        result
    }
}

/// Validate tool arguments using a pre-compiled validator.
/// Returns `Some(error_message)` if validation fails, `None` if valid.
fn validate_with_validator(
    args: &serde_json::Value,
    validator: &jsonschema::Validator,
) -> Option<String> {
    let errors: Vec<String> = validator
        .iter_errors(args)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Tool argument validation failed:\n{}",
            errors.join("\n")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lariat_ai::{AssistantMetadata, Completion, StopReason};
    use std::collections::VecDeque;

    /// Transport that replays scripted completions and records requests.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Completion>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Completion>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(vec![]),
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn complete(&self, request: ChatRequest) -> lariat_ai::Result<Completion> {
            self.requests.lock().push(request);
            self.responses
                .lock()
                .pop_front()
                .ok_or_else(|| lariat_ai::Error::api("invalid_request_error", "script exhausted"))
        }
    }

    fn text_completion(text: &str) -> Completion {
        Completion {
            message: Message::assistant(text),
            stop_reason: StopReason::Stop,
            usage: Usage {
                input: 10,
                output: 5,
                ..Default::default()
            },
        }
    }

    fn tool_call_completion(id: &str, name: &str, args: serde_json::Value) -> Completion {
        Completion {
            message: Message::Assistant {
                content: vec![Content::tool_call(id, name, args)],
                metadata: AssistantMetadata::default(),
            },
            stop_reason: StopReason::ToolUse,
            usage: Usage {
                input: 10,
                output: 5,
                ..Default::default()
            },
        }
    }

    struct RepeatTool {
        output: String,
    }

    #[async_trait]
    impl crate::tool::Tool for RepeatTool {
        fn name(&self) -> &str {
            "repeat"
        }
        fn description(&self) -> &str {
            "Returns a fixed payload"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            })
        }
        async fn execute(
            &self,
            _tool_call_id: &str,
            _arguments: serde_json::Value,
            _cancel: CancellationToken,
        ) -> ToolResult {
            ToolResult::text(self.output.clone())
        }
    }

    #[tokio::test]
    async fn test_single_turn_text_response() {
        let transport = ScriptedTransport::new(vec![text_completion("hello there")]);
        let mut agent = Agent::new(AgentConfig::default(), transport.clone());

        agent.prompt("hi").await.unwrap();

        assert_eq!(agent.messages().len(), 2);
        assert_eq!(agent.messages()[1].text(), "hello there");
        assert_eq!(agent.state().total_usage.input, 10);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_call_round_trip() {
        let transport = ScriptedTransport::new(vec![
            tool_call_completion("call_1", "repeat", serde_json::json!({"query": "x"})),
            text_completion("done"),
        ]);
        let mut agent = Agent::new(AgentConfig::default(), transport.clone());
        agent.add_tool(Arc::new(RepeatTool {
            output: "payload".to_string(),
        }));

        agent.prompt("go").await.unwrap();

        // user, assistant(tool call), tool result, assistant(text)
        assert_eq!(agent.messages().len(), 4);
        match &agent.messages()[2] {
            Message::ToolResult {
                tool_call_id,
                is_error,
                ..
            } => {
                assert_eq!(tool_call_id, "call_1");
                assert!(!is_error);
            }
            other => panic!("expected ToolResult, got {:?}", other),
        }
        // Second request carries the tool result back to the model
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn test_schema_validation_rejects_bad_args() {
        let transport = ScriptedTransport::new(vec![
            tool_call_completion("call_1", "repeat", serde_json::json!({"query": 42})),
            text_completion("ok"),
        ]);
        let mut agent = Agent::new(AgentConfig::default(), transport);
        agent.add_tool(Arc::new(RepeatTool {
            output: "unused".to_string(),
        }));

        agent.prompt("go").await.unwrap();

        match &agent.messages()[2] {
            Message::ToolResult {
                is_error, content, ..
            } => {
                assert!(is_error);
                assert!(content[0]
                    .to_text()
                    .contains("Tool argument validation failed"));
            }
            other => panic!("expected ToolResult, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_produces_error_result() {
        let transport = ScriptedTransport::new(vec![
            tool_call_completion("call_1", "missing", serde_json::json!({})),
            text_completion("ok"),
        ]);
        let mut agent = Agent::new(AgentConfig::default(), transport);

        agent.prompt("go").await.unwrap();

        match &agent.messages()[2] {
            Message::ToolResult {
                is_error, content, ..
            } => {
                assert!(is_error);
                assert!(content[0].to_text().contains("Tool not found"));
            }
            other => panic!("expected ToolResult, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_turn_limit() {
        let transport = ScriptedTransport::new(vec![
            tool_call_completion("c1", "repeat", serde_json::json!({"query": "a"})),
            tool_call_completion("c2", "repeat", serde_json::json!({"query": "b"})),
            tool_call_completion("c3", "repeat", serde_json::json!({"query": "c"})),
        ]);
        let config = AgentConfig {
            max_turns: 2,
            ..Default::default()
        };
        let mut agent = Agent::new(config, transport);
        agent.add_tool(Arc::new(RepeatTool {
            output: "x".to_string(),
        }));

        let err = agent.prompt("go").await.unwrap_err();
        assert!(matches!(err, Error::TurnLimit(2)));
        assert!(agent.state().error.is_some());
    }

    #[tokio::test]
    async fn test_guard_shrinks_derived_context_not_history() {
        let big = "word ".repeat(8000);
        let transport = ScriptedTransport::new(vec![
            tool_call_completion("call_big", "repeat", serde_json::json!({"query": "x"})),
            text_completion("summarized fine"),
        ]);
        let mut agent = Agent::new(AgentConfig::default(), transport.clone())
            .with_guard(ResponseSizeGuard::truncate(100, 10, 10));
        agent.add_tool(Arc::new(RepeatTool { output: big.clone() }));

        agent.prompt("go").await.unwrap();

        // Canonical history keeps the full tool result
        match &agent.messages()[2] {
            Message::ToolResult { content, .. } => {
                assert_eq!(content[0].to_text(), big);
            }
            other => panic!("expected ToolResult, got {:?}", other),
        }

        // The second model request saw the truncated version
        let requests = transport.requests();
        let sent = requests[1].messages.last().unwrap();
        match sent {
            Message::ToolResult {
                tool_call_id,
                content,
                ..
            } => {
                assert_eq!(tool_call_id, "call_big");
                let text = content[0].to_text();
                assert!(text.len() < big.len());
                assert!(text.contains("words omitted"));
            }
            other => panic!("expected ToolResult, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_guard_emits_event() {
        let transport = ScriptedTransport::new(vec![
            tool_call_completion("call_big", "repeat", serde_json::json!({"query": "x"})),
            text_completion("ok"),
        ]);
        let mut agent = Agent::new(AgentConfig::default(), transport)
            .with_guard(ResponseSizeGuard::truncate(100, 10, 10));
        agent.add_tool(Arc::new(RepeatTool {
            output: "word ".repeat(8000),
        }));
        let mut events = agent.subscribe();

        agent.prompt("go").await.unwrap();

        let mut saw_guard = false;
        while let Ok(event) = events.try_recv() {
            if let AgentEvent::GuardTriggered {
                tool_call_id,
                tokens_before,
                tokens_after,
            } = event
            {
                assert_eq!(tool_call_id, "call_big");
                assert!(tokens_after < tokens_before);
                saw_guard = true;
            }
        }
        assert!(saw_guard);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let transport = ScriptedTransport::new(vec![]);
        let mut agent = Agent::new(AgentConfig::default(), transport);

        let err = agent.prompt("go").await.unwrap_err();
        assert!(err.to_string().contains("script exhausted"));
        assert!(agent.state().error.is_some());
    }
}
