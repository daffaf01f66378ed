//! Response size guard for the latest tool result
//!
//! Before each model call, the guard inspects the most recent message of the
//! derived context. If it is a tool result above the trigger threshold, the
//! guard replaces it with a bounded-size substitute (a model-written summary
//! or a deterministic head/tail truncation) while preserving the tool call
//! id. The canonical conversation history is never touched; the guard only
//! produces a fresh sequence for the current turn.

use std::sync::Arc;

use lariat_ai::{ChatRequest, Content, Message};

use crate::error::Result;
use crate::transport::Transport;

/// Default threshold (approx tokens) above which the latest tool result
/// is reduced.
pub const DEFAULT_TRIGGER_TOKENS: u32 = 8000;

/// Default target size for a model-written summary.
pub const DEFAULT_SUMMARY_MAX_TOKENS: u32 = 256;

const SUMMARY_SYSTEM_PROMPT: &str = "\
You are a precise summarizer. Produce a concise, faithful summary of the \
tool output, preserving key results, errors, identifiers, paths, and any \
actionable items. Do not invent details.";

/// How an oversized tool result is reduced. One policy is selected per
/// deployment; there is no runtime switching.
enum Reducer {
    /// Summarize via a model call through the transport
    Summarize {
        transport: Arc<dyn Transport>,
        model: String,
        max_summary_tokens: u32,
    },
    /// Keep a head and tail window of whitespace-delimited units
    Truncate {
        head_units: usize,
        tail_units: usize,
    },
}

/// Result of applying the guard to a message history.
#[derive(Debug)]
pub struct GuardOutcome {
    /// The effective history to send to the model for this turn
    pub messages: Vec<Message>,
    /// Present when the last message was replaced
    pub reduction: Option<Reduction>,
}

/// Size change recorded when a reduction happened.
#[derive(Debug, Clone, Copy)]
pub struct Reduction {
    pub tokens_before: u32,
    pub tokens_after: u32,
}

/// Guards the per-turn model context against an oversized latest tool result.
pub struct ResponseSizeGuard {
    trigger_tokens: u32,
    reducer: Reducer,
}

impl ResponseSizeGuard {
    /// Guard that summarizes oversized tool results via a model call.
    pub fn summarize(
        transport: Arc<dyn Transport>,
        model: impl Into<String>,
        trigger_tokens: u32,
        max_summary_tokens: u32,
    ) -> Self {
        Self {
            trigger_tokens,
            reducer: Reducer::Summarize {
                transport,
                model: model.into(),
                max_summary_tokens,
            },
        }
    }

    /// Guard that deterministically truncates oversized tool results,
    /// keeping the first `head_units` and last `tail_units` words.
    pub fn truncate(trigger_tokens: u32, head_units: usize, tail_units: usize) -> Self {
        Self {
            trigger_tokens,
            reducer: Reducer::Truncate {
                head_units,
                tail_units,
            },
        }
    }

    /// Derive the effective history for this turn.
    ///
    /// Only the last message is ever inspected or replaced; the input is
    /// never mutated. A summarization failure propagates to the caller
    /// without retry. An empty reduction falls back to the unchanged
    /// history so a contentless tool result is never produced.
    pub async fn apply(&self, history: &[Message]) -> Result<GuardOutcome> {
        let (tool_call_id, tool_name, text, tokens_before) = match history.last() {
            Some(
                last @ Message::ToolResult {
                    tool_call_id,
                    tool_name,
                    ..
                },
            ) => (
                tool_call_id.clone(),
                tool_name.clone(),
                last.text(),
                estimate_tokens(last),
            ),
            _ => return Ok(pass_through(history)),
        };
        if tokens_before <= self.trigger_tokens {
            return Ok(pass_through(history));
        }

        let reduced = match &self.reducer {
            Reducer::Summarize {
                transport,
                model,
                max_summary_tokens,
            } => {
                summarize_text(transport, model, *max_summary_tokens, &text).await?
            }
            Reducer::Truncate {
                head_units,
                tail_units,
            } => truncate_middle(&text, *head_units, *tail_units),
        };

        let reduced = reduced.trim().to_string();
        if reduced.is_empty() {
            tracing::warn!(
                tool_call_id = %tool_call_id,
                "reduction produced empty content, keeping original tool result"
            );
            return Ok(pass_through(history));
        }

        let replacement = Message::tool_result(
            tool_call_id,
            tool_name,
            vec![Content::text(reduced)],
            false,
        );
        let tokens_after = estimate_tokens(&replacement);

        let mut messages: Vec<Message> = history[..history.len() - 1].to_vec();
        messages.push(replacement);

        Ok(GuardOutcome {
            messages,
            reduction: Some(Reduction {
                tokens_before,
                tokens_after,
            }),
        })
    }
}

fn pass_through(history: &[Message]) -> GuardOutcome {
    GuardOutcome {
        messages: history.to_vec(),
        reduction: None,
    }
}

/// Estimate token count for a single message (chars/4 heuristic)
pub fn estimate_tokens(message: &Message) -> u32 {
    let char_count: usize = message
        .content()
        .iter()
        .map(|c| match c {
            Content::Text { text } => text.len(),
            Content::Json { value } => {
                serde_json::to_string(value).unwrap_or_default().len()
            }
            Content::ToolCall {
                name, arguments, ..
            } => name.len() + serde_json::to_string(arguments).unwrap_or_default().len(),
        })
        .sum();
    (char_count / 4) as u32
}

/// Keep the first `head` and last `tail` whitespace-delimited units,
/// marking how many were omitted from the middle. Returns the input
/// unchanged when it already fits in the window.
fn truncate_middle(text: &str, head: usize, tail: usize) -> String {
    let units: Vec<&str> = text.split_whitespace().collect();
    if units.len() <= head + tail {
        return text.to_string();
    }

    let omitted = units.len() - head - tail;
    let head_part = units[..head].join(" ");
    let tail_part = units[units.len() - tail..].join(" ");
    format!(
        "{} ... [{} words omitted] ... {}",
        head_part, omitted, tail_part
    )
}

async fn summarize_text(
    transport: &Arc<dyn Transport>,
    model: &str,
    max_summary_tokens: u32,
    text: &str,
) -> Result<String> {
    let prompt = format!(
        "Summarize the following tool output in at most {} tokens:\n\n{}",
        max_summary_tokens, text
    );

    let request = ChatRequest {
        model: model.to_string(),
        system: Some(SUMMARY_SYSTEM_PROMPT.to_string()),
        messages: vec![Message::user(prompt)],
        tools: vec![],
        max_tokens: max_summary_tokens.max(64),
        temperature: None,
    };

    let completion = transport.complete(request).await?;
    Ok(completion.message.text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lariat_ai::{AssistantMetadata, Completion, StopReason, Usage};
    use parking_lot::Mutex;

    struct FixedSummarizer {
        response: String,
        calls: Mutex<u32>,
    }

    impl FixedSummarizer {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for FixedSummarizer {
        async fn complete(&self, _request: ChatRequest) -> lariat_ai::Result<Completion> {
            *self.calls.lock() += 1;
            Ok(Completion {
                message: Message::assistant(self.response.clone()),
                stop_reason: StopReason::Stop,
                usage: Usage::default(),
            })
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Transport for FailingSummarizer {
        async fn complete(&self, _request: ChatRequest) -> lariat_ai::Result<Completion> {
            Err(lariat_ai::Error::api("overloaded_error", "busy"))
        }
    }

    fn tool_result_msg(id: &str, text: &str) -> Message {
        Message::tool_result(id, "read", vec![Content::text(text)], false)
    }

    fn big_tool_result(id: &str) -> Message {
        // ~40000 chars -> ~10000 estimated tokens, above the default trigger
        tool_result_msg(id, &"word ".repeat(8000))
    }

    fn small_history() -> Vec<Message> {
        vec![
            Message::user("list files"),
            Message::Assistant {
                content: vec![Content::tool_call(
                    "call_1",
                    "read",
                    serde_json::json!({"path": "/tmp"}),
                )],
                metadata: AssistantMetadata::default(),
            },
            tool_result_msg("call_1", "a.txt b.txt"),
        ]
    }

    #[tokio::test]
    async fn test_identity_on_empty_history() {
        let guard = ResponseSizeGuard::truncate(100, 4, 4);
        let outcome = guard.apply(&[]).await.unwrap();
        assert!(outcome.messages.is_empty());
        assert!(outcome.reduction.is_none());
    }

    #[tokio::test]
    async fn test_identity_on_non_tool_tail() {
        let guard = ResponseSizeGuard::truncate(1, 1, 1);
        let history = vec![Message::user("hi"), Message::assistant(&"x".repeat(90000))];
        let outcome = guard.apply(&history).await.unwrap();
        assert_eq!(outcome.messages, history);
        assert!(outcome.reduction.is_none());
    }

    #[tokio::test]
    async fn test_identity_under_threshold() {
        let guard = ResponseSizeGuard::truncate(DEFAULT_TRIGGER_TOKENS, 4, 4);
        let history = small_history();
        let outcome = guard.apply(&history).await.unwrap();
        assert_eq!(outcome.messages, history);
        assert!(outcome.reduction.is_none());
    }

    #[tokio::test]
    async fn test_length_invariance_and_id_preservation() {
        let guard = ResponseSizeGuard::truncate(100, 10, 10);
        let mut history = small_history();
        history.pop();
        history.push(big_tool_result("call_42"));

        let outcome = guard.apply(&history).await.unwrap();
        assert_eq!(outcome.messages.len(), history.len());
        // Earlier elements untouched
        assert_eq!(outcome.messages[..2], history[..2]);
        // Replacement keeps the tool call id and name
        match outcome.messages.last().unwrap() {
            Message::ToolResult {
                tool_call_id,
                tool_name,
                ..
            } => {
                assert_eq!(tool_call_id, "call_42");
                assert_eq!(tool_name, "read");
            }
            other => panic!("expected ToolResult, got {:?}", other),
        }
        assert!(outcome.reduction.is_some());
    }

    #[tokio::test]
    async fn test_no_mutation_of_input() {
        let guard = ResponseSizeGuard::truncate(100, 10, 10);
        let history = vec![big_tool_result("call_1")];
        let before = history.clone();
        let _ = guard.apply(&history).await.unwrap();
        assert_eq!(history, before);
    }

    #[test]
    fn test_truncate_round_trip_on_small_input() {
        let text = "one two three four five";
        assert_eq!(truncate_middle(text, 3, 2), text);
        assert_eq!(truncate_middle(text, 5, 5), text);
    }

    #[test]
    fn test_truncate_correctness_on_large_input() {
        let units: Vec<String> = (0..10_000).map(|i| format!("w{}", i)).collect();
        let text = units.join(" ");
        let out = truncate_middle(&text, 4000, 4000);

        let expected_head = units[..4000].join(" ");
        let expected_tail = units[6000..].join(" ");
        assert!(out.starts_with(&expected_head));
        assert!(out.ends_with(&expected_tail));
        assert!(out.contains("[2000 words omitted]"));
    }

    #[test]
    fn test_truncate_malformed_whitespace_only() {
        assert_eq!(truncate_middle("   \n\t ", 2, 2), "   \n\t ");
    }

    #[tokio::test]
    async fn test_summarize_replaces_with_summary() {
        let transport = Arc::new(FixedSummarizer::new("3 files found under /tmp"));
        let guard = ResponseSizeGuard::summarize(transport.clone(), "judge-model", 100, 256);

        let history = vec![big_tool_result("call_7")];
        let outcome = guard.apply(&history).await.unwrap();

        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(
            outcome.messages[0].text(),
            "3 files found under /tmp"
        );
        match &outcome.messages[0] {
            Message::ToolResult { tool_call_id, .. } => assert_eq!(tool_call_id, "call_7"),
            other => panic!("expected ToolResult, got {:?}", other),
        }
        assert_eq!(*transport.calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_empty_summary_falls_back_to_original() {
        let transport = Arc::new(FixedSummarizer::new("   \n  "));
        let guard = ResponseSizeGuard::summarize(transport, "judge-model", 100, 256);

        let history = vec![big_tool_result("call_7")];
        let outcome = guard.apply(&history).await.unwrap();

        assert_eq!(outcome.messages, history);
        assert!(outcome.reduction.is_none());
    }

    #[tokio::test]
    async fn test_summarizer_failure_propagates() {
        let transport = Arc::new(FailingSummarizer);
        let guard = ResponseSizeGuard::summarize(transport, "judge-model", 100, 256);

        let history = vec![big_tool_result("call_7")];
        let err = guard.apply(&history).await.unwrap_err();
        assert!(err.to_string().contains("busy"));
    }

    #[tokio::test]
    async fn test_summarizer_not_called_under_threshold() {
        let transport = Arc::new(FixedSummarizer::new("unused"));
        let guard = ResponseSizeGuard::summarize(
            transport.clone(),
            "judge-model",
            DEFAULT_TRIGGER_TOKENS,
            256,
        );

        let _ = guard.apply(&small_history()).await.unwrap();
        assert_eq!(*transport.calls.lock(), 0);
    }

    #[test]
    fn test_estimate_tokens_text() {
        let msg = Message::user("Hello world!"); // 12 chars -> 3 tokens
        assert_eq!(estimate_tokens(&msg), 3);
    }

    #[test]
    fn test_estimate_tokens_structured() {
        let msg = Message::tool_result(
            "c1",
            "search",
            vec![Content::json(serde_json::json!({"k": "vvvv"}))],
            false,
        );
        // {"k":"vvvv"} -> 12 chars -> 3 tokens
        assert_eq!(estimate_tokens(&msg), 3);
    }
}
