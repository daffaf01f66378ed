//! Evaluation target: the agent under test

use std::time::Duration;

use async_trait::async_trait;
use lariat_agent::Agent;
use lariat_ai::Message;

use crate::error::{Error, Result};

/// Default per-question timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Something that can answer a dataset question
#[async_trait]
pub trait EvalTarget: Send {
    async fn invoke(&mut self, question: &str) -> Result<String>;
}

/// Runs each question through a fresh agent conversation with a timeout
pub struct AgentTarget {
    agent: Agent,
    timeout: Duration,
}

impl AgentTarget {
    pub fn new(agent: Agent) -> Self {
        Self {
            agent,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-question timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl EvalTarget for AgentTarget {
    async fn invoke(&mut self, question: &str) -> Result<String> {
        self.agent.clear_messages();

        match tokio::time::timeout(self.timeout, self.agent.prompt(question)).await {
            Ok(Ok(())) => Ok(extract_final_answer(self.agent.messages())),
            Ok(Err(e)) => Err(Error::Agent(e)),
            Err(_) => Err(Error::Timeout(self.timeout)),
        }
    }
}

/// The final answer is the text of the last assistant message. Searches
/// backwards so a trailing tool result does not hide the answer.
pub fn extract_final_answer(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .find_map(|message| match message {
            Message::Assistant { .. } => {
                let text = message.text().trim().to_string();
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
            _ => None,
        })
        .unwrap_or_default()
}
