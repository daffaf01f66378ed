//! Conversation state: messages, usage, and last error.

use lariat_ai::{Message, Usage};

/// Canonical conversation state. Append-only from the agent loop's point of
/// view; the response size guard only ever transforms a derived copy.
#[derive(Default)]
pub struct Conversation {
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Total usage across all turns
    pub total_usage: Usage,
    /// Last error
    pub error: Option<String>,
}
