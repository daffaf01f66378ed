//! Error types for lariat-agent

use thiserror::Error;

/// Result type alias using lariat-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during agent operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the AI provider layer
    #[error(transparent)]
    Ai(#[from] lariat_ai::Error),

    /// The agent hit its turn limit without producing a final answer
    #[error("turn limit of {0} reached without a final response")]
    TurnLimit(u32),

    /// The run was cancelled
    #[error("cancelled")]
    Cancelled,
}
