//! Error types for lariat-eval

use thiserror::Error;

/// Result type alias using lariat-eval Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the evaluation harness
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP failure talking to the backend
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Judge model failure
    #[error(transparent)]
    Ai(#[from] lariat_ai::Error),

    /// Agent failure while producing an answer
    #[error(transparent)]
    Agent(#[from] lariat_agent::Error),

    /// The backend rejected a request
    #[error("backend error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The target did not answer within the timeout
    #[error("target timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The judge verdict could not be parsed
    #[error("unparseable judge verdict: {0}")]
    BadVerdict(String),
}
