//! Error types for lariat-mcp

use thiserror::Error;

/// Result type alias using lariat-mcp Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from MCP configuration and clients
#[derive(Error, Debug)]
pub enum Error {
    /// I/O failure spawning or talking to a server process
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid servers manifest
    #[error("invalid servers config: {0}")]
    Config(#[from] toml::de::Error),

    /// HTTP transport failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server replied with a JSON-RPC error
    #[error("server error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The server sent something that is not valid JSON-RPC
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server process exited or closed its pipes
    #[error("server connection closed")]
    Closed,

    /// The server did not answer within the request timeout
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A transport declared in the manifest that this client cannot speak
    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),
}
