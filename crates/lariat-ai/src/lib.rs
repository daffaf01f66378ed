//! lariat-ai: LLM provider layer
//!
//! Message and content types shared across the workspace, plus a client
//! for the Anthropic Messages API.

pub mod anthropic;
pub mod error;
pub mod types;

pub use anthropic::AnthropicClient;
pub use error::{Error, Result};
pub use types::*;
