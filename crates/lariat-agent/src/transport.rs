//! Transport abstraction for model calls

use std::time::Duration;

use async_trait::async_trait;
use lariat_ai::{AnthropicClient, ChatRequest, Completion};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Transport for running model completions
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run a single completion request
    async fn complete(&self, request: ChatRequest) -> lariat_ai::Result<Completion>;
}

/// Direct provider transport with retry on transient failures
pub struct ProviderTransport {
    client: AnthropicClient,
    retry_config: RetryConfig,
}

impl ProviderTransport {
    /// Create a new provider transport
    pub fn new(client: AnthropicClient) -> Self {
        Self {
            client,
            retry_config: RetryConfig::default(),
        }
    }

    /// Create from the ANTHROPIC_API_KEY environment variable
    pub fn from_env() -> lariat_ai::Result<Self> {
        Ok(Self::new(AnthropicClient::from_env()?))
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }
}

#[async_trait]
impl Transport for ProviderTransport {
    async fn complete(&self, request: ChatRequest) -> lariat_ai::Result<Completion> {
        let mut attempt = 0u32;
        loop {
            match self.client.complete(&request).await {
                Ok(completion) => return Ok(completion),
                Err(e) => {
                    if attempt < self.retry_config.max_retries && e.is_retryable() {
                        let delay = self.retry_config.delay_for_attempt(attempt);
                        tracing::warn!(
                            "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                            attempt + 1,
                            self.retry_config.max_retries + 1,
                            e,
                            delay
                        );
                        attempt += 1;
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }
}
