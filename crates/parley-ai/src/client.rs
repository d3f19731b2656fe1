//! The client surface consumed by the task layer

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{ImageRequest, Message, TranscriptionRequest, VisionRequest};

/// A provider that can serve every request kind the interactive client issues.
///
/// Each call is a single, possibly long-running request. Implementations are
/// not required to observe cancellation; callers discard late results instead.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Get a chat completion for the given conversation
    async fn chat_completion(
        &self,
        messages: &[Message],
        model: &str,
        temperature: f32,
    ) -> Result<String>;

    /// Generate an image and return its URL
    async fn generate_image(&self, request: &ImageRequest) -> Result<String>;

    /// Describe an image
    async fn analyze_image(&self, request: &VisionRequest) -> Result<String>;

    /// Transcribe an audio file to text
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String>;
}

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
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries at all
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }

    /// Delay before retrying after `error`; a provider's Retry-After wins
    /// when it asks for longer than the backoff
    pub fn delay_after(&self, attempt: u32, error: &Error) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        match error {
            Error::RateLimited {
                retry_after: Some(secs),
            } => delay.max(Duration::from_secs(*secs)),
            _ => delay,
        }
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && e.is_retryable() => {
                    let delay = self.delay_after(attempt, &e);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        what,
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
