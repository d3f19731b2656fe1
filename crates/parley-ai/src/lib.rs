//! parley-ai: API client for OpenAI-compatible providers
//!
//! This crate provides the request/response surface the interactive client
//! consumes: chat completions, image generation, vision analysis and audio
//! transcription. Every call is a single, possibly long-running, request.

pub mod client;
pub mod error;
pub mod providers;
pub mod types;

pub use client::{ApiClient, RetryConfig};
pub use error::{Error, Result};
pub use providers::openai::OpenAIClient;
pub use types::*;
