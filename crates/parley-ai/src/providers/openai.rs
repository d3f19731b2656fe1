//! OpenAI-compatible REST provider
//!
//! Works against any endpoint that speaks the OpenAI chat, images and audio
//! APIs (OpenAI itself, Groq, OpenRouter). Requests are non-streaming; the
//! task layer above treats every call as one long-running unit.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{
    client::{ApiClient, RetryConfig},
    error::{Error, Result},
    types::{ImageRequest, Message, TranscriptionRequest, VisionRequest},
};

/// Default endpoint for the OpenAI platform
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client
pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: RetryConfig,
}

impl OpenAIClient {
    /// Create a new client for the given endpoint
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry policy
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        decode(response).await
    }
}

#[async_trait]
impl ApiClient for OpenAIClient {
    async fn chat_completion(
        &self,
        messages: &[Message],
        model: &str,
        temperature: f32,
    ) -> Result<String> {
        let body = ChatRequest {
            model,
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: Some(temperature),
            max_tokens: None,
        };
        tracing::debug!("chat completion: model={} messages={}", model, messages.len());

        let response: ChatResponse = self
            .retry
            .run("chat completion", || self.post_json("/chat/completions", &body))
            .await?;
        first_reply(response)
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<String> {
        let body = ImageGenerationBody {
            model: &request.model,
            prompt: &request.prompt,
            size: &request.size,
            quality: &request.quality,
            n: 1,
        };
        tracing::debug!("image generation: model={} size={}", request.model, request.size);

        let response: ImageResponse = self
            .retry
            .run("image generation", || {
                self.post_json("/images/generations", &body)
            })
            .await?;
        first_image_url(response)
    }

    async fn analyze_image(&self, request: &VisionRequest) -> Result<String> {
        let body = vision_body(request);
        tracing::debug!("vision analysis: model={}", request.model);

        let response: ChatResponse = self
            .retry
            .run("vision analysis", || self.post_json("/chat/completions", &body))
            .await?;
        first_reply(response)
    }

    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String> {
        let audio = tokio::fs::read(&request.audio_path).await?;
        let file_name = request
            .audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();
        tracing::debug!(
            "transcription: model={} file={} bytes={}",
            request.model,
            file_name,
            audio.len()
        );

        let response: TranscriptionResponse = self
            .retry
            .run("transcription", || {
                // Forms are consumed by the request, so rebuild per attempt.
                let mut form = Form::new()
                    .text("model", request.model.clone())
                    .part("file", Part::bytes(audio.clone()).file_name(file_name.clone()));
                if let Some(ref language) = request.language {
                    form = form.text("language", language.clone());
                }
                self.post_form("/audio/transcriptions", form)
            })
            .await?;
        Ok(response.text)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        let text = response.text().await?;
        return Ok(serde_json::from_str(&text)?);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let text = response.text().await.unwrap_or_default();
    Err(error_from_status(status, retry_after, &text))
}

/// Map a non-success HTTP response to a provider error
fn error_from_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> Error {
    match status {
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED => Error::InvalidApiKey,
        _ => match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => Error::api(
                envelope.error.error_type.unwrap_or_else(|| {
                    if status.is_server_error() {
                        "server_error".to_string()
                    } else {
                        "error".to_string()
                    }
                }),
                envelope.error.message,
            ),
            Err(_) if status.is_server_error() => {
                Error::api("server_error", format!("HTTP {}: {}", status.as_u16(), body))
            }
            Err(_) => Error::api("http_error", format!("HTTP {}: {}", status.as_u16(), body)),
        },
    }
}

fn first_reply(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::UnexpectedResponse("no message content in choices".to_string()))
}

fn first_image_url(response: ImageResponse) -> Result<String> {
    response
        .data
        .into_iter()
        .next()
        .and_then(|d| d.url)
        .ok_or_else(|| Error::UnexpectedResponse("no image url in response".to_string()))
}

fn vision_body(request: &VisionRequest) -> ChatRequest<'_> {
    let parts = vec![
        ContentPart::Text {
            text: request.prompt.clone(),
        },
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: request.image.to_url(),
                detail: request.detail.as_str(),
            },
        },
    ];
    ChatRequest {
        model: &request.model,
        messages: vec![WireMessage {
            role: "user",
            content: WireContent::Parts(parts),
        }],
        temperature: None,
        max_tokens: Some(request.max_tokens),
    }
}

// Request types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: WireContent<'a>,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(msg: &'a Message) -> Self {
        Self {
            role: msg.role.as_str(),
            content: WireContent::Text(&msg.content),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Serialize)]
struct ImageGenerationBody<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u32,
}

// Response types

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}
