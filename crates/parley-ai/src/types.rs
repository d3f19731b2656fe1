//! Core types for provider requests

use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single role-tagged chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a message with an explicit role
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Vision detail level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    #[default]
    Auto,
    Low,
    High,
}

impl ImageDetail {
    /// Parse a detail level, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(ImageDetail::Auto),
            "low" => Some(ImageDetail::Low),
            "high" => Some(ImageDetail::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageDetail::Auto => "auto",
            ImageDetail::Low => "low",
            ImageDetail::High => "high",
        }
    }
}

/// Sources that are already addressable by the provider
static REMOTE_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)(https?://|data:image/)").unwrap());

/// Image input for a vision request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Remote URL (or an existing data URL), passed through untouched
    Url(String),
    /// Local file contents, base64 encoded
    Inline { mime_type: String, data: String },
}

impl ImageSource {
    /// Resolve a user-supplied URL or local path.
    ///
    /// Local files are read synchronously; call this from a worker thread.
    pub fn load(source: &str) -> Result<Self> {
        if REMOTE_IMAGE.is_match(source) {
            return Ok(Self::Url(source.to_string()));
        }

        let path = Path::new(source);
        let mime_type = mime_for_path(path)
            .ok_or_else(|| Error::InvalidInput(format!("unsupported image type: {}", source)))?;
        let bytes = std::fs::read(path)?;
        Ok(Self::Inline {
            mime_type: mime_type.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }

    /// URL form accepted by the `image_url` content part
    pub fn to_url(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Inline { mime_type, data } => format!("data:{};base64,{}", mime_type, data),
        }
    }
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Parameters for an image generation call
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub model: String,
    pub size: String,
    pub quality: String,
}

/// Parameters for a vision analysis call
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub image: ImageSource,
    pub prompt: String,
    pub detail: ImageDetail,
    pub model: String,
    pub max_tokens: u32,
}

/// Parameters for an audio transcription call
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub audio_path: std::path::PathBuf,
    pub model: String,
    pub language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = Message::assistant("hi there");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hi there");
    }

    #[test]
    fn test_detail_parse() {
        assert_eq!(ImageDetail::parse("HIGH"), Some(ImageDetail::High));
        assert_eq!(ImageDetail::parse("low"), Some(ImageDetail::Low));
        assert_eq!(ImageDetail::parse("medium"), None);
    }

    #[test]
    fn test_remote_sources_pass_through() {
        let src = ImageSource::load("https://example.com/cat.png").unwrap();
        assert_eq!(src, ImageSource::Url("https://example.com/cat.png".into()));

        let data = ImageSource::load("data:image/png;base64,AAAA").unwrap();
        assert_eq!(data.to_url(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_local_file_becomes_data_url() {
        let dir = std::env::temp_dir().join(format!("parley-ai-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pixel.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"abc")
            .unwrap();

        let src = ImageSource::load(path.to_str().unwrap()).unwrap();
        assert_eq!(src.to_url(), "data:image/png;base64,YWJj");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let err = ImageSource::load("notes.txt").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got: {err}");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ImageSource::load("/definitely/not/here.jpg").unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got: {err}");
    }
}
