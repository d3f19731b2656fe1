//! Building the operations behind each command.
//!
//! Everything a request needs is captured here, at submit time, from the
//! settings and a conversation snapshot. Nothing in the returned operation
//! looks at the live log again.

use std::path::PathBuf;
use std::sync::Arc;

use parley_ai::{
    ApiClient, ImageDetail, ImageRequest, ImageSource, Message, Role, TranscriptionRequest,
    VisionRequest,
};

use crate::conversation::Snapshot;
use crate::error::{Error, Result};
use crate::settings::{ChatSettings, ImageSettings, VisionSettings, VoiceSettings};
use crate::task::{Operation, Output};

const DEFAULT_VISION_PROMPT: &str = "What's in this image?";

/// Markers of image traffic that should not leak into image prompts
const IMAGE_MARKERS: [&str; 3] = [
    "Image URL:",
    "I've generated an image",
    "Please generate an image:",
];

/// Reasoning models reject system messages and only accept the default temperature
pub fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("o1")
}

/// The messages and temperature for a chat request
pub fn chat_request(settings: &ChatSettings, snapshot: &Snapshot) -> (Vec<Message>, f32) {
    let window = snapshot.window(settings.max_history);
    if is_reasoning_model(&settings.model) {
        let messages = window
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect();
        (messages, 1.0)
    } else {
        (window.to_vec(), settings.temperature)
    }
}

pub fn chat(client: Arc<dyn ApiClient>, settings: &ChatSettings, snapshot: &Snapshot) -> Operation {
    let (messages, temperature) = chat_request(settings, snapshot);
    let model = settings.model.clone();
    Operation::suspending(async move {
        let reply = client
            .chat_completion(&messages, &model, temperature)
            .await?;
        Ok(Output::Reply(reply))
    })
}

/// Render a conversation as `role: content` lines, skipping system and image traffic
pub fn format_for_image_prompt(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .filter(|m| {
            !IMAGE_MARKERS.iter().any(|marker| m.content.contains(marker))
                && !m.content.starts_with("/image")
        })
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The prompt-enhancement conversation sent before generating an image
pub fn enhancement_messages(settings: &ImageSettings, context: &str, description: &str) -> Vec<Message> {
    vec![
        Message::system(settings.processor.system_prompt.clone()),
        Message::user(format!(
            "Based on this conversation:\n\n{}\n\nCreate a detailed prompt for generating an image with this additional request: {}",
            context, description
        )),
    ]
}

/// The history entry recorded for a generated image
pub fn image_history_entry(url: &str) -> String {
    format!(
        "I've generated an image based on your request and our conversation context. You can view it here: {}",
        url
    )
}

pub fn image(
    client: Arc<dyn ApiClient>,
    settings: &ImageSettings,
    snapshot: &Snapshot,
    description: &str,
) -> Operation {
    let recent = snapshot.window(settings.max_context_history);
    let settings = settings.clone();
    let description = description.to_string();

    let raw_prompt = settings.use_raw_prompt.then(|| {
        let mut messages = recent.to_vec();
        messages.push(Message::user(description.clone()));
        format_for_image_prompt(&messages)
    });
    let context = format_for_image_prompt(recent);

    Operation::suspending(async move {
        let (prompt, shown) = match raw_prompt {
            Some(prompt) => (prompt, None),
            None => {
                let messages = enhancement_messages(&settings, &context, &description);
                let enhanced = client
                    .chat_completion(
                        &messages,
                        &settings.processor.model,
                        settings.processor.temperature,
                    )
                    .await
                    .map_err(|e| {
                        Error::ExternalCall(format!(
                            "enhancing image prompt: {}",
                            e.provider_message()
                        ))
                    })?;
                let shown = settings.show_enhanced_prompt.then(|| enhanced.clone());
                (enhanced, shown)
            }
        };

        let request = ImageRequest {
            prompt,
            model: settings.model,
            size: settings.size,
            quality: settings.quality,
        };
        let url = client.generate_image(&request).await?;
        Ok(Output::Image {
            url,
            enhanced_prompt: shown,
        })
    })
}

/// Vision reads local files, so it runs on a worker thread
pub fn vision(
    client: Arc<dyn ApiClient>,
    settings: &VisionSettings,
    source: &str,
    prompt: Option<&str>,
    detail: Option<ImageDetail>,
) -> Operation {
    let source = source.to_string();
    let prompt = prompt.unwrap_or(DEFAULT_VISION_PROMPT).to_string();
    let detail = detail.unwrap_or(settings.detail);
    let model = settings.model.clone();
    let max_tokens = settings.max_tokens;

    Operation::blocking(move |ctx| {
        let image = ImageSource::load(&source)?;
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let request = VisionRequest {
            image,
            prompt,
            detail,
            model,
            max_tokens,
        };
        let reply = ctx.block_on(async move { client.analyze_image(&request).await })??;
        Ok(Output::Reply(reply))
    })
}

/// Transcription uploads a local file, so it runs on a worker thread
pub fn transcription(client: Arc<dyn ApiClient>, settings: &VoiceSettings, path: &str) -> Operation {
    let request = TranscriptionRequest {
        audio_path: PathBuf::from(path),
        model: settings.model.clone(),
        language: settings.language.clone(),
    };

    Operation::blocking(move |ctx| {
        let meta = std::fs::metadata(&request.audio_path).map_err(|e| {
            Error::ExternalCall(format!("{}: {}", request.audio_path.display(), e))
        })?;
        if !meta.is_file() {
            return Err(Error::ExternalCall(format!(
                "{} is not a file",
                request.audio_path.display()
            )));
        }
        let text = ctx.block_on(async move { client.transcribe(&request).await })??;
        Ok(Output::Transcript(text.trim().to_string()))
    })
}
