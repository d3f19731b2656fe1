//! Test doubles shared by the unit tests in this crate

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use parley_ai::{ApiClient, ImageRequest, Message, Role, TranscriptionRequest, VisionRequest};
use serde_json::Value;
use tokio::sync::Notify;

use crate::dispatcher::Dispatcher;
use crate::mailbox::{self, Mailbox};
use crate::runtime::Executor;
use crate::settings::JsonSettings;
use crate::ui::UiSink;

/// How a scripted call behaves
#[derive(Clone, Default)]
pub struct Script {
    reply: Option<std::result::Result<String, String>>,
    delay: Duration,
    gate: Option<Arc<Notify>>,
}

impl Script {
    pub fn reply(text: &str) -> Self {
        Self {
            reply: Some(Ok(text.to_string())),
            ..Self::default()
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            reply: Some(Err(message.to_string())),
            ..Self::default()
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Hold the call until `gate` is notified
    pub fn gated(mut self, gate: &Arc<Notify>) -> Self {
        self.gate = Some(Arc::clone(gate));
        self
    }
}

/// A request the scripted client saw
#[derive(Debug, Clone)]
pub enum Call {
    Chat {
        messages: Vec<Message>,
        model: String,
        temperature: f32,
    },
    Image(ImageRequest),
    Vision(VisionRequest),
    Transcribe(TranscriptionRequest),
}

/// An `ApiClient` whose answers are keyed by the last chat message, the image
/// prompt, the vision prompt, or the audio file name.
#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, key: &str, script: Script) {
        self.scripts.lock().insert(key.to_string(), script);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Chat calls whose last message is `key`
    pub fn chat_calls_for(&self, key: &str) -> Vec<Vec<Message>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Chat { messages, .. }
                    if messages.last().is_some_and(|m| m.content == key) =>
                {
                    Some(messages)
                }
                _ => None,
            })
            .collect()
    }

    async fn answer(&self, key: &str, call: Call, default: String) -> parley_ai::Result<String> {
        let script = self.scripts.lock().get(key).cloned().unwrap_or_default();
        if let Some(gate) = &script.gate {
            gate.notified().await;
        }
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        self.calls.lock().push(call);
        match script.reply {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(parley_ai::Error::api("invalid_request_error", message)),
            None => Ok(default),
        }
    }
}

#[async_trait]
impl ApiClient for ScriptedClient {
    async fn chat_completion(
        &self,
        messages: &[Message],
        model: &str,
        temperature: f32,
    ) -> parley_ai::Result<String> {
        let key = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let call = Call::Chat {
            messages: messages.to_vec(),
            model: model.to_string(),
            temperature,
        };
        self.answer(&key, call, format!("echo: {}", key)).await
    }

    async fn generate_image(&self, request: &ImageRequest) -> parley_ai::Result<String> {
        self.answer(
            &request.prompt,
            Call::Image(request.clone()),
            "https://images.test/generated.png".to_string(),
        )
        .await
    }

    async fn analyze_image(&self, request: &VisionRequest) -> parley_ai::Result<String> {
        self.answer(
            &request.prompt,
            Call::Vision(request.clone()),
            "a picture".to_string(),
        )
        .await
    }

    async fn transcribe(&self, request: &TranscriptionRequest) -> parley_ai::Result<String> {
        let key = request
            .audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        self.answer(&key, Call::Transcribe(request.clone()), "transcribed text".to_string())
            .await
    }
}

/// What the dispatcher asked of the UI
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Busy(bool),
    Message(Role, String),
    Error(String),
    Notice(String),
    Cleared,
}

#[derive(Debug, Default)]
pub struct RecordingUi {
    pub events: Vec<UiEvent>,
}

impl RecordingUi {
    pub fn busy(&self) -> bool {
        self.events
            .iter()
            .rev()
            .find_map(|e| match e {
                UiEvent::Busy(b) => Some(*b),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                UiEvent::Error(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                UiEvent::Notice(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<(Role, &str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                UiEvent::Message(role, text) => Some((*role, text.as_str())),
                _ => None,
            })
            .collect()
    }
}

impl UiSink for RecordingUi {
    fn set_busy(&mut self, busy: bool) {
        self.events.push(UiEvent::Busy(busy));
    }

    fn render_message(&mut self, role: Role, text: &str) {
        self.events.push(UiEvent::Message(role, text.to_string()));
    }

    fn render_error(&mut self, text: &str) {
        self.events.push(UiEvent::Error(text.to_string()));
    }

    fn render_notice(&mut self, text: &str) {
        self.events.push(UiEvent::Notice(text.to_string()));
    }

    fn clear(&mut self) {
        self.events.push(UiEvent::Cleared);
    }
}

/// A dispatcher wired to a scripted client, plus the mailbox that drives it
pub struct Harness {
    pub dispatcher: Dispatcher<RecordingUi>,
    pub mailbox: Mailbox<Dispatcher<RecordingUi>>,
    pub client: Arc<ScriptedClient>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(serde_json::json!({}))
    }

    pub fn with_settings(overrides: Value) -> Self {
        let client = Arc::new(ScriptedClient::new());
        let executor = Arc::new(Executor::new().unwrap());
        let (poster, mailbox) = mailbox::channel();
        let dispatcher = Dispatcher::new(
            Arc::new(JsonSettings::with_overrides(overrides)),
            client.clone(),
            executor,
            poster,
            RecordingUi::default(),
        );
        Self {
            dispatcher,
            mailbox,
            client,
        }
    }

    /// Process one terminal callback
    pub async fn step(&mut self) {
        let delivered = tokio::time::timeout(
            Duration::from_secs(5),
            self.mailbox.next(&mut self.dispatcher),
        )
        .await
        .expect("no task reported within 5s");
        assert!(delivered, "mailbox closed");
    }

    /// Process callbacks until no task is active
    pub async fn settle(&mut self) {
        while self.dispatcher.active_count() > 0 {
            self.step().await;
        }
    }

    /// Contents of the conversation log, without roles
    pub fn log_contents(&self) -> Vec<String> {
        self.dispatcher
            .log()
            .messages()
            .iter()
            .map(|m| m.content.clone())
            .collect()
    }
}
