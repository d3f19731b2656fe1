//! The dispatcher: user commands in, task lifecycles and log mutations out.
//!
//! A `Dispatcher` lives on the interactive thread. It parses input, appends
//! the user's side of the conversation, starts tasks against a snapshot of
//! the log, and handles their terminal outcomes as the mailbox delivers
//! them. Outcomes are applied in delivery order, so the log reflects
//! completion order rather than submission order.

use std::collections::HashMap;
use std::sync::Arc;

use parley_ai::{ApiClient, Message, Role};

use crate::commands::{self, Command, HELP_TEXT};
use crate::conversation::ConversationLog;
use crate::error::Error;
use crate::mailbox::Poster;
use crate::operations;
use crate::runtime::Executor;
use crate::settings::{
    ChatSettings, ImageSettings, Settings, TaskSettings, VisionSettings, VoiceSettings,
};
use crate::task::{Operation, Outcome, Output, Task, TaskId, TaskKind, TaskOutcome};
use crate::ui::UiSink;

/// What happened to a submitted line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitted {
    /// A task was started
    Started(TaskId),
    /// Handled synchronously (help, clear)
    Local,
    /// Invalid input; an error was rendered
    Rejected,
    /// The user asked to leave
    Quit,
    /// Blank input
    Ignored,
}

pub struct Dispatcher<U: UiSink> {
    settings: Arc<dyn Settings>,
    client: Arc<dyn ApiClient>,
    executor: Arc<Executor>,
    poster: Poster<Self>,
    log: ConversationLog,
    active: HashMap<TaskId, Task<Self>>,
    ui: U,
}

impl<U: UiSink + 'static> Dispatcher<U> {
    pub fn new(
        settings: Arc<dyn Settings>,
        client: Arc<dyn ApiClient>,
        executor: Arc<Executor>,
        poster: Poster<Self>,
        ui: U,
    ) -> Self {
        let chat = ChatSettings::read(settings.as_ref());
        let log = if operations::is_reasoning_model(&chat.model) {
            ConversationLog::new()
        } else {
            ConversationLog::with_system_prompt(chat.system_prompt)
        };
        Self {
            settings,
            client,
            executor,
            poster,
            log,
            active: HashMap::new(),
            ui,
        }
    }

    /// Handle one line of user input
    pub fn submit(&mut self, text: &str) -> Submitted {
        let command = match commands::parse(text) {
            Ok(Some(command)) => command,
            Ok(None) => return Submitted::Ignored,
            Err(e) => return self.reject(e),
        };

        match command {
            Command::Chat(text) => self.start_chat(text),
            Command::Image { description } => {
                let image = ImageSettings::read(self.settings.as_ref());
                if !image.enabled {
                    return self.reject(Error::InvalidCommand(
                        "Image generation is disabled in settings".into(),
                    ));
                }
                self.append_user(text.trim());
                let op = operations::image(
                    self.client.clone(),
                    &image,
                    &self.log.snapshot(),
                    &description,
                );
                self.start(TaskKind::Image, op)
            }
            Command::Vision {
                source,
                prompt,
                detail,
            } => {
                let vision = VisionSettings::read(self.settings.as_ref());
                if !vision.enabled {
                    return self.reject(Error::InvalidCommand(
                        "Vision analysis is disabled in settings".into(),
                    ));
                }
                self.append_user(text.trim());
                let op = operations::vision(
                    self.client.clone(),
                    &vision,
                    &source,
                    prompt.as_deref(),
                    detail,
                );
                self.start(TaskKind::Vision, op)
            }
            Command::Transcribe { path } => {
                let voice = VoiceSettings::read(self.settings.as_ref());
                if !voice.enabled {
                    return self.reject(Error::InvalidCommand(
                        "Transcription is disabled in settings".into(),
                    ));
                }
                let op = operations::transcription(self.client.clone(), &voice, &path);
                self.start(TaskKind::Transcription, op)
            }
            Command::Help => {
                self.ui.render_notice(HELP_TEXT);
                Submitted::Local
            }
            Command::Clear => {
                self.cancel_all();
                self.log.clear();
                self.ui.clear();
                Submitted::Local
            }
            Command::Quit => {
                self.cancel_all();
                Submitted::Quit
            }
        }
    }

    /// Cancel every active task, returning how many were signalled.
    ///
    /// Does not wait; each task still reports through its terminal callback.
    pub fn cancel_all(&mut self) -> usize {
        for task in self.active.values() {
            task.cancel();
        }
        if !self.active.is_empty() {
            tracing::info!("cancelling {} active task(s)", self.active.len());
        }
        self.active.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_busy(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    fn reject(&mut self, error: Error) -> Submitted {
        self.ui.render_error(&error.to_string());
        Submitted::Rejected
    }

    fn append_user(&mut self, text: &str) {
        self.log.append(Message::user(text));
        self.ui.render_message(Role::User, text);
    }

    fn start_chat(&mut self, text: String) -> Submitted {
        let chat = ChatSettings::read(self.settings.as_ref());
        self.append_user(&text);
        let op = operations::chat(self.client.clone(), &chat, &self.log.snapshot());
        self.start(TaskKind::Chat, op)
    }

    fn start(&mut self, kind: TaskKind, operation: Operation) -> Submitted {
        let timeout = TaskSettings::read(self.settings.as_ref()).timeout;
        let task = Task::new(kind, operation, timeout);
        let id = task.id();

        let started = task
            .on_terminal(|dispatcher: &mut Self, outcome| dispatcher.finish(outcome))
            .and_then(|()| task.start(&self.executor, &self.poster));
        if let Err(e) = started {
            return self.reject(e);
        }

        tracing::debug!("dispatched {} task {}", kind, id);
        self.active.insert(id, task);
        self.ui.set_busy(true);
        Submitted::Started(id)
    }

    /// Terminal callback for every task
    fn finish(&mut self, done: TaskOutcome) {
        self.active.remove(&done.id);

        match done.outcome {
            Outcome::Completed(Output::Reply(text)) => {
                self.log.append(Message::assistant(text.clone()));
                self.ui.render_message(Role::Assistant, &text);
            }
            Outcome::Completed(Output::Image {
                url,
                enhanced_prompt,
            }) => {
                if let Some(prompt) = enhanced_prompt {
                    self.ui.render_notice(&format!("Enhanced prompt: {}", prompt));
                }
                let entry = operations::image_history_entry(&url);
                self.log.append(Message::assistant(entry.clone()));
                self.ui.render_message(Role::Assistant, &entry);
            }
            Outcome::Completed(Output::Transcript(text)) => {
                if text.is_empty() {
                    self.ui.render_notice("Transcription was empty");
                } else {
                    self.ui.render_notice(&format!("Transcribed: {}", text));
                    self.start_chat(text);
                }
            }
            Outcome::Failed(error) => {
                if error.is_bug() {
                    tracing::error!("{} task {} failed: {}", done.kind, done.id, error);
                } else {
                    tracing::warn!("{} task {} failed: {}", done.kind, done.id, error);
                }
                self.ui.render_error(&error.to_string());
            }
            Outcome::Cancelled => {
                self.ui
                    .render_notice(&format!("{} request cancelled", capitalize(done.kind)));
            }
        }

        if self.active.is_empty() {
            self.ui.set_busy(false);
        }
    }
}

fn capitalize(kind: TaskKind) -> String {
    let name = kind.to_string();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, Harness, Script, UiEvent};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Notify;

    const SYSTEM: &str = crate::settings::DEFAULT_SYSTEM_PROMPT;

    #[tokio::test]
    async fn test_hello_round_trip() {
        let mut h = Harness::new();
        h.client.script("hello", Script::reply("hi there"));

        assert!(matches!(h.dispatcher.submit("hello"), Submitted::Started(_)));
        assert_eq!(h.log_contents(), vec![SYSTEM, "hello"]);
        assert!(h.dispatcher.ui().busy());

        h.settle().await;
        let log = h.dispatcher.log().messages();
        assert_eq!(log.len(), 3);
        assert_eq!(log[1], Message::user("hello"));
        assert_eq!(log[2], Message::assistant("hi there"));
        assert!(!h.dispatcher.ui().busy());
        assert_eq!(
            h.dispatcher.ui().messages(),
            vec![(Role::User, "hello"), (Role::Assistant, "hi there")]
        );
    }

    #[tokio::test]
    async fn test_image_cancelled_before_completion() {
        let mut h = Harness::with_settings(json!({"image_settings": {"use_raw_prompt": true}}));
        let never = Arc::new(Notify::new());
        h.client.script("user: a red cat", Script::default().gated(&never));

        assert!(matches!(
            h.dispatcher.submit("/image a red cat"),
            Submitted::Started(_)
        ));
        assert_eq!(h.dispatcher.cancel_all(), 1);
        h.settle().await;

        assert_eq!(h.log_contents(), vec![SYSTEM, "/image a red cat"]);
        assert_eq!(h.dispatcher.ui().notices(), vec!["Image request cancelled"]);
        assert!(h.dispatcher.ui().errors().is_empty());
        assert!(!h.dispatcher.ui().busy());
    }

    #[tokio::test]
    async fn test_log_follows_completion_order() {
        let mut h = Harness::new();
        let gate = Arc::new(Notify::new());
        h.client.script("first", Script::reply("reply to first").gated(&gate));
        h.client.script("second", Script::reply("reply to second"));

        h.dispatcher.submit("first");
        h.dispatcher.submit("second");
        assert_eq!(h.dispatcher.active_count(), 2);

        h.step().await;
        assert_eq!(h.dispatcher.active_count(), 1);
        assert!(h.dispatcher.ui().busy());

        gate.notify_one();
        h.settle().await;
        assert_eq!(
            h.log_contents(),
            vec![
                SYSTEM,
                "first",
                "second",
                "reply to second",
                "reply to first"
            ]
        );
    }

    #[tokio::test]
    async fn test_request_context_is_the_submit_snapshot() {
        let mut h = Harness::new();
        let gate = Arc::new(Notify::new());
        h.client.script("A", Script::reply("slow").gated(&gate));
        h.client.script("B", Script::reply("fast"));

        h.dispatcher.submit("A");
        h.dispatcher.submit("B");
        h.step().await;
        assert_eq!(h.log_contents(), vec![SYSTEM, "A", "B", "fast"]);

        // The slow request only reaches the client now, after the log grew.
        gate.notify_one();
        h.settle().await;

        let sent = h.client.chat_calls_for("A");
        assert_eq!(sent.len(), 1);
        let contents: Vec<&str> = sent[0].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![SYSTEM, "A"]);
    }

    #[tokio::test]
    async fn test_cancel_wins_over_delivered_completion() {
        let mut h = Harness::new();
        h.client.script("hello", Script::reply("hi there"));
        h.dispatcher.submit("hello");

        let job = tokio::time::timeout(Duration::from_secs(5), h.mailbox.recv())
            .await
            .unwrap()
            .unwrap();
        h.dispatcher.cancel_all();
        job.run(&mut h.dispatcher);

        assert_eq!(h.dispatcher.active_count(), 0);
        assert_eq!(h.log_contents(), vec![SYSTEM, "hello"]);
        assert_eq!(h.dispatcher.ui().notices(), vec!["Chat request cancelled"]);
    }

    #[tokio::test]
    async fn test_failure_keeps_user_message_only() {
        let mut h = Harness::new();
        h.client.script("hello", Script::fail("model overloaded"));
        h.dispatcher.submit("hello");
        h.settle().await;

        assert_eq!(h.log_contents(), vec![SYSTEM, "hello"]);
        assert_eq!(
            h.dispatcher.ui().errors(),
            vec!["API error: model overloaded"]
        );
        assert!(!h.dispatcher.ui().busy());
    }

    #[tokio::test]
    async fn test_local_timeout() {
        let mut h = Harness::with_settings(json!({"task_settings": {"timeout_secs": 0.05}}));
        h.client
            .script("hello", Script::reply("too slow").after(Duration::from_millis(500)));
        h.dispatcher.submit("hello");
        h.settle().await;

        assert_eq!(h.log_contents(), vec![SYSTEM, "hello"]);
        assert_eq!(h.dispatcher.ui().errors().len(), 1);
        assert!(h.dispatcher.ui().errors()[0].contains("timed out"));

        // The real answer arrives later and goes nowhere.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.mailbox.run_pending(&mut h.dispatcher), 0);
        assert_eq!(h.dispatcher.log().len(), 2);
    }

    #[tokio::test]
    async fn test_huge_timeout_still_runs() {
        for secs in [1.0e19, 1.0e300] {
            let mut h = Harness::with_settings(json!({"task_settings": {"timeout_secs": secs}}));
            h.client.script("hello", Script::reply("hi there"));

            assert!(matches!(h.dispatcher.submit("hello"), Submitted::Started(_)));
            h.settle().await;
            assert_eq!(h.log_contents(), vec![SYSTEM, "hello", "hi there"]);
            assert!(h.dispatcher.ui().errors().is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_command_creates_no_task() {
        let mut h = Harness::new();
        assert_eq!(h.dispatcher.submit("/draw a dog"), Submitted::Rejected);
        assert_eq!(h.dispatcher.active_count(), 0);
        assert_eq!(h.log_contents(), vec![SYSTEM]);
        assert!(h.dispatcher.ui().errors()[0].starts_with("Unknown command: /draw"));
        assert!(!h.dispatcher.ui().events.contains(&UiEvent::Busy(true)));
        assert_eq!(h.dispatcher.submit("   "), Submitted::Ignored);
    }

    #[tokio::test]
    async fn test_disabled_feature_rejected() {
        let mut h = Harness::with_settings(json!({"image_settings": {"enabled": false}}));
        assert_eq!(h.dispatcher.submit("/image a cat"), Submitted::Rejected);
        assert_eq!(h.log_contents(), vec![SYSTEM]);
        assert!(h.client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_image_with_enhanced_prompt() {
        let mut h = Harness::new();
        h.dispatcher.submit("I love tabby cats");
        h.settle().await;

        let request = "Based on this conversation:\n\nuser: I love tabby cats\nassistant: echo: I love tabby cats\n\nCreate a detailed prompt for generating an image with this additional request: a red cat";
        h.client.script(request, Script::reply("A vivid red tabby cat"));
        h.client.script(
            "A vivid red tabby cat",
            Script::reply("https://images.test/cat.png"),
        );

        h.dispatcher.submit("/image a red cat");
        h.settle().await;

        let log = h.log_contents();
        assert_eq!(
            log.last().unwrap(),
            &operations::image_history_entry("https://images.test/cat.png")
        );
        assert!(
            h.dispatcher
                .ui()
                .notices()
                .contains(&"Enhanced prompt: A vivid red tabby cat")
        );
        let image_calls: Vec<_> = h
            .client
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Image(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(image_calls.len(), 1);
        assert_eq!(image_calls[0].model, "dall-e-3");
    }

    #[tokio::test]
    async fn test_raw_image_prompt_skips_enhancement() {
        let mut h = Harness::with_settings(json!({"image_settings": {"use_raw_prompt": true}}));
        h.dispatcher.submit("/image a red cat");
        h.settle().await;

        let calls = h.client.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            Call::Image(r) => assert_eq!(r.prompt, "user: a red cat"),
            other => panic!("unexpected call {:?}", other),
        }
        assert!(h.dispatcher.ui().notices().is_empty());
    }

    #[tokio::test]
    async fn test_vision_missing_file_fails() {
        let mut h = Harness::new();
        h.dispatcher.submit("/vision /no/such/photo.png what is it");
        h.settle().await;

        assert_eq!(
            h.log_contents(),
            vec![SYSTEM, "/vision /no/such/photo.png what is it"]
        );
        assert_eq!(h.dispatcher.ui().errors().len(), 1);
        assert!(h.client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_vision_url_reply_is_appended() {
        let mut h = Harness::new();
        h.client.script("what breed", Script::reply("a tabby"));
        h.dispatcher
            .submit("/vision https://x.test/cat.png what breed --detail=low");
        h.settle().await;

        assert_eq!(h.log_contents().last().unwrap(), "a tabby");
        match &h.client.calls()[0] {
            Call::Vision(r) => {
                assert_eq!(r.detail, parley_ai::ImageDetail::Low);
                assert_eq!(r.model, "gpt-4o");
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transcript_is_sent_as_chat() {
        let dir = std::env::temp_dir().join(format!("parley-core-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let audio = dir.join("memo.wav");
        std::fs::write(&audio, b"RIFF").unwrap();

        let mut h = Harness::new();
        h.client.script("memo.wav", Script::reply("  what time is it \n"));
        h.client.script("what time is it", Script::reply("noon"));

        let line = format!("/transcribe {}", audio.display());
        assert!(matches!(h.dispatcher.submit(&line), Submitted::Started(_)));
        assert_eq!(h.log_contents(), vec![SYSTEM]);

        h.settle().await;
        assert_eq!(
            h.log_contents(),
            vec![SYSTEM, "what time is it", "noon"]
        );
        assert!(
            h.dispatcher
                .ui()
                .notices()
                .contains(&"Transcribed: what time is it")
        );
        assert!(!h.dispatcher.ui().busy());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_clear_cancels_and_resets() {
        let mut h = Harness::new();
        let never = Arc::new(Notify::new());
        h.client.script("hello", Script::default().gated(&never));
        h.dispatcher.submit("hello");

        assert_eq!(h.dispatcher.submit("/clear"), Submitted::Local);
        assert_eq!(h.log_contents(), vec![SYSTEM]);
        h.settle().await;
        assert_eq!(h.log_contents(), vec![SYSTEM]);
        assert!(h.dispatcher.ui().events.contains(&UiEvent::Cleared));
    }

    #[tokio::test]
    async fn test_help_and_quit() {
        let mut h = Harness::new();
        assert_eq!(h.dispatcher.submit("/help"), Submitted::Local);
        assert_eq!(h.dispatcher.ui().notices(), vec![HELP_TEXT]);
        assert_eq!(h.dispatcher.submit("/quit"), Submitted::Quit);
    }

    #[tokio::test]
    async fn test_reasoning_model_has_no_system_prompt() {
        let mut h = Harness::with_settings(json!({"chat_settings": {"model": "o1-preview"}}));
        assert!(h.log_contents().is_empty());
        h.dispatcher.submit("hello");
        h.settle().await;

        match &h.client.calls()[0] {
            Call::Chat {
                messages,
                temperature,
                ..
            } => {
                assert_eq!(messages, &vec![Message::user("hello")]);
                assert_eq!(*temperature, 1.0);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }
}
