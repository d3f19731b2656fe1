//! parley-core: the execution bridge between an interactive front-end and
//! long-running provider calls.
//!
//! The interactive loop owns a [`Dispatcher`] and the [`Mailbox`] that feeds
//! it. The dispatcher turns user input into [`Task`]s, which run on worker
//! threads or the background [`Executor`] and report back through the mailbox.

pub mod commands;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod mailbox;
pub mod operations;
pub mod runtime;
pub mod settings;
pub mod task;
pub mod ui;

#[cfg(test)]
mod testing;

pub use commands::Command;
pub use conversation::{ConversationLog, Snapshot};
pub use dispatcher::{Dispatcher, Submitted};
pub use error::{Error, ErrorKind, Result};
pub use mailbox::{Job, Mailbox, Poster};
pub use runtime::Executor;
pub use settings::{JsonSettings, ProviderSettings, Settings, UiSettings};
pub use task::{Operation, Outcome, Output, Task, TaskId, TaskKind, TaskOutcome, TaskState};
pub use ui::UiSink;
