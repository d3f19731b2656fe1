//! Tasks: one cancellable unit of background work.
//!
//! A [`Task`] wraps a single [`Operation`] and reports exactly one terminal
//! outcome. The operation runs off the interactive thread, either on a
//! dedicated worker thread ([`Operation::Blocking`]) or on the shared
//! background loop ([`Operation::Suspending`]). A watcher on the background
//! loop races the operation against cancellation and the local timeout and
//! posts its verdict to the interactive thread, where the task settles.
//!
//! Settling is where the rules live:
//! - only the first verdict counts; anything later is dropped
//! - if [`Task::cancel`] was called before settling, the outcome is
//!   `Cancelled` regardless of what the operation produced
//!
//! A suspending operation that loses to cancellation or the timeout is
//! aborted on the background loop. Blocking work cannot be interrupted; it
//! can poll [`WorkerContext::is_cancelled`] instead.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::mailbox::Poster;
use crate::runtime::Executor;

/// Opaque task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

/// What a task is doing, for routing its outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Chat,
    Image,
    Vision,
    Transcription,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Chat => "chat",
            TaskKind::Image => "image",
            TaskKind::Vision => "vision",
            TaskKind::Transcription => "transcription",
        })
    }
}

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

/// Successful result of an operation
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Text reply (chat or vision)
    Reply(String),
    /// Generated image; `enhanced_prompt` is set when the prompt should be shown
    Image {
        url: String,
        enhanced_prompt: Option<String>,
    },
    /// Transcribed audio
    Transcript(String),
}

/// Terminal result of a task
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(Output),
    Failed(Error),
    Cancelled,
}

impl Outcome {
    pub fn state(&self) -> TaskState {
        match self {
            Outcome::Completed(_) => TaskState::Completed,
            Outcome::Failed(_) => TaskState::Failed,
            Outcome::Cancelled => TaskState::Cancelled,
        }
    }
}

/// Payload handed to the terminal callback
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub id: TaskId,
    pub kind: TaskKind,
    pub outcome: Outcome,
}

/// What a blocking operation can see while it runs
pub struct WorkerContext {
    cancel: CancellationToken,
    handle: Handle,
}

impl WorkerContext {
    /// Whether the task has been cancelled. Check between steps.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `future` on the background loop, blocking only this worker thread
    pub fn block_on<F>(&self, future: F) -> Result<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let join = self.handle.spawn(future);
        futures::executor::block_on(join).map_err(|e| {
            if e.is_panic() {
                Error::ExternalCall("operation panicked".into())
            } else {
                Error::ExternalCall("background executor shut down".into())
            }
        })
    }
}

type BlockingFn = Box<dyn FnOnce(&WorkerContext) -> Result<Output> + Send>;

/// The wrapped work, tagged with how it must be executed
pub enum Operation {
    /// Runs synchronously on its own worker thread
    Blocking(BlockingFn),
    /// A suspended computation driven by the background loop
    Suspending(BoxFuture<'static, Result<Output>>),
}

impl Operation {
    pub fn blocking(f: impl FnOnce(&WorkerContext) -> Result<Output> + Send + 'static) -> Self {
        Operation::Blocking(Box::new(f))
    }

    pub fn suspending(
        future: impl std::future::Future<Output = Result<Output>> + Send + 'static,
    ) -> Self {
        Operation::Suspending(Box::pin(future))
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, Operation::Blocking(_))
    }
}

type Callback<C> = Box<dyn FnOnce(&mut C, TaskOutcome) + Send>;

struct Inner<C> {
    state: TaskState,
    operation: Option<Operation>,
    callback: Option<Callback<C>>,
}

struct Shared<C> {
    id: TaskId,
    kind: TaskKind,
    cancel: CancellationToken,
    inner: Mutex<Inner<C>>,
}

/// One unit of background work.
///
/// `C` is the interactive-thread state the terminal callback receives.
pub struct Task<C> {
    shared: Arc<Shared<C>>,
    timeout: Option<Duration>,
}

impl<C: 'static> Task<C> {
    /// Create a pending task. `timeout` is measured from [`Task::start`].
    pub fn new(kind: TaskKind, operation: Operation, timeout: Option<Duration>) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: TaskId::new(),
                kind,
                cancel: CancellationToken::new(),
                inner: Mutex::new(Inner {
                    state: TaskState::Pending,
                    operation: Some(operation),
                    callback: None,
                }),
            }),
            timeout,
        }
    }

    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn kind(&self) -> TaskKind {
        self.shared.kind
    }

    pub fn state(&self) -> TaskState {
        self.shared.inner.lock().state
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Register the terminal callback. It runs once, on the interactive thread.
    pub fn on_terminal(
        &self,
        callback: impl FnOnce(&mut C, TaskOutcome) + Send + 'static,
    ) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.callback.is_some() || inner.state.is_terminal() {
            return Err(self.invalid_state("terminal callback already registered"));
        }
        inner.callback = Some(Box::new(callback));
        Ok(())
    }

    /// Begin execution. May be called at most once.
    pub fn start(&self, executor: &Executor, poster: &Poster<C>) -> Result<()> {
        let operation = {
            let mut inner = self.shared.inner.lock();
            match inner.operation.take() {
                Some(op) if inner.state == TaskState::Pending => {
                    inner.state = TaskState::Running;
                    op
                }
                _ => return Err(self.invalid_state("task started twice")),
            }
        };

        tracing::debug!(
            "task {} ({}) starting, blocking={}",
            self.shared.id,
            self.shared.kind,
            operation.is_blocking()
        );

        if self.shared.cancel.is_cancelled() {
            post_verdict(poster, &self.shared, Outcome::Cancelled);
            return Ok(());
        }

        // A budget past the clock's range means no deadline
        let deadline = self
            .timeout
            .and_then(|t| Instant::now().checked_add(t).map(|at| (at, t)));
        let (tx, rx) = oneshot::channel::<Result<Output>>();

        let work = match operation {
            Operation::Blocking(f) => {
                let ctx = WorkerContext {
                    cancel: self.shared.cancel.clone(),
                    handle: executor.handle().clone(),
                };
                let spawned = std::thread::Builder::new()
                    .name(format!("parley-worker-{}", self.shared.id))
                    .spawn(move || {
                        let result = std::panic::catch_unwind(AssertUnwindSafe(|| f(&ctx)))
                            .unwrap_or_else(|_| Err(Error::ExternalCall("operation panicked".into())));
                        let _ = tx.send(result);
                    });
                if let Err(e) = spawned {
                    tracing::error!("failed to spawn worker thread: {}", e);
                    post_verdict(
                        poster,
                        &self.shared,
                        Outcome::Failed(Error::ExternalCall(format!("worker thread: {}", e))),
                    );
                    return Ok(());
                }
                None
            }
            Operation::Suspending(future) => Some(executor.spawn(async move {
                let result = AssertUnwindSafe(future)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(Error::ExternalCall("operation panicked".into())));
                let _ = tx.send(result);
            })),
        };

        let shared = Arc::clone(&self.shared);
        let poster = poster.clone();
        executor.spawn(async move {
            let finished = async {
                match deadline {
                    Some((at, budget)) => tokio::time::timeout_at(at, rx)
                        .await
                        .unwrap_or(Ok(Err(Error::Timeout(budget)))),
                    None => rx.await,
                }
            };
            let verdict = tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => Outcome::Cancelled,
                result = finished => match result {
                    Ok(Ok(output)) => Outcome::Completed(output),
                    Ok(Err(e)) => Outcome::Failed(e),
                    Err(_) => Outcome::Failed(Error::ExternalCall(
                        "operation ended without a result".into(),
                    )),
                },
            };
            // Suspending work left behind by cancel or timeout is dropped
            if matches!(verdict, Outcome::Cancelled | Outcome::Failed(Error::Timeout(_))) {
                if let Some(work) = work {
                    work.abort();
                }
            }
            post_verdict(&poster, &shared, verdict);
        });

        Ok(())
    }

    /// Request cancellation. Idempotent, callable from any thread at any time.
    pub fn cancel(&self) {
        if !self.shared.cancel.is_cancelled() {
            tracing::debug!("task {} ({}) cancel requested", self.shared.id, self.shared.kind);
        }
        self.shared.cancel.cancel();
    }

    fn invalid_state(&self, what: &str) -> Error {
        tracing::error!("task {} ({}): {}", self.shared.id, self.shared.kind, what);
        Error::InvalidState(format!("{} {}: {}", self.shared.kind, self.shared.id, what))
    }
}

fn post_verdict<C: 'static>(poster: &Poster<C>, shared: &Arc<Shared<C>>, verdict: Outcome) {
    let shared = Arc::clone(shared);
    let id = shared.id;
    if !poster.post(move |ctx| settle(&shared, ctx, verdict)) {
        tracing::debug!("task {} finished after the interactive loop closed", id);
    }
}

/// Commit the terminal state. Runs on the interactive thread.
fn settle<C>(shared: &Shared<C>, ctx: &mut C, verdict: Outcome) {
    let (callback, outcome) = {
        let mut inner = shared.inner.lock();
        if inner.state.is_terminal() {
            return;
        }
        let outcome = if shared.cancel.is_cancelled() {
            Outcome::Cancelled
        } else {
            verdict
        };
        inner.state = outcome.state();
        (inner.callback.take(), outcome)
    };

    tracing::debug!(
        "task {} ({}) settled as {:?}",
        shared.id,
        shared.kind,
        outcome.state()
    );

    if let Some(callback) = callback {
        callback(
            ctx,
            TaskOutcome {
                id: shared.id,
                kind: shared.kind,
                outcome,
            },
        );
    }
}
