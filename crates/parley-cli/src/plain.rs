//! Line mode: stdin in, stdout out
//!
//! Used with `--no-tui`, when stdout is not a terminal, and for one-shot
//! `--command` runs.

use std::io::IsTerminal;
use std::sync::Arc;

use parley_ai::{ApiClient, Role};
use parley_core::{Dispatcher, Executor, Mailbox, Settings, Submitted, UiSink, mailbox};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Prints what the dispatcher renders
#[derive(Debug, Default)]
pub struct PlainUi {
    /// Echo the user's own lines (one-shot mode, where nothing was typed)
    echo_user: bool,
    errors: usize,
}

impl UiSink for PlainUi {
    fn set_busy(&mut self, busy: bool) {
        tracing::trace!(busy, "busy changed");
    }

    fn render_message(&mut self, role: Role, text: &str) {
        match role {
            Role::User if self.echo_user => println!("parley> {}\n", text),
            Role::Assistant => println!("{}\n", text),
            _ => {}
        }
    }

    fn render_error(&mut self, text: &str) {
        self.errors += 1;
        eprintln!("Error: {}", text);
    }

    fn render_notice(&mut self, text: &str) {
        println!("[{}]", text);
    }

    fn clear(&mut self) {
        println!("Cleared conversation.");
    }
}

type PlainDispatcher = Dispatcher<PlainUi>;

fn build(
    settings: Arc<dyn Settings>,
    client: Arc<dyn ApiClient>,
    executor: Arc<Executor>,
    echo_user: bool,
) -> (PlainDispatcher, Mailbox<PlainDispatcher>) {
    let (poster, mailbox) = mailbox::channel();
    let ui = PlainUi {
        echo_user,
        ..PlainUi::default()
    };
    (Dispatcher::new(settings, client, executor, poster, ui), mailbox)
}

/// Deliver outcomes until nothing is in flight. Ctrl+C cancels what is left.
async fn drain(dispatcher: &mut PlainDispatcher, mailbox: &mut Mailbox<PlainDispatcher>) {
    let mut interrupted = false;
    while dispatcher.is_busy() {
        tokio::select! {
            delivered = mailbox.next(dispatcher) => {
                if !delivered {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                dispatcher.cancel_all();
            }
        }
    }
}

/// Submit one line, wait for everything it started, and report whether
/// it went through without errors.
pub async fn run_once(
    settings: Arc<dyn Settings>,
    client: Arc<dyn ApiClient>,
    executor: Arc<Executor>,
    line: &str,
) -> anyhow::Result<bool> {
    let (mut dispatcher, mut mailbox) = build(settings, client, executor, true);
    dispatcher.submit(line);
    drain(&mut dispatcher, &mut mailbox).await;
    Ok(dispatcher.ui().errors == 0)
}

/// Read lines until EOF or `/quit`. Requests run concurrently with reading;
/// outcomes print as they settle.
pub async fn run(
    settings: Arc<dyn Settings>,
    client: Arc<dyn ApiClient>,
    executor: Arc<Executor>,
    model: &str,
) -> anyhow::Result<()> {
    let (mut dispatcher, mut mailbox) = build(settings, client, executor, false);

    if std::io::stdin().is_terminal() {
        eprintln!("parley ({}) · /help for commands, Ctrl+C cancels requests", model);
        eprintln!();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if dispatcher.submit(&line) == Submitted::Quit {
                    break;
                }
            }
            Some(job) = mailbox.recv() => job.run(&mut dispatcher),
            _ = tokio::signal::ctrl_c() => {
                if dispatcher.cancel_all() == 0 {
                    break;
                }
            }
        }
    }

    // Finish what is in flight, including cancellations from /quit
    drain(&mut dispatcher, &mut mailbox).await;
    Ok(())
}
