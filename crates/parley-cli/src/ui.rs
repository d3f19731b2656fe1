//! TUI front-end
//!
//! The event loop here is the interactive thread: it owns the dispatcher,
//! drains its mailbox, and redraws after every input or settled task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::EventStream;
use futures::StreamExt;
use parley_ai::{ApiClient, Role};
use parley_core::{Dispatcher, Executor, Settings, Submitted, UiSettings, UiSink, mailbox};
use parley_tui::{
    Screen, Theme,
    input::{Action, event_to_action},
    widgets::{
        Entry, EntryKind, InputBox, MessageList, Spinner, message_list::content_height,
        spinner::busy_label,
    },
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

/// The scrollback and busy state the dispatcher renders into
#[derive(Debug, Default)]
pub struct TuiSink {
    entries: Vec<Entry>,
    busy_since: Option<Instant>,
    /// Lines scrolled up from the bottom
    scroll_back: usize,
}

impl TuiSink {
    fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
        self.scroll_back = 0;
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

impl UiSink for TuiSink {
    fn set_busy(&mut self, busy: bool) {
        match (busy, self.busy_since) {
            (true, None) => self.busy_since = Some(Instant::now()),
            (false, _) => self.busy_since = None,
            _ => {}
        }
    }

    fn render_message(&mut self, role: Role, text: &str) {
        let kind = match role {
            Role::User => EntryKind::User,
            Role::Assistant => EntryKind::Assistant,
            Role::System => EntryKind::System,
        };
        self.push(Entry::new(kind, text));
    }

    fn render_error(&mut self, text: &str) {
        self.push(Entry::error(text));
    }

    fn render_notice(&mut self, text: &str) {
        self.push(Entry::notice(text));
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.scroll_back = 0;
    }
}

type TuiDispatcher = Dispatcher<TuiSink>;

/// Screen state that is not part of the conversation
struct View {
    input: InputBox,
    theme: Theme,
    model: String,
    /// Size of the message area at the last draw, for paging
    page: Rect,
}

impl View {
    fn new(model: &str, settings: &dyn Settings) -> Self {
        let mut input = InputBox::new().with_placeholder("Type a message, or /help for commands");
        input.set_title(" /image · /vision · /transcribe ");
        Self {
            input,
            theme: Theme::named(&UiSettings::read(settings).theme),
            model: model.to_string(),
            page: Rect::default(),
        }
    }

    fn render(&mut self, frame: &mut Frame, sink: &TuiSink, active: usize) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(3),
            ])
            .split(frame.area());

        self.render_messages(frame, chunks[0], sink);
        self.render_status(frame, chunks[1], sink, active);
        self.input
            .render(chunks[2], frame.buffer_mut(), &self.theme, true);
    }

    fn render_messages(&mut self, frame: &mut Frame, area: Rect, sink: &TuiSink) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(format!(" parley │ {} ", self.model));
        let inner = block.inner(area);
        frame.render_widget(block, area);
        self.page = inner;

        if sink.entries.is_empty() {
            let welcome = Paragraph::new(vec![
                Line::from(Span::styled("Chat, or try:", self.theme.dim_style())),
                Line::from(Span::styled(
                    "  /image <description>   /vision <url-or-path> [prompt]   /transcribe <audio>",
                    self.theme.dim_style(),
                )),
                Line::from(Span::styled(
                    "  Esc cancels running requests",
                    self.theme.dim_style(),
                )),
            ]);
            frame.render_widget(welcome, inner);
            return;
        }

        let list = MessageList::new(&sink.entries, &self.theme).scroll_back(sink.scroll_back);
        frame.render_widget(list, inner);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, sink: &TuiSink, active: usize) {
        match sink.busy_since {
            Some(since) if active > 0 => {
                let label = busy_label(active);
                let spinner = Spinner::new(&label, &self.theme)
                    .started_at(since)
                    .hint("Esc to cancel");
                frame.render_widget(spinner, area);
            }
            _ => {
                let line = Line::from(Span::styled(
                    "Ready │ PgUp/PgDn scroll │ Ctrl+L clear │ Ctrl+C quit",
                    self.theme.dim_style(),
                ));
                frame.render_widget(Paragraph::new(line), area);
            }
        }
    }

    /// The furthest the scrollback can go up at the current size
    fn max_scroll(&self, sink: &TuiSink) -> usize {
        content_height(&sink.entries, self.page.width as usize)
            .saturating_sub(self.page.height as usize)
    }
}

/// Apply one action. Returns false when the user wants out.
fn handle_action(view: &mut View, dispatcher: &mut TuiDispatcher, action: Action, width: u16) -> bool {
    match action {
        Action::Submit => {
            if let Some(line) = view.input.take() {
                if dispatcher.submit(&line) == Submitted::Quit {
                    return false;
                }
            }
        }
        Action::CancelAll => {
            dispatcher.cancel_all();
        }
        Action::ClearScreen => {
            dispatcher.submit("/clear");
        }
        Action::ScrollUp | Action::ScrollDown => {
            let page = (view.page.height as usize).saturating_sub(1).max(1);
            let max = view.max_scroll(dispatcher.ui());
            let sink = dispatcher.ui_mut();
            sink.scroll_back = if action == Action::ScrollUp {
                (sink.scroll_back + page).min(max)
            } else {
                sink.scroll_back.saturating_sub(page)
            };
        }
        Action::Quit => return false,
        Action::Eof if view.input.is_empty() => return false,
        other => {
            view.input.handle(&other, width);
        }
    }
    true
}

pub async fn run(
    settings: Arc<dyn Settings>,
    client: Arc<dyn ApiClient>,
    executor: Arc<Executor>,
    model: &str,
) -> anyhow::Result<()> {
    let mut view = View::new(model, settings.as_ref());
    let (poster, mut mailbox) = mailbox::channel();
    let mut dispatcher = Dispatcher::new(settings, client, executor, poster, TuiSink::default());

    let mut screen = Screen::enter()?;
    let mut events = EventStream::new();
    // Only drives the spinner
    let mut tick = tokio::time::interval(Duration::from_millis(80));

    let result = loop {
        let active = dispatcher.active_count();
        screen.draw(|frame| view.render(frame, dispatcher.ui(), active))?;
        let width = screen.width()?;

        tokio::select! {
            Some(job) = mailbox.recv() => job.run(&mut dispatcher),

            event = events.next() => match event {
                Some(Ok(event)) => {
                    if let Some(action) = event_to_action(event) {
                        if !handle_action(&mut view, &mut dispatcher, action, width) {
                            break Ok(());
                        }
                    }
                }
                Some(Err(e)) => break Err(anyhow::anyhow!("terminal event error: {}", e)),
                None => break Ok(()),
            },

            _ = tick.tick(), if dispatcher.is_busy() => {}
        }
    };

    let cancelled = dispatcher.cancel_all();
    if cancelled > 0 {
        tracing::debug!("left with {} request(s) in flight", cancelled);
    }
    drop(screen);
    result
}
