//! The scrollback of conversation messages and status lines

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

/// Indentation of message bodies under their header
const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    User,
    Assistant,
    System,
    /// Cancellations, help output, transcripts
    Notice,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub kind: EntryKind,
    pub text: String,
}

impl Entry {
    pub fn new(kind: EntryKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self::new(EntryKind::Notice, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(EntryKind::Error, text)
    }
}

fn wrapped(text: &str, width: usize) -> Vec<String> {
    textwrap::wrap(text, width.max(1))
        .into_iter()
        .map(|line| line.into_owned())
        .collect()
}

/// Lines for one entry at `width` columns, separator included
pub fn entry_lines(entry: &Entry, theme: &Theme, width: usize) -> Vec<Line<'static>> {
    let body_width = width.saturating_sub(INDENT.len());
    let mut lines = Vec::new();

    let mut headed = |title: &'static str, title_style: Style, body_style: Style| {
        lines.push(Line::from(Span::styled(title, title_style)));
        for line in wrapped(&entry.text, body_width) {
            lines.push(Line::from(Span::styled(format!("{INDENT}{line}"), body_style)));
        }
    };

    match entry.kind {
        EntryKind::User => headed("▶ You", theme.accent_bold(), theme.base_style()),
        EntryKind::Assistant => headed("◀ Assistant", theme.assistant_bold(), theme.base_style()),
        EntryKind::System => headed("● System", theme.dim_style(), theme.dim_style()),
        EntryKind::Notice | EntryKind::Error => {
            let (marker, style) = if entry.kind == EntryKind::Error {
                ("✗ ", theme.error_style())
            } else {
                ("· ", theme.notice_style())
            };
            for (i, line) in wrapped(&entry.text, body_width).into_iter().enumerate() {
                let lead = if i == 0 { marker } else { INDENT };
                lines.push(Line::from(Span::styled(format!("{lead}{line}"), style)));
            }
        }
    }

    lines.push(Line::default());
    lines
}

/// Total rendered height of `entries` at `width` columns
pub fn content_height(entries: &[Entry], width: usize) -> usize {
    let theme = Theme::dark();
    entries
        .iter()
        .map(|e| entry_lines(e, &theme, width).len())
        .sum()
}

/// Widget showing the tail of the scrollback.
///
/// `scroll_back` counts lines up from the bottom, so new entries stay in
/// view until the user scrolls.
pub struct MessageList<'a> {
    entries: &'a [Entry],
    theme: &'a Theme,
    scroll_back: usize,
}

impl<'a> MessageList<'a> {
    pub fn new(entries: &'a [Entry], theme: &'a Theme) -> Self {
        Self {
            entries,
            theme,
            scroll_back: 0,
        }
    }

    pub fn scroll_back(mut self, lines: usize) -> Self {
        self.scroll_back = lines;
        self
    }
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let width = area.width as usize;
        let height = area.height as usize;

        let lines: Vec<Line> = self
            .entries
            .iter()
            .flat_map(|e| entry_lines(e, self.theme, width))
            .collect();
        let overflow = lines.len().saturating_sub(height);
        let start = overflow - self.scroll_back.min(overflow);

        let visible: Vec<Line> = lines.into_iter().skip(start).take(height).collect();
        Paragraph::new(visible).render(area, buf);
    }
}
