//! Busy indicator for the status line

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::Widget,
};
use std::time::{Duration, Instant};

const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FRAME_TIME: Duration = Duration::from_millis(80);

pub fn frame_at(elapsed: Duration) -> &'static str {
    let index = (elapsed.as_millis() / FRAME_TIME.as_millis()) as usize;
    FRAMES[index % FRAMES.len()]
}

/// Status text for `active` requests in flight
pub fn busy_label(active: usize) -> String {
    match active {
        1 => "1 request in flight".to_string(),
        n => format!("{} requests in flight", n),
    }
}

pub struct Spinner<'a> {
    label: &'a str,
    hint: Option<&'a str>,
    theme: &'a Theme,
    started: Instant,
}

impl<'a> Spinner<'a> {
    pub fn new(label: &'a str, theme: &'a Theme) -> Self {
        Self {
            label,
            hint: None,
            theme,
            started: Instant::now(),
        }
    }

    /// Animate relative to when the app became busy, not to this frame
    pub fn started_at(mut self, started: Instant) -> Self {
        self.started = started;
        self
    }

    /// Dimmed text after the label, e.g. the cancel key
    pub fn hint(mut self, hint: &'a str) -> Self {
        self.hint = Some(hint);
        self
    }
}

impl Widget for Spinner<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 3 || area.height == 0 {
            return;
        }
        let mut spans = vec![Span::styled(
            format!("{} {}", frame_at(self.started.elapsed()), self.label),
            self.theme.accent_style(),
        )];
        if let Some(hint) = self.hint {
            spans.push(Span::styled(format!(" · {}", hint), self.theme.dim_style()));
        }
        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}
