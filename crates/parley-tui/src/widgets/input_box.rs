//! Single-line prompt editor with history recall

use crate::input::Action;
use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::Span,
    widgets::{Block, Borders, Widget},
};
use unicode_width::UnicodeWidthChar;

const HISTORY_LIMIT: usize = 200;

/// Columns taken by the border and one cell of slack for the cursor
const CHROME: usize = 3;

fn char_width(c: char) -> usize {
    c.width().unwrap_or(0)
}

#[derive(Debug, Default)]
pub struct InputBox {
    /// Edited as chars so the cursor is always on a boundary
    buffer: Vec<char>,
    cursor: usize,
    /// Display columns scrolled off the left edge
    scroll: usize,
    placeholder: String,
    title: String,
    history: Vec<String>,
    /// Index into `history` while browsing it
    recall: Option<usize>,
    /// What was being typed before browsing started
    draft: Vec<char>,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn text(&self) -> String {
        self.buffer.iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.scroll = 0;
    }

    /// Take the line for submission. Blank lines yield `None` and are not
    /// recorded; anything else goes into the history.
    pub fn take(&mut self) -> Option<String> {
        let line = self.text().trim().to_string();
        self.clear();
        self.recall = None;
        self.draft.clear();
        if line.is_empty() {
            return None;
        }
        if self.history.last() != Some(&line) {
            self.history.push(line.clone());
            if self.history.len() > HISTORY_LIMIT {
                self.history.remove(0);
            }
        }
        Some(line)
    }

    /// Apply an editing action. Returns whether anything changed.
    pub fn handle(&mut self, action: &Action, width: u16) -> bool {
        let changed = match action {
            Action::Char(c) => {
                self.insert(*c);
                true
            }
            Action::Paste(text) => {
                for c in text.chars() {
                    if c == '\n' || c == '\r' {
                        if self.cursor > 0 && self.buffer.get(self.cursor - 1) != Some(&' ') {
                            self.insert(' ');
                        }
                    } else {
                        self.insert(c);
                    }
                }
                true
            }
            Action::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                self.buffer.remove(self.cursor);
                true
            }
            Action::Delete if self.cursor < self.buffer.len() => {
                self.buffer.remove(self.cursor);
                true
            }
            Action::Left if self.cursor > 0 => {
                self.cursor -= 1;
                true
            }
            Action::Right if self.cursor < self.buffer.len() => {
                self.cursor += 1;
                true
            }
            Action::Home => {
                self.cursor = 0;
                true
            }
            Action::End => {
                self.cursor = self.buffer.len();
                true
            }
            Action::ClearLine => {
                self.clear();
                true
            }
            Action::DeleteWord => {
                let mut start = self.cursor;
                while start > 0 && self.buffer[start - 1] == ' ' {
                    start -= 1;
                }
                while start > 0 && self.buffer[start - 1] != ' ' {
                    start -= 1;
                }
                self.buffer.drain(start..self.cursor);
                self.cursor = start;
                true
            }
            Action::HistoryPrev => self.recall_prev(),
            Action::HistoryNext => self.recall_next(),
            _ => false,
        };
        if changed {
            self.follow_cursor(width as usize);
        }
        changed
    }

    fn insert(&mut self, c: char) {
        self.buffer.insert(self.cursor, c);
        self.cursor += 1;
    }

    fn load(&mut self, chars: Vec<char>) {
        self.buffer = chars;
        self.cursor = self.buffer.len();
    }

    fn recall_prev(&mut self) -> bool {
        let index = match self.recall {
            None if self.history.is_empty() => return false,
            None => {
                self.draft = std::mem::take(&mut self.buffer);
                self.history.len() - 1
            }
            Some(0) => return false,
            Some(i) => i - 1,
        };
        self.recall = Some(index);
        self.load(self.history[index].chars().collect());
        true
    }

    fn recall_next(&mut self) -> bool {
        match self.recall {
            None => false,
            Some(i) if i + 1 < self.history.len() => {
                self.recall = Some(i + 1);
                self.load(self.history[i + 1].chars().collect());
                true
            }
            Some(_) => {
                self.recall = None;
                let draft = std::mem::take(&mut self.draft);
                self.load(draft);
                true
            }
        }
    }

    fn columns_before_cursor(&self) -> usize {
        self.buffer[..self.cursor].iter().copied().map(char_width).sum()
    }

    fn follow_cursor(&mut self, width: usize) {
        let visible = width.saturating_sub(CHROME).max(1);
        let column = self.columns_before_cursor();
        if column < self.scroll {
            self.scroll = column;
        } else if column >= self.scroll + visible {
            self.scroll = column + 1 - visible;
        }
    }

    /// The slice of the buffer that fits in `width` columns after scrolling
    fn visible_text(&self, width: usize) -> String {
        let mut skipped = 0;
        let mut used = 0;
        let mut out = String::new();
        for &c in &self.buffer {
            let w = char_width(c);
            if skipped < self.scroll {
                skipped += w;
                continue;
            }
            if used + w > width {
                break;
            }
            out.push(c);
            used += w;
        }
        out
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme, focused: bool) {
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(if focused {
                theme.accent_style()
            } else {
                theme.border_style()
            });
        if !self.title.is_empty() {
            block = block.title(Span::styled(self.title.clone(), theme.dim_style()));
        }
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let (text, style) = if self.buffer.is_empty() {
            (self.placeholder.clone(), theme.dim_style())
        } else {
            (self.visible_text(inner.width as usize), theme.base_style())
        };
        buf.set_stringn(inner.x, inner.y, &text, inner.width as usize, style);

        if focused {
            let x = self.columns_before_cursor().saturating_sub(self.scroll);
            if x < inner.width as usize {
                if let Some(cell) = buf.cell_mut((inner.x + x as u16, inner.y)) {
                    cell.set_style(Style::default().bg(theme.accent));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> InputBox {
        let mut input = InputBox::new();
        for c in text.chars() {
            input.handle(&Action::Char(c), 80);
        }
        input
    }

    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect()
    }

    #[test]
    fn test_editing_multibyte_text() {
        let mut input = typed("héllo");
        input.handle(&Action::Left, 80);
        input.handle(&Action::Left, 80);
        input.handle(&Action::Left, 80);
        input.handle(&Action::Backspace, 80);
        assert_eq!(input.text(), "hllo");
        input.handle(&Action::Home, 80);
        input.handle(&Action::Delete, 80);
        assert_eq!(input.text(), "llo");
        assert!(!input.handle(&Action::Left, 80));
    }

    #[test]
    fn test_delete_word() {
        let mut input = typed("/image a red  ");
        input.handle(&Action::DeleteWord, 80);
        assert_eq!(input.text(), "/image a ");
        input.handle(&Action::DeleteWord, 80);
        assert_eq!(input.text(), "/image ");
    }

    #[test]
    fn test_paste_flattens_newlines() {
        let mut input = InputBox::new();
        input.handle(&Action::Paste("one\r\ntwo\nthree".into()), 80);
        assert_eq!(input.text(), "one two three");
    }

    #[test]
    fn test_take_trims_and_skips_blank_lines() {
        let mut input = typed("   ");
        assert_eq!(input.take(), None);
        assert!(input.is_empty());

        let mut input = typed("  hello ");
        assert_eq!(input.take(), Some("hello".to_string()));
        assert!(input.is_empty());
    }

    #[test]
    fn test_history_recall_restores_draft() {
        let mut input = InputBox::new();
        for line in ["first", "second"] {
            for c in line.chars() {
                input.handle(&Action::Char(c), 80);
            }
            input.take();
        }
        for c in "draft".chars() {
            input.handle(&Action::Char(c), 80);
        }

        assert!(input.handle(&Action::HistoryPrev, 80));
        assert_eq!(input.text(), "second");
        input.handle(&Action::HistoryPrev, 80);
        assert_eq!(input.text(), "first");
        assert!(!input.handle(&Action::HistoryPrev, 80));

        input.handle(&Action::HistoryNext, 80);
        assert_eq!(input.text(), "second");
        input.handle(&Action::HistoryNext, 80);
        assert_eq!(input.text(), "draft");
        assert!(!input.handle(&Action::HistoryNext, 80));
    }

    #[test]
    fn test_repeated_lines_are_recorded_once() {
        let mut input = InputBox::new();
        for _ in 0..2 {
            input.handle(&Action::Paste("same".into()), 80);
            input.take();
        }
        input.handle(&Action::HistoryPrev, 80);
        assert!(!input.handle(&Action::HistoryPrev, 80));
    }

    #[test]
    fn test_long_lines_scroll_with_cursor() {
        let mut input = InputBox::new();
        for c in "abcdefghijklmnop".chars() {
            input.handle(&Action::Char(c), 10);
        }
        let area = Rect::new(0, 0, 10, 3);
        let mut buf = Buffer::empty(area);
        input.render(area, &mut buf, &Theme::dark(), true);
        assert!(row(&buf, 1).contains("klmnop"));
        assert!(!row(&buf, 1).contains('a'));

        input.handle(&Action::Home, 10);
        let mut buf = Buffer::empty(area);
        input.render(area, &mut buf, &Theme::dark(), true);
        assert!(row(&buf, 1).contains("abcdefgh"));
    }

    #[test]
    fn test_placeholder_when_empty() {
        let input = InputBox::new().with_placeholder("Type a message");
        let area = Rect::new(0, 0, 30, 3);
        let mut buf = Buffer::empty(area);
        input.render(area, &mut buf, &Theme::dark(), false);
        assert!(row(&buf, 1).contains("Type a message"));
    }
}
