//! Mapping terminal events to editor and app actions

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Char(char),
    Submit,
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    /// Up arrow: previous entry in the input history
    HistoryPrev,
    /// Down arrow: next entry in the input history
    HistoryNext,
    ScrollUp,
    ScrollDown,
    /// Esc: cancel every in-flight request
    CancelAll,
    /// Ctrl+L: same as `/clear`
    ClearScreen,
    /// Ctrl+U
    ClearLine,
    /// Ctrl+W
    DeleteWord,
    /// Ctrl+D; quits only when the input is empty
    Eof,
    Quit,
    Paste(String),
    Ignored,
}

pub fn key_to_action(event: KeyEvent) -> Action {
    // Windows reports releases too
    if event.kind == KeyEventKind::Release {
        return Action::Ignored;
    }

    let KeyEvent {
        code, modifiers, ..
    } = event;

    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') | KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('d') => Action::Eof,
            KeyCode::Char('l') => Action::ClearScreen,
            KeyCode::Char('u') => Action::ClearLine,
            KeyCode::Char('w') => Action::DeleteWord,
            KeyCode::Char('a') => Action::Home,
            KeyCode::Char('e') => Action::End,
            _ => Action::Ignored,
        };
    }

    if modifiers.contains(KeyModifiers::ALT) {
        return Action::Ignored;
    }

    match code {
        KeyCode::Char(c) => Action::Char(c),
        KeyCode::Enter => Action::Submit,
        KeyCode::Backspace => Action::Backspace,
        KeyCode::Delete => Action::Delete,
        KeyCode::Left => Action::Left,
        KeyCode::Right => Action::Right,
        KeyCode::Home => Action::Home,
        KeyCode::End => Action::End,
        KeyCode::Up => Action::HistoryPrev,
        KeyCode::Down => Action::HistoryNext,
        KeyCode::PageUp => Action::ScrollUp,
        KeyCode::PageDown => Action::ScrollDown,
        KeyCode::Esc => Action::CancelAll,
        _ => Action::Ignored,
    }
}

/// `None` for events that are not input (focus, resize, mouse)
pub fn event_to_action(event: Event) -> Option<Action> {
    match event {
        Event::Key(key) => Some(key_to_action(key)),
        Event::Paste(text) => Some(Action::Paste(text)),
        _ => None,
    }
}
