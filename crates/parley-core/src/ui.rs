//! The UI synchronization contract.

use parley_ai::Role;

/// Everything the dispatcher may ask of the user interface.
///
/// The dispatcher owns its sink and is only driven from the interactive
/// loop, so every call lands on the interactive thread.
pub trait UiSink {
    /// Show or hide the busy indicator
    fn set_busy(&mut self, busy: bool);

    /// Append a conversation message to the display
    fn render_message(&mut self, role: Role, text: &str);

    /// Show an inline error
    fn render_error(&mut self, text: &str);

    /// Show a non-alarming notice (cancellations, help, status)
    fn render_notice(&mut self, text: &str);

    /// Wipe the displayed conversation
    fn clear(&mut self) {}
}
