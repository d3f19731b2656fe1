//! parley-tui: terminal widgets for the parley chat client
//!
//! Rendering only. The widgets know nothing about tasks or providers; the
//! binary feeds them entries and actions from its own event loop.

pub mod input;
pub mod terminal;
pub mod theme;
pub mod widgets;

pub use terminal::Screen;
pub use theme::Theme;
