//! The conversation log and its read-only snapshots.

use std::sync::Arc;

use parley_ai::Message;

/// Ordered, append-only message history.
///
/// Only the interactive thread mutates the log. Tasks get a [`Snapshot`],
/// which shares storage with the log until the next append copies it.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    messages: Arc<Vec<Message>>,
    seed: Option<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that starts (and restarts after [`clear`](Self::clear)) with a system prompt
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let seed = Message::system(prompt);
        Self {
            messages: Arc::new(vec![seed.clone()]),
            seed: Some(seed),
        }
    }

    pub fn append(&mut self, message: Message) {
        Arc::make_mut(&mut self.messages).push(message);
    }

    /// Immutable view of the log as it is right now
    pub fn snapshot(&self) -> Snapshot {
        Snapshot(Arc::clone(&self.messages))
    }

    /// Drop everything except the seeded system prompt
    pub fn clear(&mut self) {
        self.messages = Arc::new(self.seed.iter().cloned().collect());
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A frozen copy of the log, safe to hand to another thread
#[derive(Debug, Clone)]
pub struct Snapshot(Arc<Vec<Message>>);

impl Snapshot {
    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last `k` messages; `k <= 0` means all of them
    pub fn window(&self, k: i64) -> &[Message] {
        let all = self.messages();
        match usize::try_from(k) {
            Ok(k) if k > 0 && k < all.len() => &all[all.len() - k..],
            _ => all,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_appends() {
        let mut log = ConversationLog::new();
        log.append(Message::user("A"));
        log.append(Message::assistant("B"));

        let snapshot = log.snapshot();
        log.append(Message::user("C"));

        assert_eq!(contents(snapshot.messages()), vec!["A", "B"]);
        assert_eq!(contents(log.messages()), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_window() {
        let mut log = ConversationLog::with_system_prompt("sys");
        for c in ["a", "b", "c"] {
            log.append(Message::user(c));
        }
        let snapshot = log.snapshot();

        assert_eq!(contents(snapshot.window(2)), vec!["b", "c"]);
        assert_eq!(contents(snapshot.window(0)), vec!["sys", "a", "b", "c"]);
        assert_eq!(contents(snapshot.window(-3)), vec!["sys", "a", "b", "c"]);
        assert_eq!(snapshot.window(10).len(), 4);
    }

    #[test]
    fn test_clear_keeps_seed() {
        let mut log = ConversationLog::with_system_prompt("sys");
        log.append(Message::user("hello"));
        let before = log.snapshot();

        log.clear();
        assert_eq!(log.len(), 1);
        assert_eq!(log.messages()[0], Message::system("sys"));
        assert_eq!(before.len(), 2);

        let mut bare = ConversationLog::new();
        bare.append(Message::user("x"));
        bare.clear();
        assert!(bare.is_empty());
    }
}
