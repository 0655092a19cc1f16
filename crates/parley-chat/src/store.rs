//! Ordered, append-only message history for one conversation thread.

use parley_core::types::Message;

/// In-memory message history of a single thread.
///
/// Messages are only ever appended; the whole history can be cleared but no
/// individual entry is edited, removed or reordered.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    messages: Vec<Message>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the end of the history.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The `n` most recent messages, oldest first.
    ///
    /// Returns `min(n, len)` entries.
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Drop every message. Calling it on an empty store is a no-op.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Full history in chronological order.
    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
