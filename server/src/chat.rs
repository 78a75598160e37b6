//! Fixed-capacity chat history.
//!
//! Append-only ring of recent chat entries; the oldest entry is overwritten
//! once capacity is reached. Author names are snapshotted so entries survive
//! the author's disconnection.

use log::info;
use std::collections::VecDeque;

/// One immutable chat line.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub player_id: u32,
    /// Author display name at the time of writing.
    pub name: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Ring buffer of the most recent chat entries.
#[derive(Debug)]
pub struct ChatHistory {
    entries: VecDeque<ChatEntry>,
    capacity: usize,
}

impl ChatHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a chat line, evicting the oldest entry at capacity.
    ///
    /// Empty text is rejected and nothing is written.
    pub fn append(&mut self, player_id: u32, name: &str, text: &str) -> bool {
        if text.is_empty() || self.capacity == 0 {
            return false;
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ChatEntry {
            player_id,
            name: name.to_string(),
            text: text.to_string(),
            timestamp: crate::timestamp_ms(),
        });

        info!("<{}> {}", name, text);
        true
    }

    /// Up to `n` entries, most recent first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &ChatEntry> {
        self.entries.iter().rev().take(n)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_recent_order() {
        let mut chat = ChatHistory::new(10);
        assert!(chat.append(1, "Alice", "first"));
        assert!(chat.append(2, "Bob", "second"));
        assert!(chat.append(1, "Alice", "third"));

        let texts: Vec<&str> = chat.recent(10).map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["third", "second", "first"]);
        assert_eq!(chat.len(), 3);
    }

    #[test]
    fn test_empty_text_is_rejected() {
        let mut chat = ChatHistory::new(10);
        assert!(!chat.append(1, "Alice", ""));
        assert!(chat.is_empty());
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut chat = ChatHistory::new(3);
        for i in 0..8 {
            chat.append(1, "Alice", &format!("msg {}", i));
            assert!(chat.len() <= 3);
        }

        // Only the newest three survive, newest first
        let texts: Vec<&str> = chat.recent(10).map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["msg 7", "msg 6", "msg 5"]);
    }

    #[test]
    fn test_recent_is_bounded_by_request() {
        let mut chat = ChatHistory::new(10);
        chat.append(1, "Alice", "one");
        chat.append(1, "Alice", "two");

        assert_eq!(chat.recent(1).count(), 1);
        assert_eq!(chat.recent(0).count(), 0);
        assert_eq!(chat.recent(50).count(), 2);
    }

    #[test]
    fn test_entries_snapshot_author_name() {
        let mut chat = ChatHistory::new(10);
        chat.append(7, "Alice", "hello");

        let entry = chat.recent(1).next().unwrap();
        assert_eq!(entry.player_id, 7);
        assert_eq!(entry.name, "Alice");
        assert!(entry.timestamp > 0);
    }

    #[test]
    fn test_zero_capacity_rejects_all() {
        let mut chat = ChatHistory::new(0);
        assert!(!chat.append(1, "Alice", "hello"));
        assert!(chat.is_empty());
    }
}
