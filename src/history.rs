//! Bounded per-chat message history (spec §4.11, component C11).

use std::collections::VecDeque;
use std::sync::Mutex;

const MAX_MESSAGE_CHARS: usize = 1024;

/// One past request, kept for the LLM check's "prior clean messages from
/// this chat" context.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub user_name: String,
    pub msg: String,
}

/// A fixed-capacity ring of past requests. Separate instances hold ham and
/// spam context (spec §4.11); this type itself is agnostic to which.
pub struct HistoryRing {
    entries: Mutex<VecDeque<HistoryEntry>>,
    capacity: usize,
}

impl HistoryRing {
    /// `size == 0` clamps to 1.
    pub fn new(size: usize) -> Self {
        HistoryRing { entries: Mutex::new(VecDeque::new()), capacity: size.max(1) }
    }

    pub fn push(&self, user_name: impl Into<String>, msg: &str) {
        let msg: String = msg.chars().take(MAX_MESSAGE_CHARS).collect();
        let mut entries = self.entries.lock().expect("history ring mutex poisoned");
        entries.push_back(HistoryEntry { user_name: user_name.into(), msg });
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Returns up to `n` most recent entries, oldest first.
    pub fn last(&self, n: usize) -> Vec<HistoryEntry> {
        let entries = self.entries.lock().expect("history ring mutex poisoned");
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("history ring mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn push_truncates_long_messages() {
        let ring = HistoryRing::new(10);
        let long = "x".repeat(2000);
        ring.push("alice", &long);
        assert_eq!(ring.last(1)[0].msg.len(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn ring_drops_oldest_entries_past_capacity() {
        let ring = HistoryRing::new(2);
        ring.push("a", "one");
        ring.push("a", "two");
        ring.push("a", "three");

        let last = ring.last(10);
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].msg, "two");
        assert_eq!(last[1].msg, "three");
    }

    #[test]
    fn zero_size_clamps_to_one() {
        let ring = HistoryRing::new(0);
        ring.push("a", "one");
        ring.push("a", "two");
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.last(10)[0].msg, "two");
    }

    #[test]
    fn last_n_returns_oldest_first() {
        let ring = HistoryRing::new(5);
        for msg in ["a", "b", "c"] {
            ring.push("u", msg);
        }
        let last2 = ring.last(2);
        assert_eq!(last2.iter().map(|e| e.msg.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);
    }
}
