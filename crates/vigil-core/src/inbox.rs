// Bounded notification digest.
//
// Consecutive watchdog notifications accumulate in a rolling digest so a
// notification surface can show "the last few things that happened". Once
// the surface reports zero active entries the digest resets; past the
// capacity the oldest entry is evicted before the newest is appended.

use std::collections::VecDeque;

/// Maximum number of messages retained between resets.
pub const INBOX_CAPACITY: usize = 6;

/// Bounded FIFO of rendered notification messages.
#[derive(Debug, Default)]
pub struct NotificationInbox {
    entries: VecDeque<String>,
    since_reset: u64,
}

impl NotificationInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, evicting the oldest entry at capacity.
    pub fn push(&mut self, message: String) {
        if self.entries.len() == INBOX_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
        self.since_reset += 1;
    }

    /// Messages currently retained, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Messages appended since the last reset, including evicted ones.
    pub fn since_reset(&self) -> u64 {
        self.since_reset
    }

    /// Reset after the notification surface reports zero active entries.
    pub fn acknowledge_all(&mut self) {
        self.entries.clear();
        self.since_reset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_retains_in_order() {
        let mut inbox = NotificationInbox::new();
        inbox.push("a".into());
        inbox.push("b".into());

        assert_eq!(inbox.messages(), vec!["a", "b"]);
        assert_eq!(inbox.since_reset(), 2);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut inbox = NotificationInbox::new();
        for i in 1..=7 {
            inbox.push(format!("msg-{i}"));
        }

        assert_eq!(inbox.len(), INBOX_CAPACITY);
        assert_eq!(
            inbox.messages(),
            vec!["msg-2", "msg-3", "msg-4", "msg-5", "msg-6", "msg-7"]
        );
        assert_eq!(inbox.since_reset(), 7);
    }

    #[test]
    fn acknowledge_all_resets_queue_and_counter() {
        let mut inbox = NotificationInbox::new();
        for i in 0..4 {
            inbox.push(format!("msg-{i}"));
        }

        inbox.acknowledge_all();
        assert!(inbox.is_empty());
        assert_eq!(inbox.since_reset(), 0);

        inbox.push("fresh".into());
        assert_eq!(inbox.messages(), vec!["fresh"]);
        assert_eq!(inbox.since_reset(), 1);
    }
}
