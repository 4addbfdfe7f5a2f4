use std::collections::VecDeque;

use crate::sync_events::SyncLogLine;

pub const DEFAULT_LOG_HISTORY_CAPACITY: usize = 100;

/// Bounded display history of relayed lines. Oldest entries are dropped first.
#[derive(Debug, Clone)]
pub struct LogHistory {
    entries: VecDeque<SyncLogLine>,
    capacity: usize,
}

impl Default for LogHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_HISTORY_CAPACITY)
    }
}

impl LogHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: SyncLogLine) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line);
    }

    pub fn snapshot(&self) -> Vec<SyncLogLine> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync_events::SyncStream;

    fn line(text: &str) -> SyncLogLine {
        SyncLogLine::new("session", SyncStream::Stdout, text.to_string())
    }

    #[test]
    fn drops_oldest_when_full() {
        let mut history = LogHistory::with_capacity(3);
        for index in 0..5 {
            history.push(line(&format!("line {index}")));
        }

        let texts = history
            .snapshot()
            .into_iter()
            .map(|entry| entry.line)
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["line 2", "line 3", "line 4"]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn zero_capacity_keeps_latest_line() {
        let mut history = LogHistory::with_capacity(0);
        history.push(line("first"));
        history.push(line("second"));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.snapshot()[0].line, "second");
    }

    #[test]
    fn clear_empties_history() {
        let mut history = LogHistory::default();
        history.push(line("[WATCH] a.txt"));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), DEFAULT_LOG_HISTORY_CAPACITY);
    }
}
