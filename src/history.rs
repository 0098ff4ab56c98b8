use std::collections::VecDeque;

use crate::sensors::ReadingHistoryEntry;

pub const DEFAULT_HISTORY_LIMIT: usize = 24;

/// Bounded, ascending-by-time buffer of past readings for the trend chart.
///
/// Holds at most `limit` entries; the oldest is evicted first. Entries are
/// kept sorted by `captured_at` regardless of the order they arrive in.
#[derive(Debug, Clone)]
pub struct ReadingHistory {
    entries: VecDeque<ReadingHistoryEntry>,
    limit: usize,
}

impl Default for ReadingHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ReadingHistory {
    /// A zero `limit` is raised to 1.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Insert one entry, evicting the oldest if the cap is exceeded.
    pub fn append(&mut self, entry: ReadingHistoryEntry) {
        // Usually a push_back; the search only matters for late arrivals.
        let pos = self
            .entries
            .partition_point(|e| e.captured_at <= entry.captured_at);
        self.entries.insert(pos, entry);

        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    /// Merge entries loaded from persistence, in whatever order they came.
    /// An entry whose `captured_at` is already held is skipped, so readings
    /// saved after the buffer saw them are not counted twice.
    pub fn load(&mut self, mut loaded: Vec<ReadingHistoryEntry>) {
        loaded.sort_by_key(|e| e.captured_at);
        for entry in loaded {
            if self.contains(&entry) {
                continue;
            }
            self.append(entry);
        }
    }

    fn contains(&self, entry: &ReadingHistoryEntry) -> bool {
        self.entries
            .iter()
            .any(|e| e.captured_at == entry.captured_at)
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<ReadingHistoryEntry> {
        self.entries.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<&ReadingHistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
