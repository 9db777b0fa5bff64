use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;

use super::Reading;

/// Default number of readings retained per sensor
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Bounded ring buffer of readings for a single sensor key.
///
/// Entries are kept in arrival order; once `capacity` is reached the oldest
/// reading is evicted on every append.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Reading>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn append(&mut self, reading: Reading) {
        self.entries.push_back(reading);

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Copy of every entry captured within the last `duration`.
    ///
    /// A duration too large to subtract from the current time selects
    /// everything.
    pub fn window(&self, duration: Duration) -> Vec<Reading> {
        let cutoff = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| Utc::now().checked_sub_signed(d));

        match cutoff {
            Some(cutoff) => self
                .entries
                .iter()
                .filter(|r| r.timestamp >= cutoff)
                .cloned()
                .collect(),
            None => self.entries.iter().cloned().collect(),
        }
    }

    pub fn latest(&self) -> Option<Reading> {
        self.entries.back().cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.entries.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
