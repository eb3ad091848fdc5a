//! Bounded diagnostic trail of connection events.

use std::collections::VecDeque;
use std::fmt;

/// Entries kept before the oldest is evicted.
pub const MAX_HISTORY_SIZE: usize = 50;

/// Most recent connection events, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: VecDeque<String>,
}

impl History {
    /// Create an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry, evicting the oldest past [`MAX_HISTORY_SIZE`].
    pub fn add(&mut self, entry: impl Into<String>) {
        self.entries.push_front(entry.into());
        self.entries.truncate(MAX_HISTORY_SIZE);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Message log:")?;
        for entry in &self.entries {
            writeln!(f, "\t{}", entry)?;
        }
        Ok(())
    }
}
