//! Bounded, optionally de-duplicated append log

use std::collections::{HashSet, VecDeque};

/// Retention policy for the event and dialogue logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPolicy {
    /// Oldest entries are evicted beyond this many
    pub max_entries: usize,
    /// Skip entries whose delivery key was already seen
    pub dedupe: bool,
}

impl LogPolicy {
    pub const DEFAULT_MAX_ENTRIES: usize = 500;
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self {
            max_entries: Self::DEFAULT_MAX_ENTRIES,
            dedupe: true,
        }
    }
}

/// Append-only log that keeps at most `max_entries` items.
///
/// Keys of evicted entries are forgotten together with the entry.
#[derive(Debug, Clone)]
pub struct EventLog<T> {
    policy: LogPolicy,
    entries: VecDeque<(Option<String>, T)>,
    seen: HashSet<String>,
}

impl<T> EventLog<T> {
    pub fn new(policy: LogPolicy) -> Self {
        Self {
            policy,
            entries: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    pub fn policy(&self) -> LogPolicy {
        self.policy
    }

    /// Append an entry. Returns `false` if it was skipped as a duplicate.
    pub fn push(&mut self, entry: T, key: Option<String>) -> bool {
        if self.policy.max_entries == 0 {
            return false;
        }

        if let Some(ref key) = key {
            if self.policy.dedupe && !self.seen.insert(key.clone()) {
                return false;
            }
        }

        self.entries.push_back((key, entry));
        while self.entries.len() > self.policy.max_entries {
            if let Some((Some(evicted), _)) = self.entries.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter().map(|(_, entry)| entry)
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&T> {
        let skip = self.entries.len().saturating_sub(n);
        self.iter().skip(skip).collect()
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.back().map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }
}

impl<T> Default for EventLog<T> {
    fn default() -> Self {
        Self::new(LogPolicy::default())
    }
}
