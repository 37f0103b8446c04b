//! Trigger/repeat hysteresis shared by the detectors.
//!
//! Per target: the first observation arms the entry at `t0`. The target fires
//! once `trigger` has elapsed since `t0`. After that, every time `repeat` has
//! elapsed since `t0` it fires again and `t0` moves to now. A `None` repeat
//! never re-fires.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceEntry {
    pub timestamp: Instant,
    pub triggered: bool,
}

/// Debounce state for one scene session. Owned by a single detector.
#[derive(Debug)]
pub struct Debouncer<K> {
    entries: HashMap<K, DebounceEntry>,
}

impl<K> Default for Debouncer<K> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<K: Eq + Hash> Debouncer<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` is still active at `now`. Returns true when it fires.
    pub fn observe(&mut self, key: K, now: Instant, trigger: Duration, repeat: Option<Duration>) -> bool {
        let entry = self.entries.entry(key).or_insert(DebounceEntry {
            timestamp: now,
            triggered: false,
        });
        let elapsed = now.saturating_duration_since(entry.timestamp);

        if !entry.triggered {
            if elapsed >= trigger {
                entry.triggered = true;
                return true;
            }
            return false;
        }

        match repeat {
            Some(repeat) if elapsed >= repeat => {
                entry.timestamp = now;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, key: &K) -> Option<&DebounceEntry> {
        self.entries.get(key)
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
}
