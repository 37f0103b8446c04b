//! Single-value handoff between two threads.
//!
//! Holds the most recent value written by one producer; a consumer may read
//! it or take it when it matches. Used for the last hand-on-top target, which
//! the HandOnTop listener writes and the presence tracker reads.

use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
pub struct HandoffCell<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for HandoffCell<T> {
    fn default() -> Self {
        Self { slot: Mutex::new(None) }
    }
}

impl<T: Clone> HandoffCell<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, value: T) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn get(&self) -> Option<T> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Take the value only if it satisfies `pred`; otherwise leave it in place.
    pub fn take_if(&self, pred: impl FnOnce(&T) -> bool) -> Option<T> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(pred) {
            slot.take()
        } else {
            None
        }
    }

    pub fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_if_matches() {
        let cell = HandoffCell::new();
        cell.put("cup".to_string());
        assert_eq!(cell.take_if(|v| v == "plate"), None);
        assert_eq!(cell.get().as_deref(), Some("cup"));
        assert_eq!(cell.take_if(|v| v == "cup").as_deref(), Some("cup"));
        assert_eq!(cell.get(), None);
    }

    #[test]
    fn test_latest_write_wins() {
        let cell = HandoffCell::new();
        cell.put(1);
        cell.put(2);
        assert_eq!(cell.get(), Some(2));
        cell.clear();
        assert_eq!(cell.get(), None);
    }
}
