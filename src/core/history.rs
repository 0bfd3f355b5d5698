//! Bounded, lock-protected recent history for one sensor stream.
//!
//! Producers append from their own threads or tasks; the aggregation
//! scheduler takes a copy once per tick. The lock is held only while the
//! deque is mutated or cloned.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Fixed-capacity FIFO that evicts the oldest entry when full.
#[derive(Debug)]
pub struct BoundedHistory<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
}

/// Thread-safe shared history.
pub type SharedHistory<T> = Arc<BoundedHistory<T>>;

impl<T: Clone> BoundedHistory<T> {
    /// Create an empty history. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Create a history wrapped for sharing between producers and the scheduler.
    pub fn shared(capacity: usize) -> SharedHistory<T> {
        Arc::new(Self::new(capacity))
    }

    /// Append a sample, evicting the oldest one if the history is full.
    pub fn append(&self, item: T) {
        let mut items = self.lock();
        if items.len() == self.capacity {
            items.pop_front();
        }
        items.push_back(item);
    }

    /// Copy the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().iter().cloned().collect()
    }

    /// Discard everything.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // The deque only holds plain values, so a panic in another holder
    // cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_keeps_last_capacity_items_in_order() {
        for (appends, capacity) in [(0usize, 5usize), (3, 5), (5, 5), (12, 5), (250, 100)] {
            let history = BoundedHistory::new(capacity);
            for i in 0..appends {
                history.append(i);
            }

            let snapshot = history.snapshot();
            assert_eq!(snapshot.len(), appends.min(capacity));
            let expected: Vec<usize> = (appends.saturating_sub(capacity)..appends).collect();
            assert_eq!(snapshot, expected);
        }
    }

    #[test]
    fn test_clear_empties_history() {
        let history = BoundedHistory::new(100);
        for i in 0..50 {
            history.append(i);
        }
        assert_eq!(history.len(), 50);

        history.clear();
        assert!(history.is_empty());
        assert!(history.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let history = BoundedHistory::new(4);
        history.append(1);
        let snapshot = history.snapshot();
        history.append(2);
        assert_eq!(snapshot, vec![1]);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_concurrent_appends_respect_capacity() {
        let history: SharedHistory<u64> = BoundedHistory::shared(500);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let history = Arc::clone(&history);
                thread::spawn(move || {
                    for i in 0..1_000 {
                        history.append(t * 10_000 + i);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(history.len(), 500);
        assert_eq!(history.capacity(), 500);
    }
}
