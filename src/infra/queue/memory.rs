//! In-memory weighted queue backed by a binary heap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use parking_lot::Mutex;

use crate::core::Weight;

/// Heap entry ordered by weight only; ties have no defined order.
struct WeightedEntry<T> {
    weight: Weight,
    item: T,
}

impl<T> PartialEq for WeightedEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight
    }
}

impl<T> Eq for WeightedEntry<T> {}

impl<T> PartialOrd for WeightedEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for WeightedEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: larger weight pops first.
        self.weight.cmp(&other.weight)
    }
}

/// Thread-safe priority queue where the numerically largest weight dequeues
/// first. O(log n) push and pop behind a single mutex.
///
/// Only items still queued are counted; popped items under execution are not.
pub struct WeightedQueue<T> {
    heap: Mutex<BinaryHeap<WeightedEntry<T>>>,
    /// Mirror of the heap length, readable without taking the lock.
    len: AtomicUsize,
}

impl<T> WeightedQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty queue with room for `capacity` items.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::with_capacity(capacity.min(1024))),
            len: AtomicUsize::new(0),
        }
    }

    /// Insert `item` with the given weight.
    pub fn push(&self, item: T, weight: Weight) {
        let mut heap = self.heap.lock();
        heap.push(WeightedEntry { weight, item });
        self.len.store(heap.len(), AtomicOrdering::Release);
    }

    /// Remove the item with the largest weight, or `None` when empty.
    pub fn try_pop(&self) -> Option<T> {
        let mut heap = self.heap.lock();
        let entry = heap.pop();
        self.len.store(heap.len(), AtomicOrdering::Release);
        entry.map(|entry| entry.item)
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.len.load(AtomicOrdering::Acquire)
    }

    /// Whether no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for WeightedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
