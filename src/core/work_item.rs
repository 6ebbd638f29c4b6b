//! Work items and the id source that numbers them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::hooks::ExecutionInfo;
use crate::core::work::ExecutionKind;

/// Identifier assigned to every submitted work item.
pub type WorkId = u64;

/// Caller-supplied priority; larger values dequeue first.
pub type Weight = i32;

/// Weight used by the unweighted submission helpers.
pub const DEFAULT_WEIGHT: Weight = 0;

/// Monotonic id counter shared by the engines of one scheduler.
///
/// Cloning yields another handle to the same counter. Ids are used for
/// diagnostics and hook correlation only, never for ordering.
#[derive(Clone)]
pub struct WorkIdSource {
    next: Arc<AtomicU64>,
}

impl WorkIdSource {
    /// Create a counter whose first id is `1`.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a counter whose first id is `first`.
    #[must_use]
    pub fn starting_at(first: WorkId) -> Self {
        Self {
            next: Arc::new(AtomicU64::new(first)),
        }
    }

    /// Take the next id.
    pub fn next_id(&self) -> WorkId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Id the next call to [`next_id`](Self::next_id) will return.
    #[must_use]
    pub fn peek(&self) -> WorkId {
        self.next.load(Ordering::Relaxed)
    }

    /// Restart numbering at `1` for every handle sharing this counter.
    pub fn reset(&self) {
        self.next.store(1, Ordering::Relaxed);
    }
}

impl Default for WorkIdSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WorkIdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkIdSource")
            .field("next", &self.peek())
            .finish()
    }
}

/// A submitted callable together with its id and weight.
///
/// Owned by its queue slot until dequeued, then by the dequeuing worker.
pub struct WorkItem<P> {
    id: WorkId,
    weight: Weight,
    payload: P,
}

impl<P> WorkItem<P> {
    /// Wrap `payload`, drawing a fresh id from `ids`.
    pub fn new(ids: &WorkIdSource, weight: Weight, payload: P) -> Self {
        Self {
            id: ids.next_id(),
            weight,
            payload,
        }
    }

    /// Item identifier.
    #[must_use]
    pub const fn id(&self) -> WorkId {
        self.id
    }

    /// Item weight.
    #[must_use]
    pub const fn weight(&self) -> Weight {
        self.weight
    }

    /// Hook snapshot for this item as executed by a `kind` engine.
    #[must_use]
    pub const fn info(&self, kind: ExecutionKind) -> ExecutionInfo {
        ExecutionInfo {
            id: self.id,
            weight: self.weight,
            is_async: matches!(kind, ExecutionKind::Async),
        }
    }

    /// Consume the item, yielding the callable.
    pub fn into_payload(self) -> P {
        self.payload
    }
}

impl<P> fmt::Debug for WorkItem<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("id", &self.id)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}
