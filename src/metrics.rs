//! Operation counters for the three cache components.
//!
//! All metrics are snapshots: the component keeps atomic counters and copies
//! them into a plain struct on request, so reading metrics never contends
//! with the data locks.

/// Counters for a [`SortedCache`](crate::SortedCache).
///
/// # Example
///
/// ```
/// use tracker_cache::SortedCache;
///
/// let cache: SortedCache<i32> = SortedCache::new(Box::new(|a, b| a.cmp(b)));
/// cache.insert(1);
/// cache.insert(1); // duplicate, rejected
///
/// let m = cache.metrics();
/// assert_eq!(m.inserts, 1);
/// assert_eq!(m.duplicates, 1);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
	/// Items actually inserted (duplicates excluded).
	pub inserts: u64,
	/// Inserts rejected because an equivalent item already existed.
	pub duplicates: u64,
	/// Items removed via `remove`.
	pub removals: u64,
	/// Completed updates (including replace-in-place via `insert_or_update`).
	pub updates: u64,
	/// Comparator swaps via `resort`.
	pub resorts: u64,
	/// Current number of items.
	pub entry_count: usize,
}

impl CacheMetrics {
	/// Total write operations that changed the cache.
	pub fn total_writes(&self) -> u64 {
		self.inserts + self.removals + self.updates
	}
}

/// Counters for a [`CacheCoordinator`](crate::CacheCoordinator).
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct CoordinatorMetrics {
	/// Operations executed immediately (state was `Idle`).
	pub direct_ops: u64,
	/// Operations queued because a reload was in flight.
	pub deferred_ops: u64,
	/// Queued operations replayed after a reload finished.
	pub replayed_ops: u64,
	/// Reload cycles that ran a loader to completion (success or error).
	pub reloads: u64,
	/// Reload requests dropped because one was already in flight.
	pub rejected_reloads: u64,
}

/// Counters for a [`SnapshotDiffEngine`](crate::SnapshotDiffEngine).
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct DiffMetrics {
	/// Completed ticks.
	pub ticks: u64,
	/// Entities reported added across all ticks.
	pub added: u64,
	/// Entities reported removed across all ticks.
	pub removed: u64,
	/// Slot transitions ignored because the occupant failed validation.
	pub skipped_invalid: u64,
	/// Slots skipped because extraction failed.
	pub skipped_malformed: u64,
	/// Slots currently known to be occupied.
	pub occupied: usize,
}

impl DiffMetrics {
	/// Net entity count change observed since the engine started.
	pub fn net_change(&self) -> i64 {
		self.added as i64 - self.removed as i64
	}
}
