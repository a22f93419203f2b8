use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::RwLock;

use crate::metrics::CacheMetrics;
use crate::traits::Comparator;

/// Thread-safe collection that keeps items continuously sorted under a
/// caller-supplied comparator. Can be shared across threads via
/// `Arc<SortedCache<T>>`.
///
/// Items comparing equal under the comparator are treated as the same entry:
/// [`insert`](Self::insert) rejects an equivalent item, and value-based
/// lookups ([`remove`](Self::remove), [`index_of`](Self::index_of),
/// [`update`](Self::update)) match on comparator equality.
///
/// Every query returns a materialized copy, never a view into the internal
/// storage, so results stay safe to use after the internal lock is released.
///
/// # Locking
///
/// One reader-writer lock guards all operations: queries take a shared lock,
/// mutations an exclusive one. Closures passed to queries and updates run
/// while that lock is held and must not call back into the cache.
///
/// # Example
///
/// ```
/// use tracker_cache::SortedCache;
///
/// let cache = SortedCache::new(Box::new(|a: &i32, b: &i32| a.cmp(b)));
///
/// cache.insert(5);
/// cache.insert(3);
/// cache.insert(8);
/// cache.insert(1);
/// assert_eq!(cache.sorted_items(), vec![1, 3, 5, 8]);
///
/// cache.remove(&5);
/// assert_eq!(cache.sorted_items(), vec![1, 3, 8]);
///
/// cache.update(&3, |x| *x += 10);
/// assert_eq!(cache.sorted_items(), vec![1, 8, 13]);
/// ```
pub struct SortedCache<T> {
	inner: RwLock<Inner<T>>,
	inserts: AtomicU64,
	duplicates: AtomicU64,
	removals: AtomicU64,
	updates: AtomicU64,
	resorts: AtomicU64,
}

struct Inner<T> {
	/// Kept sorted under `cmp` at all times, no comparator-duplicates.
	items: Vec<T>,
	cmp: Comparator<T>,
}

impl<T> Inner<T> {
	/// Binary search for an equivalent item. `Ok` = present at that index,
	/// `Err` = absent, would insert at that index.
	fn position(&self, item: &T) -> Result<usize, usize> {
		self.items.binary_search_by(|probe| (self.cmp)(probe, item))
	}
}

impl<T> SortedCache<T> {
	/// Create an empty cache sorted under `cmp`.
	pub fn new(cmp: Comparator<T>) -> Self {
		Self::with_seed(cmp, 0, Vec::new())
	}

	/// Used by `SortedCacheBuilder`: pre-sized storage, pre-sorted seed.
	pub(crate) fn with_seed(cmp: Comparator<T>, capacity: usize, seed: Vec<T>) -> Self {
		let mut items = Vec::with_capacity(capacity.max(seed.len()));
		items.extend(seed);
		items.sort_by(|a, b| cmp(a, b));
		let before = items.len();
		items.dedup_by(|a, b| cmp(a, b) == Ordering::Equal);
		if before > items.len() {
			log::warn!("seed contained {} comparator-duplicates, first kept", before - items.len());
		}
		let seeded = items.len() as u64;
		Self {
			inner: RwLock::new(Inner { items, cmp }),
			inserts: AtomicU64::new(seeded),
			duplicates: AtomicU64::new(0),
			removals: AtomicU64::new(0),
			updates: AtomicU64::new(0),
			resorts: AtomicU64::new(0),
		}
	}

	/// Insert an item if no equivalent item is present.
	///
	/// Returns the 0-based sorted position of the item at the moment of
	/// insertion, or `None` if an equivalent item already existed (the insert
	/// is a no-op, not an error). Returned positions are invalidated by any
	/// later mutation.
	pub fn insert(&self, item: T) -> Option<usize> {
		let mut inner = self.inner.write();
		match inner.position(&item) {
			Ok(_) => {
				self.duplicates.fetch_add(1, AtomicOrdering::Relaxed);
				None
			}
			Err(pos) => {
				inner.items.insert(pos, item);
				self.inserts.fetch_add(1, AtomicOrdering::Relaxed);
				Some(pos)
			}
		}
	}

	/// Remove the item equivalent to `item`. Returns whether a removal
	/// happened; removing an absent item is a no-op, not an error.
	pub fn remove(&self, item: &T) -> bool {
		let mut inner = self.inner.write();
		match inner.position(item) {
			Ok(pos) => {
				inner.items.remove(pos);
				self.removals.fetch_add(1, AtomicOrdering::Relaxed);
				true
			}
			Err(_) => false,
		}
	}

	/// Insert `item`, replacing the equivalent entry if one exists.
	///
	/// Returns the item's sorted position. Replacement keeps the position
	/// (the old and new values compare equal, so the order is unchanged).
	pub fn insert_or_update(&self, item: T) -> usize {
		let mut inner = self.inner.write();
		match inner.position(&item) {
			Ok(pos) => {
				inner.items[pos] = item;
				self.updates.fetch_add(1, AtomicOrdering::Relaxed);
				pos
			}
			Err(pos) => {
				inner.items.insert(pos, item);
				self.inserts.fetch_add(1, AtomicOrdering::Relaxed);
				pos
			}
		}
	}

	/// Sorted position of the item equivalent to `item`, if present.
	///
	/// O(log n) binary search over the sorted storage. The position is only
	/// meaningful until the next mutation.
	pub fn index_of(&self, item: &T) -> Option<usize> {
		self.inner.read().position(item).ok()
	}

	/// Position of `item` within the subsequence of items matching `pred`.
	///
	/// Linear scan: every item before the match must be tested against the
	/// predicate to compute the filtered rank. Returns `None` if the item is
	/// absent or does not itself match the predicate.
	pub fn filtered_index_of(&self, item: &T, pred: impl Fn(&T) -> bool) -> Option<usize> {
		let inner = self.inner.read();
		let mut rank = 0;
		for probe in &inner.items {
			let matches = pred(probe);
			if (inner.cmp)(probe, item) == Ordering::Equal {
				return matches.then_some(rank);
			}
			if matches {
				rank += 1;
			}
		}
		None
	}

	/// Swap the active comparator and rebuild the sort order. O(n log n).
	///
	/// All previously returned positions are invalidated. Items that compare
	/// equal under the new comparator collapse to the first occurrence (in
	/// the old order); dropped items are logged.
	pub fn resort(&self, cmp: Comparator<T>) {
		let mut inner = self.inner.write();
		inner.cmp = cmp;
		let Inner { items, cmp } = &mut *inner;
		let cmp: &Comparator<T> = cmp;
		items.sort_by(|a, b| cmp(a, b));
		let before = items.len();
		items.dedup_by(|a, b| cmp(a, b) == Ordering::Equal);
		let dropped = before - items.len();
		if dropped > 0 {
			log::warn!("resort collapsed {dropped} items equal under the new comparator");
		}
		self.resorts.fetch_add(1, AtomicOrdering::Relaxed);
	}

	/// Current number of items.
	pub fn len(&self) -> usize {
		self.inner.read().items.len()
	}

	/// Whether the cache holds no items.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Snapshot of the operation counters.
	pub fn metrics(&self) -> CacheMetrics {
		CacheMetrics {
			inserts: self.inserts.load(AtomicOrdering::Relaxed),
			duplicates: self.duplicates.load(AtomicOrdering::Relaxed),
			removals: self.removals.load(AtomicOrdering::Relaxed),
			updates: self.updates.load(AtomicOrdering::Relaxed),
			resorts: self.resorts.load(AtomicOrdering::Relaxed),
			entry_count: self.len(),
		}
	}
}

impl<T: Clone> SortedCache<T> {
	/// Remove the item equivalent to `item`, apply `mutate`, and reinsert at
	/// the position its new ordering key demands.
	///
	/// Returns the new sorted position, or `None` if the item was absent.
	/// This is the only safe way to change ordering-relevant state: mutating
	/// an item in place would silently break the sort order.
	///
	/// If the mutation makes the item compare equal to a *different* existing
	/// entry, the update is rolled back (the original item is restored), a
	/// warning is logged, and `None` is returned.
	pub fn update(&self, item: &T, mutate: impl FnOnce(&mut T)) -> Option<usize> {
		let mut inner = self.inner.write();
		let pos = inner.position(item).ok()?;
		self.apply_update(&mut inner, pos, mutate)
	}

	/// Update the first item matching `pred`, returning its new position.
	///
	/// Same reinsert and rollback semantics as [`update`](Self::update).
	pub fn update_first(
		&self,
		pred: impl Fn(&T) -> bool,
		mutate: impl FnOnce(&mut T),
	) -> Option<usize> {
		let mut inner = self.inner.write();
		let pos = inner.items.iter().position(|i| pred(i))?;
		self.apply_update(&mut inner, pos, mutate)
	}

	/// Update every item matching `pred`, returning how many were updated.
	///
	/// Matches are captured before any mutation runs, so an update cannot
	/// make a previously unmatched item eligible within the same call.
	/// Updates rolled back due to a collision are not counted.
	pub fn update_all(&self, pred: impl Fn(&T) -> bool, mutate: impl Fn(&mut T)) -> usize {
		let mut inner = self.inner.write();
		let matches: Vec<T> = inner.items.iter().filter(|i| pred(*i)).cloned().collect();
		let mut updated = 0;
		for item in matches {
			if let Ok(pos) = inner.position(&item)
				&& self.apply_update(&mut inner, pos, &mutate).is_some()
			{
				updated += 1;
			}
		}
		updated
	}

	/// First item matching `pred`, in sorted order. Returns a clone.
	pub fn find_first(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
		self.inner.read().items.iter().find(|i| pred(*i)).cloned()
	}

	/// All items matching `pred`, in sorted order. Returns clones.
	pub fn find_all(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
		self.inner.read().items.iter().filter(|i| pred(*i)).cloned().collect()
	}

	/// Full sorted contents.
	pub fn sorted_items(&self) -> Vec<T> {
		self.inner.read().items.clone()
	}

	/// Page of the sorted contents: up to `count` items starting at sorted
	/// position `start`. A page past the end is empty, a page crossing the
	/// end is truncated.
	pub fn sorted_range(&self, start: usize, count: usize) -> Vec<T> {
		self.inner.read().items.iter().skip(start).take(count).cloned().collect()
	}

	/// Page of the items matching `pred`: up to `count` matches starting at
	/// filtered position `start`, in sorted order.
	pub fn filtered_range(&self, pred: impl Fn(&T) -> bool, start: usize, count: usize) -> Vec<T> {
		self.inner
			.read()
			.items
			.iter()
			.filter(|i| pred(*i))
			.skip(start)
			.take(count)
			.cloned()
			.collect()
	}

	/// Remove/mutate/reinsert the entry at `pos`. Caller holds the write
	/// lock and guarantees `pos` is in bounds.
	fn apply_update(
		&self,
		inner: &mut Inner<T>,
		pos: usize,
		mutate: impl FnOnce(&mut T),
	) -> Option<usize> {
		let original = inner.items.remove(pos);
		let mut mutated = original.clone();
		mutate(&mut mutated);
		match inner.position(&mutated) {
			Err(new_pos) => {
				inner.items.insert(new_pos, mutated);
				self.updates.fetch_add(1, AtomicOrdering::Relaxed);
				Some(new_pos)
			}
			Ok(_) => {
				// The mutated item now collides with a different entry.
				// Restore the original rather than lose either one.
				log::warn!("update rejected: mutated item collides with an existing entry");
				let restore = inner
					.position(&original)
					.err()
					.unwrap_or(pos);
				inner.items.insert(restore, original);
				None
			}
		}
	}
}
