use crate::sorted::SortedCache;
use crate::traits::Comparator;

/// Builder for configuring a [`SortedCache`].
///
/// # Example
///
/// ```
/// use tracker_cache::SortedCacheBuilder;
///
/// let cache = SortedCacheBuilder::new(Box::new(|a: &u32, b: &u32| a.cmp(b)))
///     .capacity(256)
///     .seed(vec![9, 4, 7])
///     .build();
///
/// assert_eq!(cache.sorted_items(), vec![4, 7, 9]);
/// ```
pub struct SortedCacheBuilder<T> {
	cmp: Comparator<T>,
	capacity: usize,
	seed: Vec<T>,
}

impl<T> SortedCacheBuilder<T> {
	/// Create a builder with the given comparator and no initial contents.
	pub fn new(cmp: Comparator<T>) -> Self {
		Self {
			cmp,
			capacity: 0,
			seed: Vec::new(),
		}
	}

	/// Pre-size the internal storage for an expected item count.
	///
	/// Purely a reallocation hint; the cache is never bounded.
	pub fn capacity(mut self, capacity: usize) -> Self {
		self.capacity = capacity;
		self
	}

	/// Initial contents. Sorted on build; items equal under the comparator
	/// collapse to their first occurrence.
	pub fn seed(mut self, seed: Vec<T>) -> Self {
		self.seed = seed;
		self
	}

	/// Build the cache with the configured settings.
	pub fn build(self) -> SortedCache<T> {
		SortedCache::with_seed(self.cmp, self.capacity, self.seed)
	}
}
