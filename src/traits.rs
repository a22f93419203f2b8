use std::cmp::Ordering;

/// Total order over cached items, supplied at construction (or swapped via
/// [`SortedCache::resort`](crate::SortedCache::resort)).
///
/// Two items comparing `Ordering::Equal` are considered the *same* entry by
/// the cache: inserts of an equal item are rejected, lookups by value match
/// on equality under this comparator.
pub type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Read-only view of an externally-owned, fixed-capacity slot table.
///
/// Each slot holds either nothing or exactly one entity, identified by a
/// nonzero `u64`. The table is owned and refreshed by the host; the diff
/// engine only reads it and assumes slot indices are stable for the duration
/// of a single [`tick`](crate::SnapshotDiffEngine::tick).
///
/// Implementations replace whatever mechanism the host uses to read entity
/// fields (native structs, FFI, shared memory) with three narrow questions:
/// what id occupies a slot, is the occupant a real entity, and what record
/// does it reconstruct to.
///
/// # Example
///
/// ```
/// use tracker_cache::SlotSource;
///
/// struct Table {
///     slots: Vec<Option<(u64, String)>>,
/// }
///
/// impl SlotSource for Table {
///     type Record = (u64, String);
///
///     fn capacity(&self) -> usize {
///         self.slots.len()
///     }
///
///     fn slot_id(&self, index: usize) -> u64 {
///         self.slots[index].as_ref().map_or(0, |(id, _)| *id)
///     }
///
///     fn is_valid(&self, index: usize) -> bool {
///         // e.g. reject ids outside the host's recognized range
///         self.slot_id(index) != 0
///     }
///
///     fn extract(&self, index: usize) -> Option<Self::Record> {
///         self.slots[index].clone()
///     }
/// }
/// ```
pub trait SlotSource: Send + Sync {
	/// Domain record reconstructed from an occupied slot.
	type Record;

	/// Number of slots. Must not change while the engine is alive.
	fn capacity(&self) -> usize;

	/// Identifier currently occupying the slot, or `0` if the slot is empty.
	fn slot_id(&self, index: usize) -> u64;

	/// Whether the occupant of the slot is a real, fully-initialized entity.
	///
	/// Transient or partially-initialized occupants should return `false`;
	/// the engine then treats the slot as still empty and retries on a later
	/// tick.
	fn is_valid(&self, index: usize) -> bool;

	/// Reconstruct the domain record for the slot's occupant.
	///
	/// Returning `None` marks the slot as malformed for this tick: the engine
	/// skips it entirely (no events, shadow state untouched) and continues
	/// with the remaining slots.
	fn extract(&self, index: usize) -> Option<Self::Record>;
}
