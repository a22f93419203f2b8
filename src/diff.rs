use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::metrics::DiffMetrics;
use crate::traits::SlotSource;

type AddedListener<R> = Box<dyn Fn(&[R]) + Send + Sync>;
type RemovedListener = Box<dyn Fn(&[u64]) + Send + Sync>;

/// Batched outcome of one [`SnapshotDiffEngine::tick`].
#[derive(Debug, Clone)]
pub struct TickDelta<R> {
	/// Records for entities that appeared since the previous tick.
	pub added: Vec<R>,
	/// Identifiers of entities that disappeared since the previous tick.
	pub removed: Vec<u64>,
}

impl<R> TickDelta<R> {
	/// Whether the tick observed no changes.
	pub fn is_empty(&self) -> bool {
		self.added.is_empty() && self.removed.is_empty()
	}
}

/// Last-observed id per slot, plus an id index over the occupied slots.
struct ShadowState {
	/// `shadow[i]` = id most recently confirmed present at slot `i`, 0 if
	/// none.
	shadow: Vec<u64>,
	/// id -> slot index, for every slot the shadow considers occupied.
	by_id: HashMap<u64, usize>,
}

/// Converts periodic polling of a fixed-capacity slot table into discrete
/// added/removed entity events.
///
/// The engine never mutates the table: it keeps a same-sized shadow of the
/// ids it last saw, and each [`tick`](Self::tick) scans the table once,
/// comparing slot by slot. Appearances, disappearances and same-tick
/// replacements become one batched delta per tick; batching bounds
/// notification overhead when many slots change at once (e.g. a bulk
/// population change).
///
/// Ticks are driven by an external scheduler, one at a time, never
/// reentrant. The tick holds the exclusive lock on the shadow state, so
/// point lookups (shared lock) never observe a half-scanned view. The table
/// must keep slot indices stable for the duration of a single tick.
///
/// Occupants that fail the source's validity predicate are treated as if
/// the slot were still empty, so transient or partially-initialized entries
/// produce no events until they become real. A slot whose extraction fails
/// is skipped for the whole tick, shadow untouched, and retried on the
/// next one; a single malformed slot never aborts a tick.
pub struct SnapshotDiffEngine<S: SlotSource> {
	source: Arc<S>,
	state: RwLock<ShadowState>,
	added_listeners: RwLock<Vec<AddedListener<S::Record>>>,
	removed_listeners: RwLock<Vec<RemovedListener>>,
	ticks: AtomicU64,
	added_total: AtomicU64,
	removed_total: AtomicU64,
	skipped_invalid: AtomicU64,
	skipped_malformed: AtomicU64,
}

impl<S: SlotSource> SnapshotDiffEngine<S> {
	/// Create an engine over `source` with an all-empty shadow.
	///
	/// The first tick therefore reports every valid occupant as added.
	pub fn new(source: Arc<S>) -> Self {
		let capacity = source.capacity();
		Self {
			source,
			state: RwLock::new(ShadowState {
				shadow: vec![0; capacity],
				by_id: HashMap::new(),
			}),
			added_listeners: RwLock::new(Vec::new()),
			removed_listeners: RwLock::new(Vec::new()),
			ticks: AtomicU64::new(0),
			added_total: AtomicU64::new(0),
			removed_total: AtomicU64::new(0),
			skipped_invalid: AtomicU64::new(0),
			skipped_malformed: AtomicU64::new(0),
		}
	}

	/// Scan the table once and emit what changed since the previous tick.
	///
	/// Fires the removed listeners (if anything disappeared) and then the
	/// added listeners (if anything appeared), each exactly once with the
	/// full batch, after the shadow lock has been released. The delta is
	/// also returned for callers that prefer polling over listeners.
	pub fn tick(&self) -> TickDelta<S::Record> {
		let mut added = Vec::new();
		let mut removed = Vec::new();

		{
			let mut state = self.state.write();
			for index in 0..state.shadow.len() {
				let current = self.source.slot_id(index);
				let previous = state.shadow[index];
				if current == previous {
					continue;
				}
				if current == 0 {
					// Occupied slot went empty.
					removed.push(previous);
					state.by_id.remove(&previous);
					state.shadow[index] = 0;
					continue;
				}
				// New occupant, either into an empty slot or replacing the
				// previous entity within one tick.
				if !self.source.is_valid(index) {
					self.skipped_invalid.fetch_add(1, AtomicOrdering::Relaxed);
					if previous != 0 {
						// The old entity is gone either way. The slot counts
						// as empty until its occupant becomes valid.
						removed.push(previous);
						state.by_id.remove(&previous);
						state.shadow[index] = 0;
					}
					continue;
				}
				let Some(record) = self.source.extract(index) else {
					// Malformed slot: leave the shadow alone and retry next
					// tick. The rest of the scan continues.
					log::warn!("slot {index}: extraction failed, skipping for this tick");
					self.skipped_malformed.fetch_add(1, AtomicOrdering::Relaxed);
					continue;
				};
				if previous != 0 {
					removed.push(previous);
					state.by_id.remove(&previous);
				}
				state.shadow[index] = current;
				state.by_id.insert(current, index);
				added.push(record);
			}
		}

		self.ticks.fetch_add(1, AtomicOrdering::Relaxed);
		self.removed_total.fetch_add(removed.len() as u64, AtomicOrdering::Relaxed);
		self.added_total.fetch_add(added.len() as u64, AtomicOrdering::Relaxed);

		if !removed.is_empty() {
			for listener in self.removed_listeners.read().iter() {
				listener(&removed);
			}
		}
		if !added.is_empty() {
			for listener in self.added_listeners.read().iter() {
				listener(&added);
			}
		}

		TickDelta { added, removed }
	}

	/// Look up a currently-tracked entity by identifier.
	///
	/// Served from the id index under the shared lock, so lookups never race
	/// a tick's exclusive pass. Answers only from slots the shadow still
	/// claims; if the table has already moved on since the last tick the
	/// entity is reported absent rather than guessed at.
	pub fn find_by_id(&self, id: u64) -> Option<S::Record> {
		if id == 0 {
			return None;
		}
		let state = self.state.read();
		let index = *state.by_id.get(&id)?;
		if self.source.slot_id(index) != id {
			return None;
		}
		self.source.extract(index)
	}

	/// First currently-tracked entity matching `pred`, if any.
	///
	/// Covers secondary-key lookups (name plus qualifier and the like);
	/// linear in the number of occupied slots.
	pub fn find_first(&self, pred: impl Fn(&S::Record) -> bool) -> Option<S::Record> {
		let state = self.state.read();
		for (&id, &index) in state.by_id.iter() {
			if self.source.slot_id(index) != id {
				continue;
			}
			if let Some(record) = self.source.extract(index)
				&& pred(&record)
			{
				return Some(record);
			}
		}
		None
	}

	/// Identifiers of all currently-tracked entities, ascending.
	pub fn known_ids(&self) -> Vec<u64> {
		let state = self.state.read();
		let mut ids: Vec<u64> = state.by_id.keys().copied().collect();
		ids.sort_unstable();
		ids
	}

	/// Number of slots currently known to be occupied.
	pub fn occupied(&self) -> usize {
		self.state.read().by_id.len()
	}

	/// Register a listener for the batched added records of a tick.
	pub fn on_added(&self, listener: impl Fn(&[S::Record]) + Send + Sync + 'static) {
		self.added_listeners.write().push(Box::new(listener));
	}

	/// Register a listener for the batched removed identifiers of a tick.
	pub fn on_removed(&self, listener: impl Fn(&[u64]) + Send + Sync + 'static) {
		self.removed_listeners.write().push(Box::new(listener));
	}

	/// Snapshot of the scan counters.
	pub fn metrics(&self) -> DiffMetrics {
		DiffMetrics {
			ticks: self.ticks.load(AtomicOrdering::Relaxed),
			added: self.added_total.load(AtomicOrdering::Relaxed),
			removed: self.removed_total.load(AtomicOrdering::Relaxed),
			skipped_invalid: self.skipped_invalid.load(AtomicOrdering::Relaxed),
			skipped_malformed: self.skipped_malformed.load(AtomicOrdering::Relaxed),
			occupied: self.occupied(),
		}
	}
}

#[cfg(test)]
mod tests {
	use parking_lot::Mutex;

	use super::*;

	#[derive(Clone, Debug, PartialEq, Eq)]
	struct Entity {
		id: u64,
		name: &'static str,
	}

	#[derive(Clone, Default)]
	struct Slot {
		id: u64,
		name: &'static str,
		valid: bool,
		malformed: bool,
	}

	struct TestTable {
		slots: Mutex<Vec<Slot>>,
	}

	impl TestTable {
		fn new(capacity: usize) -> Arc<Self> {
			Arc::new(Self {
				slots: Mutex::new(vec![Slot::default(); capacity]),
			})
		}

		fn occupy(&self, index: usize, id: u64, name: &'static str) {
			self.slots.lock()[index] = Slot {
				id,
				name,
				valid: true,
				malformed: false,
			};
		}

		fn occupy_invalid(&self, index: usize, id: u64) {
			self.slots.lock()[index] = Slot {
				id,
				name: "",
				valid: false,
				malformed: false,
			};
		}

		fn occupy_malformed(&self, index: usize, id: u64) {
			self.slots.lock()[index] = Slot {
				id,
				name: "",
				valid: true,
				malformed: true,
			};
		}

		fn vacate(&self, index: usize) {
			self.slots.lock()[index] = Slot::default();
		}

		fn mark_valid(&self, index: usize, name: &'static str) {
			let mut slots = self.slots.lock();
			slots[index].valid = true;
			slots[index].malformed = false;
			slots[index].name = name;
		}
	}

	impl SlotSource for TestTable {
		type Record = Entity;

		fn capacity(&self) -> usize {
			self.slots.lock().len()
		}

		fn slot_id(&self, index: usize) -> u64 {
			self.slots.lock()[index].id
		}

		fn is_valid(&self, index: usize) -> bool {
			self.slots.lock()[index].valid
		}

		fn extract(&self, index: usize) -> Option<Self::Record> {
			let slot = self.slots.lock()[index].clone();
			if slot.malformed {
				return None;
			}
			Some(Entity {
				id: slot.id,
				name: slot.name,
			})
		}
	}

	fn engine(capacity: usize) -> (Arc<TestTable>, SnapshotDiffEngine<TestTable>) {
		let table = TestTable::new(capacity);
		let engine = SnapshotDiffEngine::new(table.clone());
		(table, engine)
	}

	#[test]
	fn test_empty_to_occupied_emits_added() {
		let (table, engine) = engine(4);
		table.occupy(0, 10, "alpha");

		let delta = engine.tick();
		assert_eq!(delta.added, vec![Entity { id: 10, name: "alpha" }]);
		assert!(delta.removed.is_empty());

		// Steady state: nothing changes on the next tick.
		assert!(engine.tick().is_empty());
	}

	#[test]
	fn test_occupied_to_empty_emits_removed() {
		let (table, engine) = engine(4);
		table.occupy(2, 7, "beta");
		engine.tick();

		table.vacate(2);
		let delta = engine.tick();
		assert!(delta.added.is_empty());
		assert_eq!(delta.removed, vec![7]);
		assert_eq!(engine.occupied(), 0);
	}

	#[test]
	fn test_replacement_emits_both_in_one_tick() {
		let (table, engine) = engine(4);
		table.occupy(1, 5, "old");
		engine.tick();

		table.occupy(1, 6, "new");
		let delta = engine.tick();
		assert_eq!(delta.removed, vec![5]);
		assert_eq!(delta.added, vec![Entity { id: 6, name: "new" }]);
	}

	#[test]
	fn test_invalid_occupant_is_ignored_until_valid() {
		let (table, engine) = engine(4);
		table.occupy_invalid(0, 9);

		assert!(engine.tick().is_empty());
		assert_eq!(engine.occupied(), 0);

		// The same slot turning valid later must still produce an Added.
		table.mark_valid(0, "gamma");
		let delta = engine.tick();
		assert_eq!(delta.added, vec![Entity { id: 9, name: "gamma" }]);
	}

	#[test]
	fn test_replacement_by_invalid_occupant_removes_only() {
		let (table, engine) = engine(4);
		table.occupy(3, 11, "old");
		engine.tick();

		table.occupy_invalid(3, 12);
		let delta = engine.tick();
		assert_eq!(delta.removed, vec![11]);
		assert!(delta.added.is_empty());

		table.mark_valid(3, "fresh");
		let delta = engine.tick();
		assert_eq!(delta.added, vec![Entity { id: 12, name: "fresh" }]);
	}

	#[test]
	fn test_malformed_slot_is_skipped_not_fatal() {
		let (table, engine) = engine(4);
		table.occupy_malformed(1, 20);
		table.occupy(2, 21, "fine");

		// Slot 1 fails extraction; slot 2 must still come through.
		let delta = engine.tick();
		assert_eq!(delta.added, vec![Entity { id: 21, name: "fine" }]);
		assert_eq!(engine.metrics().skipped_malformed, 1);

		// Once readable, the slot is picked up as if it had just appeared.
		table.mark_valid(1, "late");
		let delta = engine.tick();
		assert_eq!(delta.added, vec![Entity { id: 20, name: "late" }]);
	}

	#[test]
	fn test_bulk_changes_batch_into_one_delta() {
		let (table, engine) = engine(8);
		for i in 0..8 {
			table.occupy(i, 100 + i as u64, "e");
		}
		let delta = engine.tick();
		assert_eq!(delta.added.len(), 8);

		for i in 0..4 {
			table.vacate(i);
		}
		let delta = engine.tick();
		assert_eq!(delta.removed.len(), 4);
		assert_eq!(engine.occupied(), 4);
	}

	#[test]
	fn test_listeners_fire_once_per_batch_removed_first() {
		let (table, engine) = engine(4);
		let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

		let l = log.clone();
		engine.on_added(move |records| l.lock().push(format!("added:{}", records.len())));
		let l = log.clone();
		engine.on_removed(move |ids| l.lock().push(format!("removed:{}", ids.len())));

		table.occupy(0, 1, "a");
		table.occupy(1, 2, "b");
		engine.tick();
		assert_eq!(*log.lock(), vec!["added:2"]);

		log.lock().clear();
		table.vacate(0);
		table.occupy(1, 3, "c");
		engine.tick();
		assert_eq!(*log.lock(), vec!["removed:2", "added:1"]);
	}

	#[test]
	fn test_quiet_tick_fires_no_listeners() {
		let (_table, engine) = engine(4);
		let fired = Arc::new(Mutex::new(false));
		let f = fired.clone();
		engine.on_added(move |_| *f.lock() = true);
		let f = fired.clone();
		engine.on_removed(move |_| *f.lock() = true);

		engine.tick();
		assert!(!*fired.lock());
	}

	#[test]
	fn test_find_by_id() {
		let (table, engine) = engine(4);
		table.occupy(2, 42, "target");
		engine.tick();

		assert_eq!(engine.find_by_id(42), Some(Entity { id: 42, name: "target" }));
		assert_eq!(engine.find_by_id(43), None);
		assert_eq!(engine.find_by_id(0), None);

		table.vacate(2);
		engine.tick();
		assert_eq!(engine.find_by_id(42), None);
	}

	#[test]
	fn test_find_by_id_distrusts_stale_slots() {
		let (table, engine) = engine(4);
		table.occupy(0, 5, "was");
		engine.tick();

		// Table changed between ticks: the shadow still claims id 5, but the
		// slot no longer holds it. Must not hand back the wrong entity.
		table.occupy(0, 6, "now");
		assert_eq!(engine.find_by_id(5), None);
	}

	#[test]
	fn test_find_first_by_secondary_key() {
		let (table, engine) = engine(4);
		table.occupy(0, 1, "miller");
		table.occupy(1, 2, "smith");
		engine.tick();

		assert_eq!(
			engine.find_first(|e| e.name == "smith"),
			Some(Entity { id: 2, name: "smith" })
		);
		assert_eq!(engine.find_first(|e| e.name == "nobody"), None);
	}

	#[test]
	fn test_known_ids_sorted() {
		let (table, engine) = engine(4);
		table.occupy(0, 30, "c");
		table.occupy(1, 10, "a");
		table.occupy(2, 20, "b");
		engine.tick();
		assert_eq!(engine.known_ids(), vec![10, 20, 30]);
	}

	#[test]
	fn test_metrics() {
		let (table, engine) = engine(4);
		table.occupy(0, 1, "a");
		table.occupy_invalid(1, 2);
		engine.tick();
		table.vacate(0);
		engine.tick();

		let m = engine.metrics();
		assert_eq!(m.ticks, 2);
		assert_eq!(m.added, 1);
		assert_eq!(m.removed, 1);
		assert_eq!(m.skipped_invalid, 2);
		assert_eq!(m.occupied, 0);
		assert_eq!(m.net_change(), 0);
	}
}
