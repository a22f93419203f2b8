//! # Tracker Cache
//!
//! An in-memory caching layer for entity collections that live in an
//! externally-owned world:
//!
//! - **[`SortedCache`]** — thread-safe storage that keeps items individually
//!   addressable and continuously sorted under a caller-supplied ordering,
//!   with paginated and filtered queries
//! - **[`CacheCoordinator`]** — serializes full cache reloads against
//!   piecemeal mutations: mutations arriving mid-reload are queued and
//!   replayed FIFO instead of racing the reload or getting dropped
//! - **[`SnapshotDiffEngine`]** — polls a fixed-capacity slot table once per
//!   tick and turns slot-level changes into batched added/removed entity
//!   events
//!
//! The three pieces are independent, but the intended wiring is: an external
//! scheduler drives the engine's tick, the engine's batched events go through
//! the coordinator, and the coordinator applies them to the sorted cache.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use tracker_cache::{CacheCoordinator, SlotSource, SnapshotDiffEngine, SortedCache};
//!
//! #[derive(Clone, Debug)]
//! struct Player {
//!     id: u64,
//!     name: String,
//! }
//!
//! // The host owns the slot table; the engine only reads it.
//! struct Roster {
//!     slots: Vec<Option<Player>>,
//! }
//!
//! impl SlotSource for Roster {
//!     type Record = Player;
//!
//!     fn capacity(&self) -> usize {
//!         self.slots.len()
//!     }
//!
//!     fn slot_id(&self, index: usize) -> u64 {
//!         self.slots[index].as_ref().map_or(0, |p| p.id)
//!     }
//!
//!     fn is_valid(&self, index: usize) -> bool {
//!         self.slots[index].as_ref().is_some_and(|p| !p.name.is_empty())
//!     }
//!
//!     fn extract(&self, index: usize) -> Option<Player> {
//!         self.slots[index].clone()
//!     }
//! }
//!
//! let table = Arc::new(Roster {
//!     slots: vec![
//!         Some(Player { id: 2, name: "bravo".into() }),
//!         None,
//!         Some(Player { id: 1, name: "alpha".into() }),
//!     ],
//! });
//!
//! let cache = Arc::new(SortedCache::new(Box::new(|a: &Player, b: &Player| a.id.cmp(&b.id))));
//! let coordinator = Arc::new(CacheCoordinator::new());
//! let engine = SnapshotDiffEngine::new(table);
//!
//! // Push tick deltas into the cache through the coordinator, so a reload
//! // in flight defers them instead of losing them.
//! {
//!     let cache = cache.clone();
//!     let coordinator = coordinator.clone();
//!     engine.on_added(move |records| {
//!         for record in records {
//!             let cache = cache.clone();
//!             let record = record.clone();
//!             coordinator.execute_or_enqueue(move || {
//!                 cache.insert_or_update(record);
//!             });
//!         }
//!     });
//! }
//! {
//!     let cache = cache.clone();
//!     let coordinator = coordinator.clone();
//!     engine.on_removed(move |ids| {
//!         for &id in ids {
//!             let cache = cache.clone();
//!             coordinator.execute_or_enqueue(move || {
//!                 cache.remove(&Player { id, name: String::new() });
//!             });
//!         }
//!     });
//! }
//!
//! // The host scheduler calls this once per interval.
//! engine.tick();
//!
//! let ids: Vec<u64> = cache.sorted_items().iter().map(|p| p.id).collect();
//! assert_eq!(ids, vec![1, 2]);
//! ```
//!
//! ## Thread Safety
//!
//! All three components are `Send + Sync` and meant to be shared via `Arc`.
//! [`SortedCache`] serializes everything through one reader-writer lock,
//! [`CacheCoordinator`] keeps its state flag and pending queue under a single
//! mutex, and [`SnapshotDiffEngine`] guards its shadow state with a
//! reader-writer lock so point lookups never race a tick. None of them spawn
//! threads or tasks of their own; ticks come from a host scheduler with the
//! guarantee that a new tick never starts before the previous one returned.
//!
//! ## Failure Behavior
//!
//! Nothing in this crate turns a degenerate operation into a panic: duplicate
//! inserts and absent-item removals report through sentinel return values, a
//! reload requested while one is running is logged and dropped, a malformed
//! slot is skipped for one tick, and a failing reload loader always leaves
//! the coordinator back in its idle state (see [`CacheCoordinator::reload`]
//! for the exact queue semantics in that case).

mod builder;
mod coordinator;
mod diff;
mod metrics;
mod sorted;
mod traits;

pub use builder::SortedCacheBuilder;
pub use coordinator::{CacheCoordinator, ReloadStatus};
pub use diff::{SnapshotDiffEngine, TickDelta};
pub use metrics::{CacheMetrics, CoordinatorMetrics, DiffMetrics};
pub use sorted::SortedCache;
pub use traits::{Comparator, SlotSource};
