use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::{Mutex, RwLock};

use crate::metrics::CoordinatorMetrics;

type PendingOp = Box<dyn FnOnce() + Send>;
type UpdateListener = Box<dyn Fn() + Send + Sync>;

/// Outcome of a reload request that did not fail in the loader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReloadStatus {
	/// The loader ran to completion and the pending queue was drained.
	Completed,
	/// Another reload was already in flight. The request was dropped: the
	/// loader never ran, nothing was queued. Callers decide whether to retry.
	AlreadyInProgress,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
	Idle,
	Resetting,
}

struct Inner {
	state: State,
	/// Mutations deferred while a reload is in flight, replayed FIFO.
	pending: VecDeque<PendingOp>,
}

/// Serialization discipline between full cache reloads and piecemeal
/// mutations.
///
/// A reload replaces the cache's contents wholesale from an authoritative
/// source. A mutation arriving mid-reload means "apply this delta on top of
/// whatever the reload produces", so it must wait for the reload and then
/// replay, in arrival order, rather than race it or get dropped.
///
/// The `Idle`/`Resetting` flag and the pending queue live under one mutex,
/// so the check-and-set on reload entry is atomic: two concurrent reload
/// calls can never both proceed. At most one reload is in flight at a time;
/// the loser is dropped (logged, [`ReloadStatus::AlreadyInProgress`]), not
/// queued and not blocked.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tracker_cache::{CacheCoordinator, SortedCache};
///
/// let cache = Arc::new(SortedCache::new(Box::new(|a: &i32, b: &i32| a.cmp(b))));
/// let coordinator = CacheCoordinator::new();
///
/// // Piecemeal mutation: runs immediately while no reload is in flight.
/// let c = cache.clone();
/// coordinator.execute_or_enqueue(move || {
///     c.insert(42);
/// });
///
/// // Full reload: mutations issued while the loader runs are queued and
/// // replayed afterward.
/// let c = cache.clone();
/// let status = coordinator.reload(move || {
///     // repopulate from the authoritative source
///     c.insert(7);
///     Ok::<(), std::convert::Infallible>(())
/// });
/// assert!(status.is_ok());
/// assert_eq!(cache.sorted_items(), vec![7, 42]);
/// ```
pub struct CacheCoordinator {
	inner: Mutex<Inner>,
	listeners: RwLock<Vec<UpdateListener>>,
	direct_ops: AtomicU64,
	deferred_ops: AtomicU64,
	replayed_ops: AtomicU64,
	reloads: AtomicU64,
	rejected_reloads: AtomicU64,
}

impl CacheCoordinator {
	/// Create a coordinator in the `Idle` state with an empty queue.
	pub fn new() -> Self {
		Self {
			inner: Mutex::new(Inner {
				state: State::Idle,
				pending: VecDeque::new(),
			}),
			listeners: RwLock::new(Vec::new()),
			direct_ops: AtomicU64::new(0),
			deferred_ops: AtomicU64::new(0),
			replayed_ops: AtomicU64::new(0),
			reloads: AtomicU64::new(0),
			rejected_reloads: AtomicU64::new(0),
		}
	}

	/// Run `op` now if no reload is in flight, otherwise queue it for FIFO
	/// replay once the in-flight reload finishes.
	///
	/// When `op` runs directly it runs on the calling thread, outside the
	/// coordinator's lock, so it may itself use the coordinator's cache
	/// freely. An op issued just as a reload begins lands on whichever side
	/// the coordinator observes first; both outcomes are correct.
	pub fn execute_or_enqueue(&self, op: impl FnOnce() + Send + 'static) {
		let mut inner = self.inner.lock();
		match inner.state {
			State::Resetting => {
				inner.pending.push_back(Box::new(op));
				self.deferred_ops.fetch_add(1, AtomicOrdering::Relaxed);
			}
			State::Idle => {
				drop(inner);
				op();
				self.direct_ops.fetch_add(1, AtomicOrdering::Relaxed);
			}
		}
	}

	/// Run a full cache reload, queueing mutations that arrive meanwhile.
	///
	/// If a reload is already in flight this request is dropped: a warning is
	/// logged, `loader` never runs, and `Ok(ReloadStatus::AlreadyInProgress)`
	/// is returned.
	///
	/// Otherwise the coordinator enters `Resetting`, runs `loader`, drains
	/// the pending queue in arrival order (operations enqueued during the
	/// drain join the back and are drained too), returns to `Idle`, and fires
	/// the cache-updated listeners exactly once.
	///
	/// A loader error does not strand the coordinator: the queue still
	/// drains, the state still returns to `Idle`, and the error is handed
	/// back to the caller. Queued operations then ran against whatever
	/// partial state the failed loader left behind; see the crate docs for
	/// why that trade-off is accepted. If the loader panics, the pending
	/// queue is discarded and the state restored before the panic propagates.
	pub fn reload<E>(&self, loader: impl FnOnce() -> Result<(), E>) -> Result<ReloadStatus, E> {
		if !self.begin_reset() {
			return Ok(ReloadStatus::AlreadyInProgress);
		}
		let mut guard = ResetGuard {
			coordinator: self,
			armed: true,
		};
		let result = loader();
		if result.is_err() {
			log::warn!("reload loader failed; draining queued operations against partial cache");
		}
		self.finish_reset();
		guard.armed = false;
		result.map(|_| ReloadStatus::Completed)
	}

	/// Async variant of [`reload`](Self::reload) for loaders that await
	/// (e.g. an I/O-bound repopulation).
	///
	/// The coordinator's lock is never held across an await. Dropping the
	/// returned future mid-loader (task cancellation) discards the pending
	/// queue and restores `Idle`, same as a loader panic; the coordinator
	/// can never be left stuck in `Resetting`. A stalled loader, however,
	/// keeps the coordinator `Resetting` indefinitely: there is no timeout.
	pub async fn reload_async<E, Fut>(
		&self,
		loader: impl FnOnce() -> Fut,
	) -> Result<ReloadStatus, E>
	where
		Fut: Future<Output = Result<(), E>>,
	{
		if !self.begin_reset() {
			return Ok(ReloadStatus::AlreadyInProgress);
		}
		let mut guard = ResetGuard {
			coordinator: self,
			armed: true,
		};
		let result = loader().await;
		if result.is_err() {
			log::warn!("reload loader failed; draining queued operations against partial cache");
		}
		self.finish_reset();
		guard.armed = false;
		result.map(|_| ReloadStatus::Completed)
	}

	/// Register a listener fired once per reload cycle that ran a loader,
	/// after the pending queue has fully drained, never during.
	pub fn on_cache_updated(&self, listener: impl Fn() + Send + Sync + 'static) {
		self.listeners.write().push(Box::new(listener));
	}

	/// Whether a reload is currently in flight.
	pub fn is_resetting(&self) -> bool {
		self.inner.lock().state == State::Resetting
	}

	/// Snapshot of the operation counters.
	pub fn metrics(&self) -> CoordinatorMetrics {
		CoordinatorMetrics {
			direct_ops: self.direct_ops.load(AtomicOrdering::Relaxed),
			deferred_ops: self.deferred_ops.load(AtomicOrdering::Relaxed),
			replayed_ops: self.replayed_ops.load(AtomicOrdering::Relaxed),
			reloads: self.reloads.load(AtomicOrdering::Relaxed),
			rejected_reloads: self.rejected_reloads.load(AtomicOrdering::Relaxed),
		}
	}

	/// Atomic `Idle` -> `Resetting` transition. Returns false (and logs) if
	/// a reload is already in flight.
	fn begin_reset(&self) -> bool {
		let mut inner = self.inner.lock();
		match inner.state {
			State::Resetting => {
				log::warn!("cache reload requested while one is already in flight, dropping");
				self.rejected_reloads.fetch_add(1, AtomicOrdering::Relaxed);
				false
			}
			State::Idle => {
				inner.state = State::Resetting;
				true
			}
		}
	}

	/// Drain the pending queue FIFO, return to `Idle`, notify listeners.
	///
	/// The state stays `Resetting` while ops replay, so mutations issued by
	/// other threads during the drain enqueue behind the ones already
	/// waiting and keep the arrival order intact. Each op runs outside the
	/// lock.
	fn finish_reset(&self) {
		loop {
			let op = {
				let mut inner = self.inner.lock();
				match inner.pending.pop_front() {
					Some(op) => op,
					None => {
						inner.state = State::Idle;
						break;
					}
				}
			};
			op();
			self.replayed_ops.fetch_add(1, AtomicOrdering::Relaxed);
		}
		self.reloads.fetch_add(1, AtomicOrdering::Relaxed);
		for listener in self.listeners.read().iter() {
			listener();
		}
	}
}

impl Default for CacheCoordinator {
	fn default() -> Self {
		Self::new()
	}
}

/// Restores `Idle` if a reload unwinds (loader panic) or its future is
/// dropped before completion. Pending ops cannot safely replay during an
/// unwind, so they are discarded with a warning.
struct ResetGuard<'a> {
	coordinator: &'a CacheCoordinator,
	armed: bool,
}

impl Drop for ResetGuard<'_> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		let mut inner = self.coordinator.inner.lock();
		let discarded = inner.pending.len();
		inner.pending.clear();
		inner.state = State::Idle;
		log::warn!("reload aborted, discarded {discarded} pending operations");
	}
}
