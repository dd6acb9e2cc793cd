//! Reactive Context
//!
//! The reactive context records which cells a computation reads. Every cell
//! read (and write) announces itself through [`add_signal`]; each collector
//! that is currently armed receives the announcement and accumulates the
//! cell into its dependency set.
//!
//! # Implementation
//!
//! Armed collectors live in a thread-local registry. A collector is armed for
//! the lifetime of the guard returned by [`SignalCollector::arm`], so nested
//! computations see each other's reads exactly as long as they overlap.
//!
//! [`untrack`] suppresses announcements for the duration of a closure. The
//! suppression is scoped: leaving an inner `untrack` restores whatever the
//! outer scope had.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::graph::{CellHandle, ReactiveNode};
use crate::reactive::subscriber::{SubscriberId, SubscriberList, WeakSubscriberSet};

type DependencySet = Mutex<WeakSubscriberSet<dyn ReactiveNode>>;

thread_local! {
    static ARMED: RefCell<WeakSubscriberSet<DependencySet>> = RefCell::new(WeakSubscriberSet::new());
    static UNTRACKED: Cell<bool> = const { Cell::new(false) };
}

/// Announce a read of `node` to every armed collector.
///
/// Does nothing inside [`untrack`].
pub(crate) fn add_signal(node: &Arc<dyn ReactiveNode>) {
    if is_untrack_enabled() {
        return;
    }
    let armed = ARMED.with(|armed| armed.borrow_mut().to_vec());
    for dependencies in armed {
        dependencies.lock().add(node);
    }
}

/// Check whether reads are currently untracked.
pub fn is_untrack_enabled() -> bool {
    UNTRACKED.with(Cell::get)
}

/// Check whether any collector is armed on this thread.
pub fn is_tracking() -> bool {
    ARMED.with(|armed| !armed.borrow_mut().is_empty())
}

/// Run `f` without recording any cell it reads or writes as a dependency.
///
/// Writes made inside `f` count towards the untracked-update rate limit.
///
/// To read a single cell untracked, use `get_untracked` on the cell itself;
/// it is the same as `untrack(|| cell.get())`.
///
/// # Example
///
/// ```
/// use ripple_core::reactive::{untrack, Effect, Signal};
///
/// let tracked = Signal::new(1);
/// let ignored = Signal::new(2);
///
/// let (t, i) = (tracked.clone(), ignored.clone());
/// let effect = Effect::new(move || {
///     let _ = t.get() + untrack(|| i.get()) + i.get_untracked();
/// });
///
/// assert_eq!(effect.dependency_count(), 1);
/// ```
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _guard = UntrackGuard::enter();
    f()
}

/// Guard that restores the previous untrack state when dropped.
struct UntrackGuard {
    previous: bool,
}

impl UntrackGuard {
    fn enter() -> Self {
        let previous = UNTRACKED.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for UntrackGuard {
    fn drop(&mut self) {
        UNTRACKED.with(|flag| flag.set(self.previous));
    }
}

/// Accumulates the cells read while it is armed.
pub(crate) struct SignalCollector {
    signals: Arc<DependencySet>,
}

impl SignalCollector {
    pub fn new() -> Self {
        Self {
            signals: Arc::new(Mutex::new(WeakSubscriberSet::new())),
        }
    }

    /// Seed the dependency set with an explicit watch list and start
    /// collecting. Collection stops when the returned guard is dropped.
    pub fn arm(&self, watch: &[CellHandle]) -> CollectGuard {
        {
            let mut signals = self.signals.lock();
            for cell in watch {
                signals.add(cell.node());
            }
        }
        ARMED.with(|armed| armed.borrow_mut().add(&self.signals));
        CollectGuard {
            id: SubscriberId::of(&self.signals),
        }
    }

    pub fn add(&self, node: &Arc<dyn ReactiveNode>) {
        self.signals.lock().add(node);
    }

    pub fn delete(&self, node: &Arc<dyn ReactiveNode>) {
        self.signals.lock().delete(node);
    }

    /// The live dependencies, in the order they were first read.
    pub fn signals(&self) -> SubscriberList<dyn ReactiveNode> {
        self.signals.lock().to_vec()
    }

    /// Remove and return every live dependency.
    pub fn take(&self) -> IndexMap<SubscriberId, Arc<dyn ReactiveNode>> {
        self.signals.lock().take()
    }

    pub fn len(&self) -> usize {
        self.signals.lock().len()
    }
}

/// Disarms a [`SignalCollector`] when dropped.
pub(crate) struct CollectGuard {
    id: SubscriberId,
}

impl Drop for CollectGuard {
    fn drop(&mut self) {
        ARMED.with(|armed| armed.borrow_mut().delete_id(self.id));
    }
}
