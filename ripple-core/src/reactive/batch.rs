//! Batched writes.
//!
//! Inside [`batch`], a signal write commits its value and marks dependent
//! computeds dirty as usual, but instead of scheduling its own notification
//! pass it enlists the cell in a shared accumulator. When the outermost batch
//! returns, one flush task is scheduled for everything enlisted.
//!
//! The flush is one merged notification pass over all enlisted cells:
//!
//! 1. re-commit the last value each cell was given inside a batch, unless a
//!    newer write to it has already been delivered
//! 2. clear every temporary effect set
//! 3. run the union of computed triggers
//! 4. run the union of durable and temporary effect triggers
//! 5. clear every temporary effect set again
//! 6. run the union of version setters
//!
//! Every subscriber runs at most once per flush, however many enlisted cells
//! reach it. Batches that close before the flush task runs join that flush.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::graph::{self, fire, merge_into, Channels};
use crate::reactive::subscriber::SubscriberId;

/// Re-commits a batched write's value when the flush runs.
pub(crate) type Deliver = Box<dyn FnOnce()>;

struct Enlisted {
    channels: Arc<Channels>,
    deliver: Deliver,
}

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static FLUSH_PENDING: Cell<bool> = const { Cell::new(false) };
    static ENLISTED: RefCell<IndexMap<SubscriberId, Enlisted>> = RefCell::new(IndexMap::new());
}

/// Run `f` with notification passes coalesced into a single deferred flush.
///
/// Nested batches are flat: only the outermost one schedules the flush.
///
/// # Example
///
/// ```
/// use ripple_core::reactive::{batch, Effect, Runtime, Signal};
///
/// let count = Signal::new(0);
/// let watched = count.clone();
/// let effect = Effect::new(move || {
///     watched.get();
/// });
///
/// batch(|| {
///     for i in 1..=5 {
///         count.set(i).unwrap();
///     }
/// });
///
/// assert_eq!(Runtime::pending(), 1);
/// Runtime::tick();
/// assert_eq!(effect.run_count(), 2);
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _guard = BatchGuard::enter();
    f()
}

/// Check if a batch is open on this thread.
pub fn is_batching() -> bool {
    DEPTH.with(Cell::get) > 0
}

/// Add a written cell to the open batch. The cell's latest write replaces
/// any earlier `deliver` it enlisted.
pub(crate) fn enlist(channels: &Arc<Channels>, deliver: Deliver) {
    ENLISTED.with(|enlisted| {
        let mut enlisted = enlisted.borrow_mut();
        match enlisted.entry(SubscriberId::of(channels)) {
            Entry::Occupied(mut entry) => entry.get_mut().deliver = deliver,
            Entry::Vacant(entry) => {
                entry.insert(Enlisted {
                    channels: channels.clone(),
                    deliver,
                });
            }
        }
    });
}

struct BatchGuard;

impl BatchGuard {
    fn enter() -> Self {
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let depth = DEPTH.with(|depth| {
            let remaining = depth.get() - 1;
            depth.set(remaining);
            remaining
        });
        if depth == 0 {
            schedule_flush();
        }
    }
}

fn schedule_flush() {
    let enlisted = ENLISTED.with(|enlisted| !enlisted.borrow().is_empty());
    if !enlisted || FLUSH_PENDING.with(|pending| pending.replace(true)) {
        return;
    }
    graph::schedule(Box::new(flush));
}

fn flush() {
    FLUSH_PENDING.with(|pending| pending.set(false));
    let enlisted = ENLISTED.with(|enlisted| enlisted.take());
    tracing::trace!(cells = enlisted.len(), "flushing batch");

    let mut cells = Vec::with_capacity(enlisted.len());
    for Enlisted { channels, deliver } in enlisted.into_values() {
        deliver();
        cells.push(channels);
    }

    for cell in &cells {
        cell.clear_temporary_effects();
    }

    let mut computed = IndexMap::new();
    for cell in &cells {
        merge_into(&mut computed, cell.computed_triggers());
    }
    fire(computed.into_values());

    let mut effects = IndexMap::new();
    for cell in &cells {
        merge_into(&mut effects, cell.effects());
    }
    for cell in &cells {
        merge_into(&mut effects, cell.temporary_effects());
    }
    fire(effects.into_values());

    for cell in &cells {
        cell.clear_temporary_effects();
    }

    let mut versions = IndexMap::new();
    for cell in &cells {
        merge_into(&mut versions, cell.version_setters());
    }
    fire(versions.into_values());
}
