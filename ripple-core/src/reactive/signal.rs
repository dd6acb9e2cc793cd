//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! fans changes out to everything that depends on it.
//!
//! # How Signals Work
//!
//! 1. Reading or writing a signal while a dependency collector is armed
//!    records the signal as a dependency of that computation.
//!
//! 2. A write that actually changes the value is committed at once, and the
//!    dirty setters of dependent computeds run synchronously, so a lazy read
//!    right after the write already sees fresh data.
//!
//! 3. The rest of the fan-out (computed recomputes, effects, render
//!    bindings) happens in one notification pass, scheduled on the deferred
//!    scheduler or folded into the open batch.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - The value, behind a `parking_lot::RwLock`
//! - The subscriber channels shared with batches and pending passes
//! - The untracked-update rate window
//! - Write sequence numbers, so a late pass never restores a stale value

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::graph::{self, CellHandle, CellKind, Channels, Reactive, ReactiveNode};
use crate::reactive::batch;
use crate::reactive::context::add_signal;
use crate::reactive::errors::Result;
use crate::reactive::guard::{loop_check, UpdateRate};
use crate::reactive::subscriber::Trigger;
use crate::reactive::tracker::ChangeTracker;

/// A reactive signal holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The type of value stored in the signal. `PartialEq` decides
///   whether a write is a change at all.
///
/// # Example
///
/// ```
/// use ripple_core::reactive::{Effect, Runtime, Signal};
///
/// let count = Signal::new(0);
///
/// let watched = count.clone();
/// let _log = Effect::new(move || println!("count = {}", watched.get()));
///
/// count.set(5).unwrap();
/// assert_eq!(count.get(), 5);
///
/// // The effect runs when the host drives the scheduler
/// Runtime::tick();
/// ```
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

struct SignalInner<T> {
    value: RwLock<T>,
    channels: Arc<Channels>,
    rate: Mutex<UpdateRate>,
    writes: AtomicU64,
    delivered: AtomicU64,
}

impl<T> SignalInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Re-commit the value of write number `write`, unless a newer write
    /// has already been delivered.
    fn deliver(&self, value: T, write: u64) {
        if self.delivered.fetch_max(write, Ordering::SeqCst) < write {
            *self.value.write() = value;
        }
    }

    fn notify(&self) {
        tracing::trace!(cell = ?Arc::as_ptr(&self.channels), "signal notification pass");
        self.channels.notify();
    }

    fn notify_with(&self, value: T, write: u64) {
        self.deliver(value, write);
        self.notify();
    }
}

impl<T> ReactiveNode for SignalInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn kind(&self) -> CellKind {
        CellKind::Signal
    }

    fn channels(&self) -> &Arc<Channels> {
        &self.channels
    }
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                value: RwLock::new(value),
                channels: Channels::new(),
                rate: Mutex::new(UpdateRate::new()),
                writes: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
            }),
        }
    }

    /// Get the current value.
    ///
    /// If called while a computed or effect is collecting dependencies,
    /// this also records the signal as one of them.
    pub fn get(&self) -> T {
        self.track();
        self.get_untracked()
    }

    /// Get a projection of the current value.
    pub fn get_with<R>(&self, selector: impl FnOnce(&T) -> R) -> R {
        let value = self.get();
        selector(&value)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value.
    ///
    /// Writing a value equal to the current one does nothing. Otherwise the
    /// value is committed immediately and a notification pass is scheduled
    /// (or joined to the open batch). Returns the value after the call.
    pub fn set(&self, value: T) -> Result<T> {
        self.track();
        loop_check(&self.inner.channels)?;
        {
            let mut current = self.inner.value.write();
            if *current == value {
                return Ok(current.clone());
            }
            *current = value.clone();
        }
        self.commit(value)
    }

    /// Update the value using a function of the current one.
    pub fn update(&self, updater: impl FnOnce(&T) -> T) -> Result<T> {
        self.track();
        loop_check(&self.inner.channels)?;
        let current = self.get_untracked();
        let value = updater(&current);
        if value == current {
            return Ok(current);
        }
        *self.inner.value.write() = value.clone();
        self.commit(value)
    }

    /// Edit the value in place.
    ///
    /// The value before and after `mutator` is compared by content; an edit
    /// that leaves it equal notifies nobody.
    pub fn mutate(&self, mutator: impl FnOnce(&mut T)) -> Result<T> {
        self.track();
        loop_check(&self.inner.channels)?;

        let mut tracker = ChangeTracker::new();
        let mut working = self.get_untracked();
        tracker.snapshot(&working);
        mutator(&mut working);
        tracker.snapshot(&working);

        let Some(change) = tracker.first_change() else {
            return Ok(working);
        };
        let broadcast = change.next.clone();
        *self.inner.value.write() = working;
        self.commit(broadcast)
    }

    /// Run a full notification pass now, with the current value, whether or
    /// not anything changed.
    pub fn force_update(&self) {
        self.inner.notify();
    }

    /// Run the durable effects only, skipping computeds and render bindings.
    pub fn force_notify_effects(&self) {
        self.inner.channels.fire_effects();
    }

    /// A type-erased handle to this signal.
    pub fn handle(&self) -> CellHandle {
        CellHandle::new(self.node())
    }

    /// Register a render-binding version setter.
    ///
    /// The signal only holds `setter` weakly; the caller keeps it alive.
    pub fn subscribe_version(&self, setter: &Trigger) {
        self.inner.channels.add_version_setter(setter);
    }

    pub fn unsubscribe_version(&self, setter: &Trigger) {
        self.inner.channels.remove_version_setter(setter);
    }

    /// Number of durable effects subscribed to this signal.
    pub fn effect_count(&self) -> usize {
        self.inner.channels.effect_count()
    }

    /// Number of live computeds that recompute when this signal changes.
    pub fn computed_count(&self) -> usize {
        self.inner.channels.computed_count()
    }

    /// Number of live render-binding version setters.
    pub fn version_setter_count(&self) -> usize {
        self.inner.channels.version_setter_count()
    }

    fn node(&self) -> Arc<dyn ReactiveNode> {
        self.inner.clone()
    }

    fn track(&self) {
        add_signal(&self.node());
    }

    /// Shared tail of every committed write.
    fn commit(&self, broadcast: T) -> Result<T> {
        self.inner.channels.fire_dirty_setters();
        self.inner.rate.lock().check()?;

        let write = self.inner.writes.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = self.inner.clone();
        if batch::is_batching() {
            batch::enlist(
                &self.inner.channels,
                Box::new(move || inner.deliver(broadcast, write)),
            );
        } else {
            graph::schedule(Box::new(move || inner.notify_with(broadcast, write)));
        }
        Ok(self.get_untracked())
    }
}

impl<T> Reactive for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn handle(&self) -> CellHandle {
        Signal::handle(self)
    }

    fn kind(&self) -> CellKind {
        CellKind::Signal
    }
}

impl<T> From<&Signal<T>> for CellHandle
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(signal: &Signal<T>) -> Self {
        signal.handle()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("value", &self.get_untracked())
            .field("effect_count", &self.effect_count())
            .finish()
    }
}

/// Create a new signal.
pub fn signal<T>(value: T) -> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Signal::new(value)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
