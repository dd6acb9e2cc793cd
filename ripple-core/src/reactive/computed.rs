//! Computed Implementation
//!
//! A Computed is a read-only cell whose value is derived from other cells
//! and cached between upstream changes.
//!
//! # How Computeds Work
//!
//! A computed has two recompute paths:
//!
//! 1. **Eager update.** Whenever a dependency runs its notification pass,
//!    the computed re-runs `compute` under an armed collector. This
//!    rediscovers the dependency set (it may be conditional), moves the
//!    computed's registrations onto new dependencies and off dropped ones,
//!    and forwards its effects for the current pass if the value changed.
//!
//! 2. **Lazy recompute.** A write to a dependency synchronously marks the
//!    computed dirty. The next `get()` re-runs `compute` untracked, trusting
//!    the known dependency set, so a read right after a write is never stale.
//!
//! Repeated reads between upstream changes run `compute` zero times.
//!
//! # Propagation
//!
//! A computed forwards everything registered on it (downstream recompute
//! triggers, dirty setters, temporary effects) to the cells it depends on.
//! That way a write to a signal reaches every level of a chain of computeds
//! within one notification pass, dependencies before dependents.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::graph::{CellHandle, CellKind, Channels, Reactive, ReactiveNode};
use crate::reactive::context::{add_signal, untrack, SignalCollector};
use crate::reactive::guard::RunningGuard;
use crate::reactive::subscriber::{SubscriberId, Trigger};
use crate::reactive::tracker::ChangeTracker;

type ComputeFn<T> = dyn Fn() -> T + Send + Sync;

/// A memoized, derived reactive cell.
///
/// # Example
///
/// ```
/// use ripple_core::reactive::{Computed, Runtime, Signal};
///
/// let count = Signal::new(2);
/// let source = count.clone();
/// let doubled = Computed::new(move || source.get() * 2);
/// assert_eq!(doubled.get(), 4);
///
/// count.set(5).unwrap();
/// // Dirty right away; the lazy read recomputes
/// assert_eq!(doubled.get(), 10);
///
/// Runtime::tick();
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T> {
    inner: Arc<ComputedInner<T>>,
}

struct ComputedInner<T> {
    compute: Box<ComputeFn<T>>,

    /// Cells depended on regardless of what `compute` reads.
    watch: Vec<CellHandle>,

    /// `None` only until the first update, which runs during construction.
    value: RwLock<Option<T>>,

    dirty: Arc<AtomicBool>,
    tracker: Mutex<ChangeTracker<Option<T>>>,
    collector: SignalCollector,
    channels: Arc<Channels>,

    /// Registered on dependencies as their computed trigger. Only held
    /// weakly by them, so it lives exactly as long as the computed.
    update_trigger: Trigger,
    dirty_setter: Trigger,
}

impl<T> ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// The eager path: re-run `compute`, rewire dependencies and forward
    /// the change if there was one.
    fn update(&self, force: bool) {
        let _running = RunningGuard::computed(SubscriberId::of(&self.update_trigger));
        self.channels.clear_temporary_effects();
        let mut previous = self.collector.take();

        let before = self.value.read().clone();
        self.tracker.lock().snapshot(&before);
        let value = {
            let _armed = self.collector.arm(&self.watch);
            (self.compute)()
        };
        let after = Some(value);
        self.tracker.lock().snapshot(&after);
        *self.value.write() = after;
        self.dirty.store(false, Ordering::SeqCst);

        let changed = self.tracker.lock().has_changes();
        let downstream_triggers = self.channels.computed_triggers();
        let downstream_setters = self.channels.computed_dirty_setters();
        let effects = if changed {
            self.channels.effects()
        } else {
            Default::default()
        };

        for dependency in self.collector.signals() {
            previous.shift_remove(&SubscriberId::of(&dependency));

            dependency.add_computed(&self.update_trigger);
            for trigger in &downstream_triggers {
                dependency.add_computed(trigger);
            }
            dependency.add_computed_dirty_setter(&self.dirty_setter);
            for setter in &downstream_setters {
                dependency.add_computed_dirty_setter(setter);
            }
            for effect in &effects {
                dependency.add_temporary_effect(effect);
            }
        }

        for dependency in previous.values() {
            dependency.remove_computed(&self.update_trigger);
            for trigger in &downstream_triggers {
                dependency.remove_computed(trigger);
            }
            dependency.remove_computed_dirty_setter(&self.dirty_setter);
            for setter in &downstream_setters {
                dependency.remove_computed_dirty_setter(setter);
            }
        }

        tracing::trace!(
            computed = ?SubscriberId::of(&self.update_trigger),
            changed,
            force,
            dropped = previous.len(),
            "computed updated"
        );

        if !changed {
            self.tracker.lock().clear();
            return;
        }

        if force {
            self.channels.fire_computed_triggers();
            self.channels.fire_effect_union();
            self.channels.clear_temporary_effects();
        }
        self.channels.fire_version_setters();
        self.tracker.lock().clear();
    }

    /// The lazy path: re-run `compute` untracked if a dependency was
    /// written since the last run.
    ///
    /// The observed change stays in the tracker, so the next eager update
    /// still propagates it.
    fn recompute(&self) {
        if !self.dirty.load(Ordering::SeqCst) {
            return;
        }
        let before = self.value.read().clone();
        self.tracker.lock().snapshot(&before);
        let after = Some(untrack(|| (self.compute)()));
        self.tracker.lock().snapshot(&after);
        *self.value.write() = after;
        self.dirty.store(false, Ordering::SeqCst);
    }

    fn current(&self) -> T {
        self.value
            .read()
            .clone()
            .expect("computed is evaluated on construction")
    }
}

impl<T> ReactiveNode for ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn kind(&self) -> CellKind {
        CellKind::Computed
    }

    fn channels(&self) -> &Arc<Channels> {
        &self.channels
    }

    fn add_computed(&self, trigger: &Trigger) {
        self.channels.add_computed(trigger);
        for dependency in self.collector.signals() {
            dependency.add_computed(trigger);
        }
    }

    fn remove_computed(&self, trigger: &Trigger) {
        self.channels.remove_computed(trigger);
        for dependency in self.collector.signals() {
            dependency.remove_computed(trigger);
        }
    }

    fn add_temporary_effect(&self, trigger: &Trigger) {
        self.channels.add_temporary_effect(trigger);
        for dependency in self.collector.signals() {
            dependency.add_temporary_effect(trigger);
        }
    }

    fn add_computed_dirty_setter(&self, setter: &Trigger) {
        self.channels.add_computed_dirty_setter(setter);
        for dependency in self.collector.signals() {
            dependency.add_computed_dirty_setter(setter);
        }
    }

    fn remove_computed_dirty_setter(&self, setter: &Trigger) {
        self.channels.remove_computed_dirty_setter(setter);
        for dependency in self.collector.signals() {
            dependency.remove_computed_dirty_setter(setter);
        }
    }
}

impl<T> Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a computed from `compute`.
    ///
    /// `compute` runs once right away to discover the initial dependencies.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_watch(compute, &[])
    }

    /// Create a computed that also depends on every cell in `watch`, whether
    /// or not `compute` reads them.
    pub fn with_watch<F>(compute: F, watch: &[CellHandle]) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let dirty = Arc::new(AtomicBool::new(false));
        let inner = Arc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let update_trigger: Trigger = Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.update(false);
                }
            });
            let flag = dirty.clone();
            let dirty_setter: Trigger = Arc::new(move || flag.store(true, Ordering::SeqCst));

            ComputedInner {
                compute: Box::new(compute),
                watch: watch.to_vec(),
                value: RwLock::new(None),
                dirty,
                tracker: Mutex::new(ChangeTracker::new()),
                collector: SignalCollector::new(),
                channels: Channels::new(),
                update_trigger,
                dirty_setter,
            }
        });
        inner.update(false);
        Self { inner }
    }

    /// Get the current value, recomputing first if a dependency changed.
    ///
    /// Records the computed as a dependency of the running collector.
    pub fn get(&self) -> T {
        add_signal(&self.node());
        self.get_untracked()
    }

    /// Get a projection of the current value.
    pub fn get_with<R>(&self, selector: impl FnOnce(&T) -> R) -> R {
        let value = self.get();
        selector(&value)
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.recompute();
        self.inner.current()
    }

    /// Recompute now and, if the value changed, run everything that depends
    /// on this computed immediately.
    pub fn force_recompute(&self) {
        self.inner.update(true);
    }

    /// Run the durable effects only.
    pub fn force_notify_effects(&self) {
        self.inner.channels.fire_effects();
    }

    /// Check whether a dependency was written since the last recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Number of cells this computed currently depends on.
    pub fn dependency_count(&self) -> usize {
        self.inner.collector.len()
    }

    pub fn effect_count(&self) -> usize {
        self.inner.channels.effect_count()
    }

    /// A type-erased handle to this computed.
    pub fn handle(&self) -> CellHandle {
        CellHandle::new(self.node())
    }

    fn node(&self) -> Arc<dyn ReactiveNode> {
        self.inner.clone()
    }
}

impl<T> Reactive for Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn handle(&self) -> CellHandle {
        Computed::handle(self)
    }

    fn kind(&self) -> CellKind {
        CellKind::Computed
    }
}

impl<T> From<&Computed<T>> for CellHandle
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(computed: &Computed<T>) -> Self {
        computed.handle()
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("value", &*self.inner.value.read())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

/// Create a new computed.
pub fn computed<T, F>(compute: F) -> Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Computed::new(compute)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
