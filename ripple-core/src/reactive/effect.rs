//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a cell it
//! read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. An eager effect runs its handler immediately to establish its initial
//!    dependencies. A lazy effect only subscribes to its watch list and waits
//!    for the first change.
//!
//! 2. Every run rediscovers the dependencies: the handler runs under an
//!    armed collector, the effect subscribes to every cell it read and
//!    unsubscribes from every cell it no longer reads.
//!
//! 3. Cells hold effect triggers strongly. An effect stays subscribed until
//!    it is disposed; dropping the [`Effect`] handle does not stop it.
//!
//! # Differences from Computed
//!
//! - Computeds return a value; effects do not.
//! - Computeds cache results and forward changes; effects just run.

use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crate::graph::{CellHandle, ReactiveNode};
use crate::reactive::context::SignalCollector;
use crate::reactive::guard::RunningGuard;
use crate::reactive::subscriber::{SubscriberId, Trigger, TriggerFn};

/// A side-effecting computation that runs when dependencies change.
///
/// The handle is the effect's disposer. Clones share the same effect.
///
/// # Example
///
/// ```
/// use ripple_core::reactive::{Effect, Runtime, Signal};
///
/// let count = Signal::new(0);
///
/// let watched = count.clone();
/// let effect = Effect::new(move || println!("Count is: {}", watched.get()));
///
/// count.set(5).unwrap();
/// Runtime::tick(); // Prints: "Count is: 5"
///
/// effect.dispose();
/// count.set(6).unwrap();
/// Runtime::tick(); // Prints nothing
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
    trigger: Trigger,
}

struct EffectInner {
    handler: Box<dyn Fn() + Send + Sync>,
    watch: Vec<CellHandle>,
    collector: SignalCollector,

    /// The trigger that runs this effect. It owns the effect, so the effect
    /// only refers back to it weakly.
    trigger: OnceLock<Weak<TriggerFn>>,

    runs: AtomicUsize,
}

impl EffectInner {
    fn trigger(&self) -> Option<Trigger> {
        self.trigger.get().and_then(Weak::upgrade)
    }

    fn run(&self) {
        let Some(trigger) = self.trigger() else {
            return;
        };
        let _running = RunningGuard::effect(SubscriberId::of(&trigger));
        let mut previous = self.collector.take();

        {
            let _armed = self.collector.arm(&self.watch);
            (self.handler)();
        }

        for dependency in self.collector.signals() {
            dependency.add_effect(&trigger);
            previous.shift_remove(&SubscriberId::of(&dependency));
        }
        for dependency in previous.values() {
            dependency.remove_effect(&trigger);
        }

        let runs = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(
            effect = ?SubscriberId::of(&trigger),
            runs,
            dropped = previous.len(),
            "effect ran"
        );
    }
}

impl Effect {
    /// Create an effect and run it immediately.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_watch(handler, &[])
    }

    /// Create an effect that also depends on every cell in `watch`, whether
    /// or not the handler reads them, and run it immediately.
    pub fn with_watch<F>(handler: F, watch: &[CellHandle]) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::create(handler, watch);
        effect.force_trigger();
        effect
    }

    /// Create an effect that first runs when a cell in `watch` changes.
    pub fn new_lazy<F>(handler: F, watch: &[CellHandle]) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::create(handler, watch);
        for cell in watch {
            effect.inner.collector.add(cell.node());
        }
        for dependency in effect.inner.collector.signals() {
            dependency.add_effect(&effect.trigger);
        }
        effect
    }

    fn create<F>(handler: F, watch: &[CellHandle]) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            handler: Box::new(handler),
            watch: watch.to_vec(),
            collector: SignalCollector::new(),
            trigger: OnceLock::new(),
            runs: AtomicUsize::new(0),
        });

        let runner = inner.clone();
        let trigger: Trigger = Arc::new(move || runner.run());
        // Freshly created, so the slot is empty
        let _ = inner.trigger.set(Arc::downgrade(&trigger));

        Self { inner, trigger }
    }

    /// Unsubscribe from every cell the effect currently depends on.
    ///
    /// A run already in progress is not interrupted. A later
    /// [`force_trigger`](Self::force_trigger) subscribes again.
    pub fn dispose(&self) {
        let dependencies = self.inner.collector.take();
        for dependency in dependencies.values() {
            dependency.remove_effect(&self.trigger);
        }
        tracing::trace!(
            effect = ?self.id(),
            detached = dependencies.len(),
            "effect disposed"
        );
    }

    /// Unsubscribe from the given cells only.
    ///
    /// If a later run reads one of them again, the effect subscribes to it
    /// again.
    pub fn dispose_cells(&self, cells: &[CellHandle]) {
        for cell in cells {
            self.inner.collector.delete(cell.node());
            cell.node().remove_effect(&self.trigger);
        }
    }

    /// Run the effect now, whether or not anything changed.
    pub fn force_trigger(&self) {
        (self.trigger)();
    }

    /// Number of times the handler has run.
    pub fn run_count(&self) -> usize {
        self.inner.runs.load(Ordering::SeqCst)
    }

    /// Number of cells the effect is currently subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.inner.collector.len()
    }

    pub fn id(&self) -> SubscriberId {
        SubscriberId::of(&self.trigger)
    }
}

impl Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Create an effect and run it immediately.
pub fn effect<F>(handler: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(handler)
}

/// Create an effect that waits for a change to one of `watch`.
pub fn lazy_effect<F>(handler: F, watch: &[CellHandle]) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new_lazy(handler, watch)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
