//! Reactive Runtime
//!
//! The runtime is the per-thread execution context shared by signals,
//! computeds and effects. It owns the configuration, the deferred scheduler
//! that carries notification passes, and answers questions about the
//! current reactive state.
//!
//! # How It Works
//!
//! 1. A write to a signal commits the value immediately and marks dependent
//!    computeds dirty.
//!
//! 2. Unless a batch is open, the write schedules one notification pass on
//!    the installed [`Scheduler`].
//!
//! 3. The host drives the scheduler. With the default [`TickQueue`] that
//!    means calling [`Runtime::tick`] (one frame) or
//!    [`Runtime::run_until_idle`] (until nothing is pending).
//!
//! # Thread Safety
//!
//! All runtime state is thread-local. Cells may be shared across threads,
//! but propagation always happens on the thread that performs the write.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::graph::{self, Scheduler, SchedulerStats, TickQueue};
use crate::reactive::{batch, context};

thread_local! {
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

/// The reactive runtime of the current thread.
pub struct Runtime;

impl Runtime {
    /// Install `config` for this thread.
    pub fn configure(config: RuntimeConfig) {
        CONFIG.with(|current| *current.borrow_mut() = config);
    }

    /// The configuration in effect on this thread.
    pub fn config() -> RuntimeConfig {
        CONFIG.with(|current| current.borrow().clone())
    }

    /// Route deferred work to `scheduler` instead of the tick queue.
    pub fn set_scheduler(scheduler: impl Scheduler + 'static) {
        graph::install(Rc::new(scheduler));
    }

    /// Go back to the default tick queue.
    pub fn reset_scheduler() {
        graph::uninstall();
    }

    /// The default tick queue of this thread.
    pub fn tick_queue() -> Rc<TickQueue> {
        graph::tick_queue()
    }

    /// Run one tick of the default queue. Returns how many tasks ran.
    pub fn tick() -> usize {
        graph::tick_queue().run_tick()
    }

    /// Tick until the default queue is empty, or until the configured tick
    /// bound is reached. Returns the total number of tasks run.
    pub fn run_until_idle() -> usize {
        let queue = graph::tick_queue();
        let max_ticks = Self::config().max_ticks_per_drain();
        let mut total = 0;
        for _ in 0..max_ticks {
            if queue.pending() == 0 {
                break;
            }
            total += queue.run_tick();
        }
        if queue.pending() > 0 {
            tracing::trace!(
                pending = queue.pending(),
                max_ticks,
                "drain stopped at tick bound"
            );
        }
        total
    }

    /// Tasks waiting in the default queue.
    pub fn pending() -> usize {
        graph::tick_queue().pending()
    }

    pub fn stats() -> SchedulerStats {
        graph::tick_queue().stats()
    }

    pub fn reset_stats() {
        graph::tick_queue().reset_stats();
    }

    /// Check if a dependency collector is armed.
    pub fn is_tracking() -> bool {
        context::is_tracking()
    }

    /// Check if reads are currently untracked.
    pub fn is_untracked() -> bool {
        context::is_untrack_enabled()
    }

    /// Check if a batch is open.
    pub fn is_batching() -> bool {
        batch::is_batching()
    }
}
