//! Deferred Scheduler
//!
//! Notification passes for plain (non-batched) writes never run inline with
//! the write. They are handed to a [`Scheduler`], a "run this later, outside
//! the current call stack" primitive supplied by the host.
//!
//! The default is a per-thread [`TickQueue`]: tasks accumulate until the
//! host drives a tick. A tick runs exactly the tasks that were queued when
//! it started; anything scheduled while it runs waits for the next tick.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Host-provided deferred-call facility.
pub trait Scheduler {
    /// Run `task` once, later, outside the current call stack.
    fn schedule(&self, task: Task);
}

/// Counters describing queue usage since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks handed to the queue.
    pub scheduled: usize,
    /// Largest number of tasks waiting at once.
    pub max_pending: usize,
}

/// The default scheduler: a queue drained one tick at a time.
#[derive(Default)]
pub struct TickQueue {
    queue: RefCell<VecDeque<Task>>,
    stats: Cell<SchedulerStats>,
}

impl TickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the tasks queued before this call. Returns how many ran.
    pub fn run_tick(&self) -> usize {
        let tasks: Vec<Task> = self.queue.borrow_mut().drain(..).collect();
        let ran = tasks.len();
        if ran > 0 {
            tracing::trace!(tasks = ran, "running tick");
        }
        for task in tasks {
            task();
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.get()
    }

    pub fn reset_stats(&self) {
        self.stats.set(SchedulerStats::default());
    }
}

impl Scheduler for TickQueue {
    fn schedule(&self, task: Task) {
        let pending = {
            let mut queue = self.queue.borrow_mut();
            queue.push_back(task);
            queue.len()
        };
        let mut stats = self.stats.get();
        stats.scheduled += 1;
        stats.max_pending = stats.max_pending.max(pending);
        self.stats.set(stats);
    }
}

thread_local! {
    static TICK_QUEUE: Rc<TickQueue> = Rc::new(TickQueue::new());
    static INSTALLED: RefCell<Option<Rc<dyn Scheduler>>> = const { RefCell::new(None) };
}

/// Hand `task` to the scheduler installed on this thread.
pub(crate) fn schedule(task: Task) {
    let installed = INSTALLED.with(|installed| installed.borrow().clone());
    match installed {
        Some(scheduler) => scheduler.schedule(task),
        None => TICK_QUEUE.with(|queue| queue.schedule(task)),
    }
}

/// The thread's default tick queue.
pub(crate) fn tick_queue() -> Rc<TickQueue> {
    TICK_QUEUE.with(Rc::clone)
}

pub(crate) fn install(scheduler: Rc<dyn Scheduler>) {
    INSTALLED.with(|installed| *installed.borrow_mut() = Some(scheduler));
}

pub(crate) fn uninstall() {
    INSTALLED.with(|installed| *installed.borrow_mut() = None);
}

/// Schedules tasks onto the current tokio `LocalSet`.
///
/// Each task becomes its own local task, so it runs on a later poll of the
/// local set and never inline with the write that scheduled it.
#[cfg(feature = "tokio")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[cfg(feature = "tokio")]
impl Scheduler for TokioScheduler {
    fn schedule(&self, task: Task) {
        tokio::task::spawn_local(async move { task() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_wait_for_a_tick() {
        let queue = TickQueue::new();
        let ran = Rc::new(Cell::new(0));

        let ran_clone = ran.clone();
        queue.schedule(Box::new(move || ran_clone.set(ran_clone.get() + 1)));
        assert_eq!(ran.get(), 0);
        assert_eq!(queue.pending(), 1);

        assert_eq!(queue.run_tick(), 1);
        assert_eq!(ran.get(), 1);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn tasks_scheduled_during_a_tick_run_on_the_next() {
        let queue = Rc::new(TickQueue::new());
        let order = Rc::new(RefCell::new(Vec::new()));

        let inner_queue = queue.clone();
        let inner_order = order.clone();
        queue.schedule(Box::new(move || {
            inner_order.borrow_mut().push("first");
            let later = inner_order.clone();
            inner_queue.schedule(Box::new(move || later.borrow_mut().push("second")));
        }));

        assert_eq!(queue.run_tick(), 1);
        assert_eq!(*order.borrow(), vec!["first"]);

        assert_eq!(queue.run_tick(), 1);
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn stats_track_scheduled_and_peak() {
        let queue = TickQueue::new();
        for _ in 0..3 {
            queue.schedule(Box::new(|| {}));
        }
        queue.run_tick();
        queue.schedule(Box::new(|| {}));

        assert_eq!(
            queue.stats(),
            SchedulerStats {
                scheduled: 4,
                max_pending: 3,
            }
        );

        queue.reset_stats();
        assert_eq!(queue.stats(), SchedulerStats::default());
    }

    #[test]
    fn installed_scheduler_receives_tasks() {
        struct Immediate;
        impl Scheduler for Immediate {
            fn schedule(&self, task: Task) {
                task();
            }
        }

        let ran = Rc::new(Cell::new(false));
        install(Rc::new(Immediate));
        let ran_clone = ran.clone();
        schedule(Box::new(move || ran_clone.set(true)));
        uninstall();

        assert!(ran.get());
        assert_eq!(tick_queue().pending(), 0);
    }
}
