//! Dependency Graph
//!
//! This module holds the plumbing shared by every reactive cell: the
//! per-cell subscriber channels that make up the edges of the dependency
//! graph, and the deferred scheduler that runs notification passes.
//!
//! # Overview
//!
//! The graph is not stored centrally. Each cell owns its outgoing edges in
//! the form of subscriber channels:
//!
//! - computed recompute triggers and dirty setters (weak)
//! - durable effect triggers (strong, released by explicit disposal)
//! - temporary effect triggers, forwarded through a computed for one pass (weak)
//! - version setters for external render bindings (weak)
//!
//! Incoming edges (what a computed or effect depends on) are rediscovered
//! on every run by the dependency collector in [`crate::reactive`].
//!
//! # Design Decisions
//!
//! 1. Edges live with the cell so that a dependent dropped by its owner
//!    disappears from the graph without any central bookkeeping.
//!
//! 2. Subscribers are identified by the address of their shared allocation,
//!    which makes deduplication across cells (batches, effect unions) cheap.

mod node;
mod scheduler;

pub use node::{CellHandle, CellId, CellKind, Reactive};
pub(crate) use node::{fire, merge_into, Channels, ReactiveNode};
pub use scheduler::{Scheduler, SchedulerStats, Task, TickQueue};
pub(crate) use scheduler::{install, schedule, tick_queue, uninstall};

#[cfg(feature = "tokio")]
pub use scheduler::TokioScheduler;
