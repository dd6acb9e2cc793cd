//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computeds, and
//! effects, plus the batching and untracking scopes around them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. Reading it inside a computed
//! or effect records it as a dependency; writing a different value notifies
//! every dependent.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. Upstream writes mark
//! it dirty synchronously, and each notification pass recomputes it eagerly
//! so its dependency edges stay accurate. Effects that read a computed only
//! run when its value actually changes.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever a cell it
//! read changes. Effects are used to synchronize reactive state with
//! external systems, such as re-rendering a view or logging.
//!
//! # Implementation Notes
//!
//! Dependencies are discovered automatically: every read announces the cell
//! to whichever dependency collectors are armed on the current thread.
//! Dependency sets are rediscovered on every run, so conditional reads
//! produce conditional edges.
//!
//! Notification passes for plain writes are deferred to the scheduler
//! ([`Runtime::tick`] drives the default one). [`batch`] merges the passes
//! of many writes into one.

mod batch;
mod binding;
mod computed;
mod context;
mod effect;
mod errors;
mod guard;
mod runtime;
mod signal;
mod subscriber;
mod tracker;

pub use batch::{batch, is_batching};
pub use binding::VersionBinding;
pub use computed::{computed, Computed};
pub use context::{is_tracking, is_untrack_enabled, untrack};
pub use effect::{effect, lazy_effect, Effect};
pub use errors::{ReactiveError, Result};
pub use runtime::Runtime;
pub use signal::{signal, Signal};
pub use subscriber::{SubscriberId, SubscriberList, Trigger, TriggerFn, WeakSubscriberSet};
pub use tracker::{Change, ChangeTracker};
