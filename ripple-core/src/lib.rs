//! Ripple Core
//!
//! This crate provides a fine-grained reactive-state runtime. It implements:
//!
//! - Reactive primitives (signals, computeds, effects)
//! - Dynamic dependency discovery and dirty marking
//! - Batched, deferred notification passes
//! - Loop and runaway-update guards
//! - Weakly held subscribers, so torn-down listeners never leak
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `graph`: Per-cell subscriber channels and the deferred scheduler
//! - `config`: Runtime limits
//!
//! # Example
//!
//! ```
//! use ripple_core::reactive::{batch, Computed, Effect, Runtime, Signal};
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let source = count.clone();
//! let doubled = Computed::new(move || source.get() * 2);
//!
//! // Create an effect
//! let (c, d) = (count.clone(), doubled.clone());
//! let _effect = Effect::new(move || {
//!     println!("Count: {}, Doubled: {}", c.get(), d.get());
//! });
//!
//! // Update the signal; the value commits at once
//! count.set(5).unwrap();
//! assert_eq!(doubled.get(), 10);
//!
//! // The effect runs on the next tick, prints: "Count: 5, Doubled: 10"
//! Runtime::tick();
//!
//! // Many writes, one notification pass
//! batch(|| {
//!     count.set(6).unwrap();
//!     count.set(7).unwrap();
//! });
//! Runtime::tick();
//! ```

pub mod config;
pub mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use graph::{CellHandle, CellKind, Reactive};
pub use reactive::{
    batch, computed, effect, lazy_effect, signal, untrack, Computed, Effect, ReactiveError,
    Runtime, Signal,
};
