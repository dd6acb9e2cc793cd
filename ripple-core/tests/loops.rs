//! Loop and Runaway-Update Tests
//!
//! Writes issued from inside a cell's own subscribers are rejected with
//! `ReactiveError::Loop`; cycles laundered through `untrack` are stopped by
//! the untracked-update rate limit.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use ripple_core::config::RuntimeConfig;
use ripple_core::reactive::{untrack, Computed, Effect, ReactiveError, Result, Runtime, Signal};

fn limit_error() -> ReactiveError {
    ReactiveError::TooManyUntrackedUpdates {
        limit: 10,
        window_ms: 1_000,
    }
}

/// The first write from an effect succeeds; the re-entrant one fails.
#[test]
fn loop_in_effect() {
    let s = Signal::new(0);
    let calls = Arc::new(AtomicI32::new(0));
    let error = Arc::new(Mutex::new(None));

    let (s_clone, calls_clone, error_clone) = (s.clone(), calls.clone(), error.clone());
    let _effect = Effect::new(move || {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = s_clone.update(|v| v + 1) {
            *error_clone.lock() = Some(err);
        }
    });
    assert!(error.lock().is_none());

    Runtime::run_until_idle();

    assert_eq!(*error.lock(), Some(ReactiveError::Loop));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(Runtime::stats().scheduled, 1);
    assert_eq!(Runtime::stats().max_pending, 1);
}

#[test]
fn loop_in_computed() {
    let s = Signal::new(0);
    let calls = Arc::new(AtomicI32::new(0));

    let (s_clone, calls_clone) = (s.clone(), calls.clone());
    let c = Computed::new(move || -> Result<i32> {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        s_clone.update(|v| v + 1)?;
        Ok(s_clone.get())
    });
    assert_eq!(c.get(), Ok(1));

    Runtime::run_until_idle();

    assert_eq!(c.get(), Err(ReactiveError::Loop));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(Runtime::stats().scheduled, 1);
}

#[test]
fn untrack_avoids_loop_in_effect() {
    let s = Signal::new(0);
    let calls = Arc::new(AtomicI32::new(0));

    let (s_clone, calls_clone) = (s.clone(), calls.clone());
    let effect = Effect::new(move || {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        untrack(|| s_clone.update(|v| v + 1)).unwrap();
    });
    assert_eq!(effect.dependency_count(), 0);

    Runtime::run_until_idle();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(s.get(), 1);
    assert_eq!(Runtime::stats().scheduled, 1);
}

#[test]
fn untrack_avoids_loop_in_computed() {
    let s = Signal::new(0);
    let calls = Arc::new(AtomicI32::new(0));

    let (s_clone, calls_clone) = (s.clone(), calls.clone());
    let c = Computed::new(move || {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        untrack(|| s_clone.update(|v| v + 1))
    });

    Runtime::run_until_idle();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(c.get(), Ok(1));
}

/// A tracked write keeps the computed subscribed, so both pending passes
/// re-run it.
#[test]
fn tracked_write_before_untracked_write_in_computed() {
    let s = Signal::new(0);
    let calls = Arc::new(AtomicI32::new(0));

    let (s_clone, calls_clone) = (s.clone(), calls.clone());
    let c = Computed::new(move || -> Result<i32> {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        s_clone.update(|v| v + 1)?;
        untrack(|| s_clone.update(|v| v + 1))
    });
    assert_eq!(Runtime::pending(), 2);

    Runtime::run_until_idle();

    assert_eq!(c.get(), Err(ReactiveError::Loop));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(Runtime::stats().max_pending, 2);
}

/// The failing untracked write is the first thing the computed does, so it
/// loses its only dependency and the second pass no longer reaches it.
#[test]
fn untracked_write_before_tracked_write_in_computed() {
    let s = Signal::new(0);
    let calls = Arc::new(AtomicI32::new(0));

    let (s_clone, calls_clone) = (s.clone(), calls.clone());
    let c = Computed::new(move || -> Result<i32> {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        untrack(|| s_clone.update(|v| v + 1))?;
        s_clone.update(|v| v + 1)?;
        Ok(s_clone.get())
    });
    assert_eq!(c.get(), Ok(2));

    Runtime::run_until_idle();

    assert_eq!(c.get(), Err(ReactiveError::Loop));
    assert_eq!(c.dependency_count(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(Runtime::stats().scheduled, 2);
}

/// s1 -> c1 -> untrack(set s2) -> c2 -> set s1: the tracked write back
/// into s1 closes the loop.
#[test]
fn cycle_closed_by_tracked_write() {
    let s1 = Signal::new(0);
    let s2 = Signal::new(0);

    let (s1_clone, s2_clone) = (s1.clone(), s2.clone());
    let _c1 = Computed::new(move || {
        let value = s1_clone.get();
        untrack(|| s2_clone.set(value + 1))
    });

    let (s1_clone, s2_clone) = (s1.clone(), s2.clone());
    let c2 = Computed::new(move || {
        let value = s2_clone.get();
        s1_clone.set(value)
    });

    Runtime::run_until_idle();

    assert_eq!(c2.get(), Err(ReactiveError::Loop));
    assert_eq!(Runtime::pending(), 0);
}

/// s1 -> c1 -> untrack(set s2) -> c2 -> untrack(set s1) -> ...: invisible to
/// the loop check, stopped by the rate limit.
#[test]
fn cycle_through_untrack_hits_rate_limit() {
    let s1 = Signal::new(0);
    let s2 = Signal::new(0);

    let (s1_clone, s2_clone) = (s1.clone(), s2.clone());
    let c1 = Computed::new(move || {
        let value = s1_clone.get();
        untrack(|| s2_clone.set(value + 1))
    });

    let (s1_clone, s2_clone) = (s1.clone(), s2.clone());
    let c2 = Computed::new(move || {
        let value = s2_clone.get();
        untrack(|| s1_clone.set(value + 1))
    });

    Runtime::run_until_idle();
    assert_eq!(Runtime::pending(), 0);

    assert_eq!(c1.get(), Err(limit_error()));
    assert_eq!(c2.get(), Err(limit_error()));
}

#[test]
fn more_than_ten_untracked_writes_fail() {
    let s = Signal::new(0);

    let results: Vec<_> = (1..=11).map(|i| untrack(|| s.set(i))).collect();

    assert!(results[..10].iter().all(|result| result.is_ok()));
    assert_eq!(results[10], Err(limit_error()));
}

#[test]
fn rate_limit_resets_after_window() {
    Runtime::configure(RuntimeConfig::default().with_untracked_window_ms(50));
    let s = Signal::new(0);

    for i in 1..=10 {
        untrack(|| s.set(i)).unwrap();
    }
    assert!(untrack(|| s.set(11)).is_err());

    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(untrack(|| s.set(12)), Ok(12));
}

#[test]
fn tracked_writes_are_not_rate_limited() {
    let s = Signal::new(0);
    for i in 1..=50 {
        assert_eq!(s.set(i), Ok(i));
    }
}

#[test]
fn loop_error_is_not_raised_for_other_cells() {
    let source = Signal::new(0);
    let target = Signal::new(0);
    let results = Arc::new(Mutex::new(Vec::new()));

    let (src, tgt, results_clone) = (source.clone(), target.clone(), results.clone());
    let _effect = Effect::new(move || {
        let value = src.get();
        results_clone.lock().push(untrack(|| tgt.set(value * 10)));
    });

    source.set(1).unwrap();
    Runtime::run_until_idle();

    assert_eq!(*results.lock(), vec![Ok(0), Ok(10)]);
    assert_eq!(target.get(), 10);
}
