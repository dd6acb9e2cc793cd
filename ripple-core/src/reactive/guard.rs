//! Loop and runaway-update guards.
//!
//! Two single-slot, thread-local tokens remember which effect trigger and
//! which computed recompute are running right now. A write to a cell whose
//! own subscribers include the running token is a direct synchronous
//! re-entrant write and is rejected with [`ReactiveError::Loop`].
//!
//! Cycles that close through `untrack` are invisible to that check. They are
//! caught by a per-cell rate limit on untracked writes instead.

use std::cell::Cell;
use std::time::{Duration, Instant};

use crate::graph::Channels;
use crate::reactive::errors::{ReactiveError, Result};
use crate::reactive::runtime::Runtime;
use crate::reactive::subscriber::SubscriberId;
use crate::reactive::context::is_untrack_enabled;

thread_local! {
    static RUNNING_EFFECT: Cell<Option<SubscriberId>> = const { Cell::new(None) };
    static RUNNING_COMPUTED: Cell<Option<SubscriberId>> = const { Cell::new(None) };
}

/// Which token a [`RunningGuard`] occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Effect,
    Computed,
}

/// Marks an effect or computed as the one currently running.
///
/// The previous occupant of the slot is restored on drop, so only the
/// innermost run is ever checked.
pub(crate) struct RunningGuard {
    slot: Slot,
    previous: Option<SubscriberId>,
}

impl RunningGuard {
    pub fn effect(id: SubscriberId) -> Self {
        let previous = RUNNING_EFFECT.with(|cell| cell.replace(Some(id)));
        Self {
            slot: Slot::Effect,
            previous,
        }
    }

    pub fn computed(id: SubscriberId) -> Self {
        let previous = RUNNING_COMPUTED.with(|cell| cell.replace(Some(id)));
        Self {
            slot: Slot::Computed,
            previous,
        }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        match self.slot {
            Slot::Effect => RUNNING_EFFECT.with(|cell| cell.set(self.previous)),
            Slot::Computed => RUNNING_COMPUTED.with(|cell| cell.set(self.previous)),
        }
    }
}

pub(crate) fn running_effect() -> Option<SubscriberId> {
    RUNNING_EFFECT.with(Cell::get)
}

pub(crate) fn running_computed() -> Option<SubscriberId> {
    RUNNING_COMPUTED.with(Cell::get)
}

/// Reject a write issued synchronously from one of the cell's own
/// subscribers.
pub(crate) fn loop_check(channels: &Channels) -> Result<()> {
    if let Some(effect) = running_effect() {
        if channels.has_effect(effect) || channels.has_temporary_effect(effect) {
            return Err(ReactiveError::Loop);
        }
    }
    if let Some(computed) = running_computed() {
        if channels.has_computed(computed) {
            return Err(ReactiveError::Loop);
        }
    }
    Ok(())
}

/// Rolling count of untracked writes to one cell. The count resets once
/// the window has elapsed since the last counted write.
#[derive(Debug)]
pub(crate) struct UpdateRate {
    count: u32,
    last_update: Instant,
}

impl UpdateRate {
    pub fn new() -> Self {
        Self {
            count: 0,
            last_update: Instant::now(),
        }
    }

    /// Count an untracked write and fail once the configured limit is
    /// exceeded. Tracked writes are not counted.
    pub fn check(&mut self) -> Result<()> {
        if !is_untrack_enabled() {
            return Ok(());
        }

        let config = Runtime::config();
        let window = Duration::from_millis(config.untracked_window_ms());
        let now = Instant::now();
        if now.duration_since(self.last_update) > window {
            self.count = 0;
        }
        self.last_update = now;

        self.count += 1;
        if self.count > config.max_untracked_updates() {
            return Err(ReactiveError::TooManyUntrackedUpdates {
                limit: config.max_untracked_updates(),
                window_ms: config.untracked_window_ms(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::RuntimeConfig;
    use crate::reactive::context::untrack;
    use crate::reactive::subscriber::Trigger;

    #[test]
    fn running_guards_restore_previous_token() {
        let outer: Trigger = Arc::new(|| {});
        let inner: Trigger = Arc::new(|| {});

        assert_eq!(running_effect(), None);
        {
            let _outer = RunningGuard::effect(SubscriberId::of(&outer));
            {
                let _inner = RunningGuard::effect(SubscriberId::of(&inner));
                assert_eq!(running_effect(), Some(SubscriberId::of(&inner)));
                assert_eq!(running_computed(), None);
            }
            assert_eq!(running_effect(), Some(SubscriberId::of(&outer)));
        }
        assert_eq!(running_effect(), None);
    }

    #[test]
    fn loop_check_flags_running_subscribers_only() {
        let channels = Channels::new();
        let effect: Trigger = Arc::new(|| {});
        let computed: Trigger = Arc::new(|| {});
        let stranger: Trigger = Arc::new(|| {});
        channels.add_effect(&effect);
        channels.add_computed(&computed);

        assert_eq!(loop_check(&channels), Ok(()));

        {
            let _running = RunningGuard::effect(SubscriberId::of(&stranger));
            assert_eq!(loop_check(&channels), Ok(()));
        }
        {
            let _running = RunningGuard::effect(SubscriberId::of(&effect));
            assert_eq!(loop_check(&channels), Err(ReactiveError::Loop));
        }
        {
            let _running = RunningGuard::computed(SubscriberId::of(&computed));
            assert_eq!(loop_check(&channels), Err(ReactiveError::Loop));
        }
    }

    #[test]
    fn temporary_effects_count_for_loop_check() {
        let channels = Channels::new();
        let effect: Trigger = Arc::new(|| {});
        channels.add_temporary_effect(&effect);

        let _running = RunningGuard::effect(SubscriberId::of(&effect));
        assert_eq!(loop_check(&channels), Err(ReactiveError::Loop));
    }

    #[test]
    fn tracked_writes_are_not_rate_limited() {
        let mut rate = UpdateRate::new();
        for _ in 0..100 {
            assert!(rate.check().is_ok());
        }
    }

    #[test]
    fn untracked_writes_trip_after_limit() {
        Runtime::configure(RuntimeConfig::default().with_max_untracked_updates(3));
        let mut rate = UpdateRate::new();

        untrack(|| {
            for _ in 0..3 {
                assert!(rate.check().is_ok());
            }
            assert!(matches!(
                rate.check(),
                Err(ReactiveError::TooManyUntrackedUpdates { limit: 3, .. })
            ));
        });
    }

    #[test]
    fn rate_window_resets_after_gap() {
        Runtime::configure(
            RuntimeConfig::default()
                .with_max_untracked_updates(2)
                .with_untracked_window_ms(20),
        );
        let mut rate = UpdateRate::new();

        untrack(|| {
            assert!(rate.check().is_ok());
            assert!(rate.check().is_ok());
            assert!(rate.check().is_err());

            std::thread::sleep(Duration::from_millis(40));
            assert!(rate.check().is_ok());
        });
    }

    #[test]
    fn steady_writes_keep_the_window_open() {
        Runtime::configure(
            RuntimeConfig::default()
                .with_max_untracked_updates(2)
                .with_untracked_window_ms(200),
        );
        let mut rate = UpdateRate::new();

        // Each gap is shorter than the window, although the total is longer
        untrack(|| {
            assert!(rate.check().is_ok());
            std::thread::sleep(Duration::from_millis(120));
            assert!(rate.check().is_ok());
            std::thread::sleep(Duration::from_millis(120));
            assert!(rate.check().is_err());
        });
    }
}
