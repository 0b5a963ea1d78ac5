// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Biblio Contributors

//! Auto-logout timer.
//!
//! Owns exactly one cancellable timer handle. Scheduling a new deadline
//! unconditionally cancels the previous timer first, so a timer tied to a
//! superseded credential can never fire against a newly issued one.
//!
//! Cancellation uses `tokio_util`'s `CancellationToken`, raced against the
//! sleep inside the spawned task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Result of a [`AutoLogoutScheduler::schedule`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The credential carries no expiry claim: no timer; the session
    /// persists until explicit logout or a 401.
    NoExpiry,
    /// The deadline has already passed. No zero-length timer is armed;
    /// the caller must treat the session as expired immediately.
    AlreadyExpired,
    /// A timer is live for the given deadline.
    Armed { deadline: DateTime<Utc> },
}

/// Observable timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Scheduled,
}

struct ArmedTimer {
    token: CancellationToken,
    id: u64,
}

/// Owns the single auto-logout timer.
pub struct AutoLogoutScheduler {
    slot: Arc<Mutex<Option<ArmedTimer>>>,
    next_id: AtomicU64,
}

impl AutoLogoutScheduler {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Cancel any live timer, then arm one for `expiry` if it is in the
    /// future. `on_fire` runs at the deadline unless superseded or
    /// cancelled first.
    ///
    /// Must be called from within a tokio runtime when a timer is armed.
    pub fn schedule<F>(
        &self,
        expiry: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        on_fire: F,
    ) -> ScheduleOutcome
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        let Some(deadline) = expiry else {
            return ScheduleOutcome::NoExpiry;
        };

        let delay = (deadline - now).to_std().unwrap_or(Duration::ZERO);
        if delay.is_zero() {
            return ScheduleOutcome::AlreadyExpired;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        *self.slot.lock().unwrap() = Some(ArmedTimer {
            token: token.clone(),
            id,
        });

        let slot = Arc::clone(&self.slot);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    {
                        let mut slot = slot.lock().unwrap();
                        // Only vacate the slot if it still belongs to us.
                        if slot.as_ref().is_some_and(|armed| armed.id == id) {
                            *slot = None;
                        }
                    }
                    debug!(timer_id = id, "auto-logout timer fired");
                    on_fire();
                }
                _ = token.cancelled() => {
                    debug!(timer_id = id, "auto-logout timer cancelled");
                }
            }
        });

        ScheduleOutcome::Armed { deadline }
    }

    /// Stop the live timer, if any, with no other side effect.
    pub fn cancel(&self) {
        if let Some(armed) = self.slot.lock().unwrap().take() {
            armed.token.cancel();
        }
    }

    pub fn state(&self) -> TimerState {
        if self.slot.lock().unwrap().is_some() {
            TimerState::Scheduled
        } else {
            TimerState::Idle
        }
    }
}

impl Default for AutoLogoutScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use chrono::Duration as ChronoDuration;

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let fire = {
            let count = Arc::clone(&count);
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };
        (count, fire)
    }

    #[test]
    fn no_expiry_arms_nothing() {
        let scheduler = AutoLogoutScheduler::new();
        let (count, fire) = counter();

        let outcome = scheduler.schedule(None, Utc::now(), fire);

        assert_eq!(outcome, ScheduleOutcome::NoExpiry);
        assert_eq!(scheduler.state(), TimerState::Idle);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn past_deadline_arms_nothing() {
        let scheduler = AutoLogoutScheduler::new();
        let now = Utc::now();
        let (count, fire) = counter();

        let outcome = scheduler.schedule(Some(now - ChronoDuration::seconds(10)), now, fire);

        assert_eq!(outcome, ScheduleOutcome::AlreadyExpired);
        assert_eq!(scheduler.state(), TimerState::Idle);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn deadline_exactly_now_arms_nothing() {
        let scheduler = AutoLogoutScheduler::new();
        let now = Utc::now();
        let (_, fire) = counter();

        assert_eq!(
            scheduler.schedule(Some(now), now, fire),
            ScheduleOutcome::AlreadyExpired
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_at_deadline() {
        let scheduler = AutoLogoutScheduler::new();
        let now = Utc::now();
        let (count, fire) = counter();

        let outcome = scheduler.schedule(Some(now + ChronoDuration::seconds(5)), now, fire);
        assert!(matches!(outcome, ScheduleOutcome::Armed { .. }));
        assert_eq!(scheduler.state(), TimerState::Scheduled);

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), TimerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_supersedes_the_previous_timer() {
        let scheduler = AutoLogoutScheduler::new();
        let now = Utc::now();
        let (first_count, first_fire) = counter();
        let (second_count, second_fire) = counter();

        scheduler.schedule(Some(now + ChronoDuration::seconds(5)), now, first_fire);
        scheduler.schedule(Some(now + ChronoDuration::seconds(30)), now, second_fire);

        // Past the first deadline: only the second timer is live.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.state(), TimerState::Scheduled);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_timer_without_firing() {
        let scheduler = AutoLogoutScheduler::new();
        let now = Utc::now();
        let (count, fire) = counter();

        scheduler.schedule(Some(now + ChronoDuration::seconds(5)), now, fire);
        scheduler.cancel();
        assert_eq!(scheduler.state(), TimerState::Idle);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
