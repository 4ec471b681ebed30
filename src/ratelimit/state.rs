//! Per-key admission state.

use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use tracing::trace;

use super::credit::CreditAccount;
use super::policy::Policy;
use super::window::WindowCounter;
use crate::clock::{Clock, Timestamp};
use crate::error::{Result, TollgateError};

/// The mechanism that let a request through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Admission {
    /// A free slot in the sliding window
    Window,
    /// One credit from the key's balance
    Credit,
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admitted(Admission),
    Denied,
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted(_))
    }
}

/// Point-in-time view of a key.
///
/// `balance` is zero for strategies without credits and `window_count` is
/// zero for strategies without a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    pub balance: u64,
    pub window_count: usize,
}

/// Admission state for one key: a window, a credit account, or both, behind
/// one lock.
///
/// Every operation reads the clock while holding the lock, so updates for a
/// key are linearized and its window log stays chronological.
#[derive(Debug)]
pub struct KeyState {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    window: Option<WindowCounter>,
    credit: Option<CreditAccount>,
    last_seen: Timestamp,
}

impl KeyState {
    /// Create the state a key starts with under `policy` at `now`.
    pub fn new(policy: &Policy, now: Timestamp) -> Self {
        let window = policy.strategy.uses_window().then(WindowCounter::new);
        let credit = policy.strategy.uses_credit().then(|| {
            CreditAccount::new(
                policy.initial_credits,
                now,
                policy.credit_rate,
                policy.credit_interval,
                policy.credit_cap,
            )
        });

        Self {
            inner: Mutex::new(Inner {
                window,
                credit,
                last_seen: now,
            }),
        }
    }

    /// Decide whether one request is admitted.
    ///
    /// The window is consulted first; credits are only spent once the
    /// window is full, so a request is charged to exactly one mechanism.
    pub fn decide(&self, policy: &Policy, clock: &dyn Clock) -> Decision {
        let mut inner = self.inner.lock();
        let now = clock.now();
        inner.last_seen = now;

        if let Some(window) = inner.window.as_mut() {
            window.prune(now, policy.window);
            if window.count() < policy.max_requests {
                window.record(now);
                trace!(count = window.count(), "Admitted via window");
                return Decision::Admitted(Admission::Window);
            }
        }

        if let Some(credit) = inner.credit.as_mut() {
            credit.refill(now);
            if credit.try_debit(1) {
                trace!(balance = credit.balance(), "Admitted via credit");
                return Decision::Admitted(Admission::Credit);
            }
        }

        Decision::Denied
    }

    /// Spend `amount` credits if the balance covers them after a refill.
    pub fn consume(&self, clock: &dyn Clock, amount: u64) -> Result<bool> {
        let mut inner = self.inner.lock();
        let now = clock.now();
        inner.last_seen = now;

        let credit = inner.credit.as_mut().ok_or_else(no_credit)?;
        credit.refill(now);
        Ok(credit.try_debit(amount))
    }

    /// Grant `amount` credits outside the refill schedule.
    ///
    /// Returns the number of credits actually added after the cap.
    pub fn add_credits(&self, clock: &dyn Clock, amount: u64) -> Result<u64> {
        let mut inner = self.inner.lock();
        let now = clock.now();
        inner.last_seen = now;

        let credit = inner.credit.as_mut().ok_or_else(no_credit)?;
        credit.refill(now);
        Ok(credit.add(amount))
    }

    /// Snapshot the key as of now.
    ///
    /// Accrued credits are reported without committing the refill.
    pub fn status(&self, policy: &Policy, clock: &dyn Clock) -> Status {
        let mut inner = self.inner.lock();
        let now = clock.now();

        let window_count = match inner.window.as_mut() {
            Some(window) => {
                window.prune(now, policy.window);
                window.count()
            }
            None => 0,
        };
        let balance = inner
            .credit
            .as_ref()
            .map_or(0, |credit| credit.projected_balance(now));

        Status {
            balance,
            window_count,
        }
    }

    /// Time since the key was last checked, consumed from or credited.
    pub fn idle_for(&self, now: Timestamp) -> Duration {
        now.saturating_duration_since(self.inner.lock().last_seen)
    }

    /// Whether dropping this state and later recreating it under `policy`
    /// would be indistinguishable from keeping it.
    ///
    /// Requires the key to be idle for longer than `ttl` and, when it holds
    /// credits, a projected balance no lower than what a fresh key starts
    /// with, so recreation can never grant credits.
    pub fn is_evictable(&self, policy: &Policy, now: Timestamp, ttl: Duration) -> bool {
        let inner = self.inner.lock();
        if now.saturating_duration_since(inner.last_seen) <= ttl {
            return false;
        }
        inner
            .credit
            .as_ref()
            .map_or(true, |credit| credit.projected_balance(now) >= policy.initial_credits)
    }
}

fn no_credit() -> TollgateError {
    TollgateError::UnsupportedOperation("limiter has no credit component".to_string())
}
