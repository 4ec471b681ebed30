//! Replenishable credit budget.

use std::time::Duration;

use crate::clock::{duration_nanos, Timestamp};

/// A per-key credit balance that accrues `rate` credits for every whole
/// `interval` that elapses.
///
/// The refill anchor only advances by whole intervals, so partial progress
/// toward the next refill carries over between calls.
#[derive(Debug, Clone)]
pub struct CreditAccount {
    balance: u64,
    last_refill: Timestamp,
    rate: u64,
    interval: Duration,
    cap: Option<u64>,
}

impl CreditAccount {
    /// Open an account at `now` holding `initial` credits (clamped to `cap`).
    ///
    /// `interval` must be non-zero; limiter construction validates this.
    pub fn new(
        initial: u64,
        now: Timestamp,
        rate: u64,
        interval: Duration,
        cap: Option<u64>,
    ) -> Self {
        let mut account = Self {
            balance: 0,
            last_refill: now,
            rate,
            interval,
            cap,
        };
        account.balance = account.clamp(initial);
        account
    }

    /// Accrue credits for every whole interval elapsed since the last refill.
    ///
    /// Returns the number of credits actually added after clamping.
    pub fn refill(&mut self, now: Timestamp) -> u64 {
        let Some((intervals, anchor)) = self.elapsed_intervals(now) else {
            return 0;
        };
        self.last_refill = anchor;

        let before = self.balance;
        self.balance = self.clamp(self.balance.saturating_add(intervals.saturating_mul(self.rate)));
        self.balance - before
    }

    /// The balance a refill at `now` would produce, without committing it.
    pub fn projected_balance(&self, now: Timestamp) -> u64 {
        match self.elapsed_intervals(now) {
            Some((intervals, _)) => {
                self.clamp(self.balance.saturating_add(intervals.saturating_mul(self.rate)))
            }
            None => self.balance,
        }
    }

    /// Take `amount` credits if the balance covers it.
    ///
    /// A denied debit leaves the balance untouched.
    pub fn try_debit(&mut self, amount: u64) -> bool {
        if self.balance >= amount {
            self.balance -= amount;
            true
        } else {
            false
        }
    }

    /// Grant `amount` credits outside the refill schedule, clamped to the cap.
    ///
    /// Returns the number of credits actually added.
    pub fn add(&mut self, amount: u64) -> u64 {
        let before = self.balance;
        self.balance = self.clamp(self.balance.saturating_add(amount));
        self.balance - before
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn cap(&self) -> Option<u64> {
        self.cap
    }

    pub fn last_refill(&self) -> Timestamp {
        self.last_refill
    }

    /// Whole intervals between the refill anchor and `now`, plus the anchor
    /// advanced past them. `None` when less than one interval has passed.
    fn elapsed_intervals(&self, now: Timestamp) -> Option<(u64, Timestamp)> {
        let interval = duration_nanos(self.interval);
        if interval == 0 {
            return None;
        }
        let elapsed = now.as_nanos().checked_sub(self.last_refill.as_nanos())?;
        let intervals = elapsed / interval;
        if intervals == 0 {
            return None;
        }
        let anchor = Timestamp::from_nanos(self.last_refill.as_nanos() + intervals * interval);
        Some((intervals, anchor))
    }

    fn clamp(&self, balance: u64) -> u64 {
        match self.cap {
            Some(cap) => balance.min(cap),
            None => balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const FIVE_SECS: Duration = Duration::from_secs(5);

    #[test]
    fn test_refill_adds_whole_intervals_only() {
        let mut account = CreditAccount::new(0, Timestamp::ZERO, 10, FIVE_SECS, None);

        assert_eq!(account.refill(Timestamp::from_secs(4)), 0);
        assert_eq!(account.balance(), 0);

        assert_eq!(account.refill(Timestamp::from_secs(12)), 20);
        assert_eq!(account.balance(), 20);
    }

    #[test]
    fn test_refill_preserves_partial_interval() {
        let mut account = CreditAccount::new(0, Timestamp::ZERO, 1, FIVE_SECS, None);

        account.refill(Timestamp::from_secs(7));
        assert_eq!(account.balance(), 1);
        assert_eq!(account.last_refill(), Timestamp::from_secs(5));

        // The two seconds left over from the first call count toward this one
        account.refill(Timestamp::from_secs(10));
        assert_eq!(account.balance(), 2);
        assert_eq!(account.last_refill(), Timestamp::from_secs(10));
    }

    #[test]
    fn test_refill_twice_at_same_instant_adds_nothing() {
        let mut account = CreditAccount::new(0, Timestamp::ZERO, 3, FIVE_SECS, None);

        account.refill(Timestamp::from_secs(6));
        assert_eq!(account.refill(Timestamp::from_secs(6)), 0);
        assert_eq!(account.balance(), 3);
    }

    #[test]
    fn test_refill_clamps_to_cap() {
        let mut account = CreditAccount::new(0, Timestamp::ZERO, 10, FIVE_SECS, Some(15));

        assert_eq!(account.refill(Timestamp::from_secs(100)), 15);
        assert_eq!(account.balance(), 15);
    }

    #[test]
    fn test_initial_balance_is_clamped() {
        let account = CreditAccount::new(50, Timestamp::ZERO, 1, FIVE_SECS, Some(20));
        assert_eq!(account.balance(), 20);
        assert_eq!(account.cap(), Some(20));
    }

    #[test]
    fn test_try_debit() {
        let mut account = CreditAccount::new(5, Timestamp::ZERO, 0, FIVE_SECS, None);

        assert!(!account.try_debit(6));
        assert_eq!(account.balance(), 5);

        assert!(account.try_debit(5));
        assert_eq!(account.balance(), 0);

        // Zero-amount debit always succeeds
        assert!(account.try_debit(0));
        assert_eq!(account.balance(), 0);
    }

    #[test]
    fn test_add_respects_cap() {
        let mut account = CreditAccount::new(8, Timestamp::ZERO, 0, FIVE_SECS, Some(10));

        assert_eq!(account.add(5), 2);
        assert_eq!(account.balance(), 10);
    }

    #[test]
    fn test_projected_balance_does_not_commit() {
        let account = CreditAccount::new(1, Timestamp::ZERO, 2, FIVE_SECS, None);

        assert_eq!(account.projected_balance(Timestamp::from_secs(11)), 5);
        assert_eq!(account.balance(), 1);
        assert_eq!(account.last_refill(), Timestamp::ZERO);
    }

    #[test]
    fn test_refill_never_decreases_or_exceeds_cap() {
        let mut rng = StdRng::seed_from_u64(7);
        let cap = 40;
        let mut account = CreditAccount::new(0, Timestamp::ZERO, 3, FIVE_SECS, Some(cap));
        let mut now = Timestamp::ZERO;

        for _ in 0..1_000 {
            now = now.saturating_add(Duration::from_millis(rng.gen_range(0..4_000)));
            if rng.gen_bool(0.3) {
                account.try_debit(rng.gen_range(0..10));
            }

            let before = account.balance();
            account.refill(now);
            assert!(account.balance() >= before);
            assert!(account.balance() <= cap);
        }
    }
}
