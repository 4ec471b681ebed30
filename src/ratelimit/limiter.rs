//! Core rate limiter implementation.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, trace};

use super::policy::Policy;
use super::state::{Decision, KeyState, Status};
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TollgateError};

/// The rate limiter that owns per-key admission state.
///
/// Keys are opaque, case-sensitive strings. State for a key is created on
/// first use and shared by every caller; different keys never contend for
/// the same lock. This struct is thread-safe and can be shared across tasks.
#[derive(Debug)]
pub struct RateLimiter {
    policy: Policy,
    clock: Arc<dyn Clock>,
    /// Admission state indexed by key
    states: DashMap<String, Arc<KeyState>>,
}

impl RateLimiter {
    /// Create a rate limiter driven by the system clock.
    pub fn new(policy: Policy) -> Result<Self> {
        Self::with_clock(policy, Arc::new(SystemClock::new()))
    }

    /// Create a rate limiter with an injected clock.
    pub fn with_clock(policy: Policy, clock: Arc<dyn Clock>) -> Result<Self> {
        policy.validate()?;
        debug!(
            strategy = %policy.strategy,
            max_requests = policy.max_requests,
            window = ?policy.window,
            credit_rate = policy.credit_rate,
            credit_interval = ?policy.credit_interval,
            "Rate limiter created"
        );
        Ok(Self {
            policy,
            clock,
            states: DashMap::new(),
        })
    }

    /// Check whether a request for `key` is admitted.
    pub fn check(&self, key: &str) -> bool {
        self.decide(key).is_admitted()
    }

    /// Check a request for `key` and report which mechanism admitted it.
    pub fn decide(&self, key: &str) -> Decision {
        let decision = self.state_for(key).decide(&self.policy, self.clock.as_ref());

        trace!(key = %key, decision = ?decision, "Checked rate limit");
        if decision == Decision::Denied {
            debug!(key = %key, "Rate limit exceeded");
        }
        decision
    }

    /// Spend `amount` credits for `key` if its balance covers them.
    pub fn consume(&self, key: &str, amount: u64) -> Result<bool> {
        self.require_credit("consume")?;
        let consumed = self.state_for(key).consume(self.clock.as_ref(), amount)?;
        trace!(key = %key, amount = amount, consumed = consumed, "Consumed credits");
        Ok(consumed)
    }

    /// Grant `amount` credits to `key`, clamped to the policy's cap.
    ///
    /// Returns the number of credits actually added.
    pub fn add_credits(&self, key: &str, amount: u64) -> Result<u64> {
        self.require_credit("add_credits")?;
        let added = self.state_for(key).add_credits(self.clock.as_ref(), amount)?;
        debug!(key = %key, requested = amount, added = added, "Added credits");
        Ok(added)
    }

    /// Snapshot `key`'s balance and window usage.
    ///
    /// A key that has never been seen reports the state it would start
    /// with; no state is created for it.
    pub fn status(&self, key: &str) -> Status {
        let existing = self.states.get(key).map(|entry| Arc::clone(entry.value()));
        match existing {
            Some(state) => state.status(&self.policy, self.clock.as_ref()),
            None => KeyState::new(&self.policy, self.clock.now())
                .status(&self.policy, self.clock.as_ref()),
        }
    }

    /// Remove keys idle for longer than the policy's idle TTL.
    ///
    /// Keys held by an in-flight call are kept, as are keys whose credit
    /// balance is below the starting balance, since recreating them would
    /// refund credits. Returns the number removed; always zero when no TTL
    /// is configured.
    pub fn sweep_idle(&self) -> usize {
        let Some(ttl) = self.policy.idle_ttl else {
            return 0;
        };
        let now = self.clock.now();
        let before = self.states.len();

        // Callers only obtain a state while holding its shard lock, which
        // retain holds exclusively, so a strong count of one means unused.
        self.states.retain(|_, state| {
            Arc::strong_count(state) > 1 || !state.is_evictable(&self.policy, now, ttl)
        });

        let removed = before.saturating_sub(self.states.len());
        if removed > 0 {
            info!(removed = removed, remaining = self.states.len(), "Swept idle keys");
        }
        removed
    }

    /// Get the number of tracked keys.
    pub fn key_count(&self) -> usize {
        self.states.len()
    }

    /// The policy every key follows.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Get or create the state for `key`.
    ///
    /// Concurrent first uses of one key converge on a single state.
    fn state_for(&self, key: &str) -> Arc<KeyState> {
        if let Some(state) = self.states.get(key) {
            return Arc::clone(state.value());
        }

        let entry = self.states.entry(key.to_owned()).or_insert_with(|| {
            debug!(key = %key, strategy = %self.policy.strategy, "Creating new key state");
            Arc::new(KeyState::new(&self.policy, self.clock.now()))
        });
        Arc::clone(entry.value())
    }

    fn require_credit(&self, operation: &str) -> Result<()> {
        if self.policy.strategy.uses_credit() {
            Ok(())
        } else {
            Err(TollgateError::UnsupportedOperation(format!(
                "{} requires a credit-bearing strategy, limiter uses {}",
                operation, self.policy.strategy
            )))
        }
    }
}
