//! Admission strategies and the limiter policy they run under.
//!
//! A [`Policy`] is fixed when a limiter is built; every key tracked by that
//! limiter follows it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, TollgateError};

/// Which admission mechanisms a limiter combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Sliding-window request count only
    #[default]
    Window,
    /// Credit balance only
    Credit,
    /// Window first, credits as overflow once the window is full
    Hybrid,
}

impl Strategy {
    pub fn uses_window(&self) -> bool {
        matches!(self, Strategy::Window | Strategy::Hybrid)
    }

    pub fn uses_credit(&self) -> bool {
        matches!(self, Strategy::Credit | Strategy::Hybrid)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::Window => "window",
            Strategy::Credit => "credit",
            Strategy::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

/// Parameters shared by every key of one limiter.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub strategy: Strategy,
    /// Requests admitted per window
    pub max_requests: usize,
    /// Length of the sliding window
    pub window: Duration,
    /// Credits accrued per credit interval
    pub credit_rate: u64,
    pub credit_interval: Duration,
    /// Upper bound on a key's balance; `None` is unbounded
    pub credit_cap: Option<u64>,
    /// Balance a key starts with
    pub initial_credits: u64,
    /// Keys idle for longer than this may be swept; `None` keeps them forever
    pub idle_ttl: Option<Duration>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            strategy: Strategy::Window,
            max_requests: 10,
            window: Duration::from_secs(1),
            credit_rate: 0,
            credit_interval: Duration::from_secs(1),
            credit_cap: None,
            initial_credits: 0,
            idle_ttl: None,
        }
    }
}

impl Policy {
    /// Window-only policy admitting `max_requests` per `window`.
    pub fn window(max_requests: usize, window: Duration) -> Self {
        Self {
            strategy: Strategy::Window,
            max_requests,
            window,
            ..Self::default()
        }
    }

    /// Credit-only policy accruing `rate` credits every `interval`.
    pub fn credit(rate: u64, interval: Duration) -> Self {
        Self {
            strategy: Strategy::Credit,
            credit_rate: rate,
            credit_interval: interval,
            ..Self::default()
        }
    }

    /// Window policy that falls back on credits once the window is full.
    pub fn hybrid(max_requests: usize, window: Duration, rate: u64, interval: Duration) -> Self {
        Self {
            strategy: Strategy::Hybrid,
            max_requests,
            window,
            credit_rate: rate,
            credit_interval: interval,
            ..Self::default()
        }
    }

    pub fn with_cap(mut self, cap: u64) -> Self {
        self.credit_cap = Some(cap);
        self
    }

    pub fn with_initial_credits(mut self, credits: u64) -> Self {
        self.initial_credits = credits;
        self
    }

    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = Some(ttl);
        self
    }

    /// Check that the policy can be enforced.
    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(invalid("max_requests must be greater than zero"));
        }
        if self.window.is_zero() {
            return Err(invalid("window must be greater than zero"));
        }
        if self.credit_interval.is_zero() {
            return Err(invalid("credit_interval must be greater than zero"));
        }
        if let Some(cap) = self.credit_cap {
            if self.initial_credits > cap {
                return Err(invalid(format!(
                    "initial_credits ({}) exceeds credit_cap ({})",
                    self.initial_credits, cap
                )));
            }
        }
        if let Some(ttl) = self.idle_ttl {
            if ttl < self.window {
                return Err(invalid(format!(
                    "idle_ttl ({:?}) must be at least the window ({:?})",
                    ttl, self.window
                )));
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> TollgateError {
    TollgateError::InvalidConfiguration(message.into())
}
