//! Sliding-window event log.

use std::collections::VecDeque;
use std::time::Duration;

use crate::clock::Timestamp;

/// Tracks admitted event timestamps for one key within a sliding window.
///
/// Entries are kept in chronological order, so expiring old events is a
/// prefix removal. An event whose age equals the window length is still
/// inside the window; it expires once its age is strictly greater.
#[derive(Debug, Clone, Default)]
pub struct WindowCounter {
    events: VecDeque<Timestamp>,
}

impl WindowCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every event older than `interval` as seen from `now`.
    ///
    /// Returns the number of events removed.
    pub fn prune(&mut self, now: Timestamp, interval: Duration) -> usize {
        let mut removed = 0;
        while let Some(&oldest) = self.events.front() {
            if now.saturating_duration_since(oldest) <= interval {
                break;
            }
            self.events.pop_front();
            removed += 1;
        }
        removed
    }

    /// Number of events currently held.
    pub fn count(&self) -> usize {
        self.events.len()
    }

    /// Append an event at `now`.
    ///
    /// Admission must already have been decided by the caller. A timestamp
    /// earlier than the newest entry is recorded at the newest entry's time
    /// to keep the log ordered.
    pub fn record(&mut self, now: Timestamp) {
        let at = match self.events.back() {
            Some(&newest) if newest > now => newest,
            _ => now,
        };
        self.events.push_back(at);
    }

    /// Timestamp of the oldest event still held.
    pub fn oldest(&self) -> Option<Timestamp> {
        self.events.front().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(30);

    #[test]
    fn test_record_and_count() {
        let mut counter = WindowCounter::new();
        assert_eq!(counter.count(), 0);

        counter.record(Timestamp::from_secs(1));
        counter.record(Timestamp::from_secs(2));
        assert_eq!(counter.count(), 2);
        assert_eq!(counter.oldest(), Some(Timestamp::from_secs(1)));
    }

    #[test]
    fn test_prune_removes_only_expired_prefix() {
        let mut counter = WindowCounter::new();
        for secs in [0, 5, 10, 40] {
            counter.record(Timestamp::from_secs(secs));
        }

        let removed = counter.prune(Timestamp::from_secs(38), WINDOW);

        assert_eq!(removed, 2);
        assert_eq!(counter.count(), 2);
        assert_eq!(counter.oldest(), Some(Timestamp::from_secs(10)));
    }

    #[test]
    fn test_event_at_exact_boundary_is_retained() {
        let mut counter = WindowCounter::new();
        counter.record(Timestamp::ZERO);

        counter.prune(Timestamp::from_secs(30), WINDOW);
        assert_eq!(counter.count(), 1);

        counter.prune(Timestamp::from_nanos(30_000_000_001), WINDOW);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_prune_is_idempotent() {
        let mut counter = WindowCounter::new();
        for secs in [0, 10, 20, 30] {
            counter.record(Timestamp::from_secs(secs));
        }
        let now = Timestamp::from_secs(45);

        counter.prune(now, WINDOW);
        let after_first = (counter.count(), counter.oldest());

        assert_eq!(counter.prune(now, WINDOW), 0);
        assert_eq!((counter.count(), counter.oldest()), after_first);
    }

    #[test]
    fn test_record_keeps_entries_ordered() {
        let mut counter = WindowCounter::new();
        counter.record(Timestamp::from_secs(10));
        counter.record(Timestamp::from_secs(9));

        assert_eq!(counter.count(), 2);
        // The late arrival is clamped to 10, so both survive at 40 and expire at 41
        counter.prune(Timestamp::from_secs(40), WINDOW);
        assert_eq!(counter.count(), 2);
        counter.prune(Timestamp::from_secs(41), WINDOW);
        assert_eq!(counter.count(), 0);
    }
}
