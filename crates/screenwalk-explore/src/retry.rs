//! Bounded failure counting.
//!
//! Used twice by the exploration state: per element (gesture failures) and per
//! screen (failed attempts to reach it along a planned path). Once a key's
//! failures exceed the threshold it is given up on and stays given up until
//! [`FailureTracker::clear`] is called.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Outcome of reporting one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureVerdict {
    /// Still under the threshold; `attempt` failures so far.
    Retry { attempt: u32 },
    /// This failure crossed the threshold.
    GiveUp { attempts: u32 },
    /// Was already given up on before this report.
    AlreadyAbandoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureTracker<K: Ord> {
    failures: BTreeMap<K, u32>,
    abandoned: BTreeSet<K>,
}

impl<K: Ord> Default for FailureTracker<K> {
    fn default() -> Self {
        Self {
            failures: BTreeMap::new(),
            abandoned: BTreeSet::new(),
        }
    }
}

impl<K: Ord + Clone> FailureTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a failure for `key`; more than `max_failures` gives up.
    pub fn record_failure(&mut self, key: &K, max_failures: u32) -> FailureVerdict {
        if self.abandoned.contains(key) {
            return FailureVerdict::AlreadyAbandoned;
        }
        let count = self.failures.entry(key.clone()).or_insert(0);
        *count += 1;
        if *count > max_failures {
            let attempts = *count;
            self.abandoned.insert(key.clone());
            FailureVerdict::GiveUp { attempts }
        } else {
            FailureVerdict::Retry { attempt: *count }
        }
    }

    /// A success resets the counter but never revives an abandoned key.
    pub fn record_success(&mut self, key: &K) {
        self.failures.remove(key);
    }

    pub fn failures(&self, key: &K) -> u32 {
        self.failures.get(key).copied().unwrap_or(0)
    }

    pub fn is_abandoned(&self, key: &K) -> bool {
        self.abandoned.contains(key)
    }

    pub fn abandoned(&self) -> &BTreeSet<K> {
        &self.abandoned
    }

    /// Number of keys with at least one outstanding failure.
    pub fn tracked_count(&self) -> usize {
        self.failures.len()
    }

    pub fn clear(&mut self) {
        self.failures.clear();
        self.abandoned.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gives_up_past_threshold() {
        let mut tracker: FailureTracker<String> = FailureTracker::new();
        let key = "stuck_button".to_string();
        assert_eq!(tracker.record_failure(&key, 2), FailureVerdict::Retry { attempt: 1 });
        assert_eq!(tracker.record_failure(&key, 2), FailureVerdict::Retry { attempt: 2 });
        assert_eq!(tracker.record_failure(&key, 2), FailureVerdict::GiveUp { attempts: 3 });
        assert!(tracker.is_abandoned(&key));
        assert_eq!(tracker.record_failure(&key, 2), FailureVerdict::AlreadyAbandoned);
    }

    #[test]
    fn test_success_resets_count() {
        let mut tracker: FailureTracker<String> = FailureTracker::new();
        let key = "flaky".to_string();
        tracker.record_failure(&key, 3);
        tracker.record_failure(&key, 3);
        tracker.record_success(&key);
        assert_eq!(tracker.failures(&key), 0);
        assert_eq!(tracker.record_failure(&key, 3), FailureVerdict::Retry { attempt: 1 });
    }

    #[test]
    fn test_zero_threshold_gives_up_immediately() {
        let mut tracker: FailureTracker<u32> = FailureTracker::new();
        assert_eq!(tracker.record_failure(&7, 0), FailureVerdict::GiveUp { attempts: 1 });
    }

    #[test]
    fn test_unknown_key_starts_fresh() {
        let tracker: FailureTracker<String> = FailureTracker::new();
        assert_eq!(tracker.failures(&"unknown".to_string()), 0);
        assert!(!tracker.is_abandoned(&"unknown".to_string()));
    }
}
