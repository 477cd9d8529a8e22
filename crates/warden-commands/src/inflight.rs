//! Rejection of overlapping invocations of the same command by the same user.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use warden_common::UserId;

/// Set of `(user, command)` pairs currently executing.
#[derive(Debug, Default)]
pub struct InFlightTracker {
    running: DashMap<(UserId, String), ()>,
}

impl InFlightTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `command` as running for `user_id`.
    ///
    /// Returns `None` when an earlier invocation has not completed yet. The
    /// mark is cleared when the returned guard drops, including on panic.
    pub fn try_acquire(&self, user_id: UserId, command: &str) -> Option<InFlightGuard<'_>> {
        let key = (user_id, command.to_string());
        match self.running.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(InFlightGuard { tracker: self, key })
            }
        }
    }

    /// Whether `command` is running for `user_id`.
    pub fn is_running(&self, user_id: UserId, command: &str) -> bool {
        self.running.contains_key(&(user_id, command.to_string()))
    }
}

/// Clears its in-flight mark on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    tracker: &'a InFlightTracker,
    key: (UserId, String),
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.tracker.running.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected_until_release() {
        let tracker = InFlightTracker::new();

        let guard = tracker.try_acquire(UserId(1), "modstats");
        assert!(guard.is_some());
        assert!(tracker.try_acquire(UserId(1), "modstats").is_none());
        assert!(tracker.try_acquire(UserId(2), "modstats").is_some());

        drop(guard);
        assert!(!tracker.is_running(UserId(1), "modstats"));
        assert!(tracker.try_acquire(UserId(1), "modstats").is_some());
    }
}
