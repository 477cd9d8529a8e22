//! Per-user, per-command cooldowns.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;
use warden_common::UserId;

/// Tracks when each `(user, command)` pair may run again.
///
/// Entries expire lazily: an expired entry is removed the next time it is
/// checked, or by [`cleanup_expired`](Self::cleanup_expired).
#[derive(Debug, Default)]
pub struct CooldownManager {
    expiries: DashMap<(UserId, String), Instant>,
}

impl CooldownManager {
    /// Create a new cooldown manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left before `user_id` may run `command` again, `None` when free.
    pub fn remaining(&self, user_id: UserId, command: &str) -> Option<Duration> {
        let key = (user_id, command.to_string());
        let now = Instant::now();

        let remaining = self
            .expiries
            .get(&key)
            .map(|expiry| expiry.saturating_duration_since(now));
        match remaining {
            Some(left) if !left.is_zero() => Some(left),
            Some(_) => {
                self.expiries.remove_if(&key, |_, expiry| *expiry <= now);
                None
            }
            None => None,
        }
    }

    /// Starts a cooldown window of `duration` for `user_id` on `command`.
    /// A zero duration leaves the command free.
    pub fn start(&self, user_id: UserId, command: &str, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        debug!(%user_id, command, cooldown_ms = duration.as_millis() as u64, "Started cooldown");
        self.expiries
            .insert((user_id, command.to_string()), Instant::now() + duration);
    }

    /// Clear all cooldowns for a specific user
    pub fn clear_user(&self, user_id: UserId) {
        self.expiries.retain(|(uid, _), _| *uid != user_id);
        debug!(%user_id, "Cleared cooldowns");
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.expiries.len();
        self.expiries.retain(|_, expiry| *expiry > now);
        before.saturating_sub(self.expiries.len())
    }

    /// Number of tracked entries, expired or not.
    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_is_per_user_per_command() {
        let cooldowns = CooldownManager::new();
        cooldowns.start(UserId(1), "about", Duration::from_secs(60));

        let left = cooldowns.remaining(UserId(1), "about").unwrap();
        assert!(left > Duration::from_secs(59));
        assert!(cooldowns.remaining(UserId(2), "about").is_none());
        assert!(cooldowns.remaining(UserId(1), "help").is_none());
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cooldowns = CooldownManager::new();
        cooldowns.start(UserId(1), "about", Duration::from_millis(1));
        cooldowns.start(UserId(2), "about", Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(10));

        assert!(cooldowns.remaining(UserId(1), "about").is_none());
        assert_eq!(cooldowns.len(), 1);
        assert_eq!(cooldowns.cleanup_expired(), 0);
    }

    #[test]
    fn test_zero_duration_and_clear() {
        let cooldowns = CooldownManager::new();
        cooldowns.start(UserId(1), "about", Duration::ZERO);
        assert!(cooldowns.is_empty());

        cooldowns.start(UserId(1), "about", Duration::from_secs(5));
        cooldowns.start(UserId(1), "help", Duration::from_secs(5));
        cooldowns.start(UserId(2), "help", Duration::from_secs(5));
        cooldowns.clear_user(UserId(1));
        assert_eq!(cooldowns.len(), 1);
    }
}
