//! Claim idempotency guard
//!
//! Prevents a reward key from being granted twice to the same player. The
//! check-then-insert is a single atomic operation on the map entry, so two
//! concurrent requests for the same key cannot both observe "not claimed".
//!
//! Records are never mutated after insertion; they are only pruned once
//! older than the retention window.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::ledger::PlayerId;

type ClaimKey = (PlayerId, String);

/// Keyed atomic check-and-set over `(player, reward_key)`.
#[derive(Default)]
pub struct ClaimGuard {
    claims: DashMap<ClaimKey, DateTime<Utc>>,
}

impl ClaimGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically record the claim if it is the first. Returns `true` on
    /// the first claim, `false` if the key was already claimed.
    pub fn try_claim(&self, player: PlayerId, reward_key: &str) -> bool {
        match self.claims.entry((player, reward_key.to_string())) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                true
            }
        }
    }

    /// Undo a claim whose grant could not be persisted, so the player can
    /// retry. Only the caller that won `try_claim` may release.
    pub fn release(&self, player: PlayerId, reward_key: &str) {
        self.claims.remove(&(player, reward_key.to_string()));
    }

    pub fn claimed_at(&self, player: PlayerId, reward_key: &str) -> Option<DateTime<Utc>> {
        self.claims
            .get(&(player, reward_key.to_string()))
            .map(|entry| *entry.value())
    }

    /// Drop records older than the retention window. Returns how many were
    /// pruned.
    pub fn prune(&self, retention: std::time::Duration) -> usize {
        let Some(cutoff) = ChronoDuration::from_std(retention)
            .ok()
            .and_then(|d| Utc::now().checked_sub_signed(d))
        else {
            // A retention window too large to represent prunes nothing.
            return 0;
        };
        let before = self.claims.len();
        self.claims.retain(|_, claimed_at| *claimed_at > cutoff);
        before - self.claims.len()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_claim_wins_second_rejected() {
        let guard = ClaimGuard::new();
        let player = PlayerId::new();
        assert!(guard.try_claim(player, "task_1"));
        assert!(!guard.try_claim(player, "task_1"));
        // Distinct key and distinct player are unaffected.
        assert!(guard.try_claim(player, "task_2"));
        assert!(guard.try_claim(PlayerId::new(), "task_1"));
    }

    #[test]
    fn release_allows_retry() {
        let guard = ClaimGuard::new();
        let player = PlayerId::new();
        assert!(guard.try_claim(player, "task_1"));
        guard.release(player, "task_1");
        assert!(guard.try_claim(player, "task_1"));
    }

    #[test]
    fn prune_respects_retention() {
        let guard = ClaimGuard::new();
        let player = PlayerId::new();
        guard.try_claim(player, "task_1");
        assert!(guard.claimed_at(player, "task_1").is_some());
        assert_eq!(guard.prune(std::time::Duration::from_secs(3600)), 0);
        assert_eq!(guard.len(), 1);
        assert_eq!(guard.prune(std::time::Duration::ZERO), 1);
        assert!(guard.is_empty());
    }

    #[tokio::test]
    async fn concurrent_claims_grant_exactly_once() {
        let guard = Arc::new(ClaimGuard::new());
        let player = PlayerId::new();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let guard = guard.clone();
            handles.push(tokio::spawn(async move {
                guard.try_claim(player, "task_race")
            }));
        }
        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }
}
