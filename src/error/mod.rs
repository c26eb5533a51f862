//! Error types and handling for the Tapforge economy engine
//!
//! The taxonomy mirrors how callers are expected to react:
//! - Validation errors (insufficient LP/energy, cooldown, already claimed)
//!   are surfaced with a specific reason and never retried.
//! - Not-found errors (unknown player/upgrade/prize) are surfaced, never retried.
//! - Transient infrastructure errors (store timeout, circuit open) are
//!   retryable with backoff and are the only errors the circuit breaker counts.
//! - Consistency violations (a rollback that itself failed) are fatal and
//!   require external reconciliation.

use std::time::Duration;
use thiserror::Error;

use crate::ledger::PlayerId;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Tapforge error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    #[error("Insufficient energy")]
    InsufficientEnergy,

    #[error("Upgrade not found: {0}")]
    UpgradeNotFound(String),

    #[error("Upgrade {upgrade} already at max level {max_level}")]
    MaxLevelReached { upgrade: String, max_level: u32 },

    #[error("Insufficient LP: need {required}, have {available}")]
    InsufficientLp { required: u64, available: u64 },

    #[error("Upgrade {upgrade} requires player level {required}, player is level {level}")]
    LevelGateNotMet {
        upgrade: String,
        required: u32,
        level: u32,
    },

    #[error("Wheel cooldown active: {}s remaining", remaining.as_secs())]
    CooldownActive { remaining: Duration },

    #[error("No prizes eligible for this player")]
    NoEligiblePrizes,

    #[error("Reward already claimed: {reward_key}")]
    AlreadyClaimed { reward_key: String },

    #[error("Reward not found: {0}")]
    RewardNotFound(String),

    #[error("Ledger store temporarily unavailable: {operation}")]
    Unavailable { operation: String },

    #[error("Ledger store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid catalog: {0}")]
    CatalogInvalid(String),

    #[error("Ledger consistency violation for player {player}: {detail}")]
    ConsistencyViolation { player: PlayerId, detail: String },
}

impl Error {
    /// Whether the caller may retry the same request with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Unavailable { .. } | Error::Store(_) | Error::Io(_)
        )
    }

    /// Whether this error represents a failing store call. Only these count
    /// toward opening the circuit breaker; validation outcomes do not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Io(_))
    }

    /// Fatal errors require external reconciliation and must never be
    /// swallowed or retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ConsistencyViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_split() {
        assert!(Error::Store("timeout".into()).is_retryable());
        assert!(Error::Unavailable {
            operation: "ledger.get".into()
        }
        .is_retryable());
        assert!(!Error::InsufficientEnergy.is_retryable());
        assert!(!Error::RewardNotFound("task_1".into()).is_retryable());
    }

    #[test]
    fn circuit_open_is_not_a_store_failure() {
        // A fast-fail from an open circuit must not feed back into the
        // failure counter of the breaker itself.
        assert!(!Error::Unavailable {
            operation: "ledger.apply".into()
        }
        .is_transient());
        assert!(Error::Store("connection reset".into()).is_transient());
    }

    #[test]
    fn consistency_violation_is_fatal_and_not_retryable() {
        let err = Error::ConsistencyViolation {
            player: PlayerId::new(),
            detail: "rollback failed".into(),
        };
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }
}
