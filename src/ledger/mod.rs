//! Player ledger contract
//!
//! The ledger is the authoritative per-player record: LP balance, energy,
//! level, cached effective stats and claim timestamps. It is owned by an
//! external record store; the engine treats it as a value fetched from and
//! written back to a [`LedgerStore`].
//!
//! Mutations are expressed exclusively as [`LedgerDelta`] values that the
//! store applies atomically per key. There is no "write this snapshot back"
//! operation, so a stale read can never silently overwrite a concurrent
//! update.

pub mod memory;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

pub use memory::MemoryLedgerStore;

/// Namespace prefix for ids derived from external platform accounts.
const PLATFORM_ID_PREFIX: u64 = 0x7461_7066_6f72_6765; // "tapforge"

/// Opaque player identifier.
///
/// Either a freshly minted UUID or an id derived deterministically from an
/// external platform account (e.g. a Telegram user id), so the same platform
/// account always maps to the same ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive a stable id from an external platform account id.
    pub fn from_platform(raw: u64) -> Self {
        Self(Uuid::from_u64_pair(PLATFORM_ID_PREFIX, raw))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Derived per-player stats: what one tap earns, what one hour of passive
/// accrual earns, and the energy capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectiveStats {
    pub lp_per_tap: u64,
    pub lp_per_hour: u64,
    pub max_energy: u32,
}

/// The authoritative per-player record.
///
/// Invariants enforced by the store when applying deltas:
/// - `lp >= 0` always (a delta that would overdraw is rejected)
/// - `0 <= energy <= max_energy` (energy deltas are clamped)
/// - `last_passive_claim` and `level` only move forward
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerLedger {
    pub id: PlayerId,
    /// Fractional LP is permitted; every grant in this engine is integral,
    /// so sums stay exact.
    pub lp: f64,
    pub energy: u32,
    pub max_energy: u32,
    pub level: u32,
    /// Cached effective stats, refreshed after each purchase. The engine
    /// recompiles stats on every read; these exist for external display.
    pub lp_per_tap: u64,
    pub lp_per_hour: u64,
    pub last_passive_claim: Option<DateTime<Utc>>,
    pub last_wheel_spin: Option<DateTime<Utc>>,
    pub vip: bool,
    pub nsfw_consent: bool,
}

impl PlayerLedger {
    /// Fresh ledger with the configured starting resources.
    pub fn bootstrap(id: PlayerId, lp: f64, energy: u32, max_energy: u32, level: u32) -> Self {
        Self {
            id,
            lp,
            energy: energy.min(max_energy),
            max_energy,
            level,
            lp_per_tap: 1,
            lp_per_hour: 0,
            last_passive_claim: None,
            last_wheel_spin: None,
            vip: false,
            nsfw_consent: false,
        }
    }
}

/// An atomic mutation of one player's ledger.
///
/// Deltas are the only mutation vocabulary the store accepts. `lp` and
/// `energy` are signed adjustments; timestamp and level sets are monotonic
/// (a set that would move a value backwards is ignored).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerDelta {
    pub lp: f64,
    pub energy: i64,
    pub set_last_passive_claim: Option<DateTime<Utc>>,
    pub set_last_wheel_spin: Option<DateTime<Utc>>,
    pub set_stats: Option<EffectiveStats>,
    pub set_level: Option<u32>,
}

impl LedgerDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit_lp(mut self, amount: f64) -> Self {
        self.lp += amount;
        self
    }

    pub fn debit_lp(mut self, amount: f64) -> Self {
        self.lp -= amount;
        self
    }

    pub fn energy(mut self, delta: i64) -> Self {
        self.energy += delta;
        self
    }

    pub fn passive_claimed_at(mut self, at: DateTime<Utc>) -> Self {
        self.set_last_passive_claim = Some(at);
        self
    }

    pub fn wheel_spun_at(mut self, at: DateTime<Utc>) -> Self {
        self.set_last_wheel_spin = Some(at);
        self
    }

    pub fn stats(mut self, stats: EffectiveStats) -> Self {
        self.set_stats = Some(stats);
        self
    }

    pub fn level(mut self, level: u32) -> Self {
        self.set_level = Some(level);
        self
    }

    /// True when applying this delta would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Per-player upgrade levels, keyed by upgrade id.
pub type UpgradeLevels = HashMap<String, u32>;

/// Contract of the external record store.
///
/// Implementations must provide read-after-write consistency per key and
/// apply each [`LedgerDelta`] atomically (no read-then-overwrite window).
/// All engine traffic to a store goes through the circuit breaker wrapper
/// in [`crate::resilience`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fetch a player's ledger, `None` if the player is unknown.
    async fn get(&self, player: PlayerId) -> Result<Option<PlayerLedger>>;

    /// Insert a new ledger. Existing rows are left untouched and returned.
    async fn create(&self, ledger: PlayerLedger) -> Result<PlayerLedger>;

    /// Atomically apply a delta and return the updated ledger.
    ///
    /// Fails with [`crate::error::Error::InsufficientLp`] if the delta would
    /// drive `lp` negative, and [`crate::error::Error::PlayerNotFound`] for
    /// unknown players.
    async fn apply(&self, player: PlayerId, delta: LedgerDelta) -> Result<PlayerLedger>;

    /// All purchased upgrade levels for a player.
    async fn upgrade_levels(&self, player: PlayerId) -> Result<UpgradeLevels>;

    /// Persist one upgrade level for a player.
    async fn set_upgrade_level(&self, player: PlayerId, upgrade: &str, level: u32) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_ids_are_stable() {
        let a = PlayerId::from_platform(123_456_789);
        let b = PlayerId::from_platform(123_456_789);
        let c = PlayerId::from_platform(123_456_790);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn delta_builder_accumulates() {
        let delta = LedgerDelta::new().credit_lp(10.0).debit_lp(4.0).energy(-1);
        assert!((delta.lp - 6.0).abs() < f64::EPSILON);
        assert_eq!(delta.energy, -1);
        assert!(!delta.is_empty());
        assert!(LedgerDelta::new().is_empty());
    }

    #[test]
    fn bootstrap_clamps_energy_to_capacity() {
        let ledger = PlayerLedger::bootstrap(PlayerId::new(), 0.0, 5000, 1000, 1);
        assert_eq!(ledger.energy, 1000);
    }
}
