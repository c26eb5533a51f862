//! In-memory ledger store
//!
//! Reference [`LedgerStore`] backed by [`dashmap`]. Used by tests and by
//! single-process deployments that persist elsewhere. Delta application
//! locks the player's shard entry for the duration of the mutation, so each
//! apply is atomic per key.
//!
//! Fault injection hooks let tests exercise the compensating-rollback path
//! of the purchase transactor and the circuit breaker without a real
//! network store.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::ledger::{LedgerDelta, LedgerStore, PlayerId, PlayerLedger, UpgradeLevels};

/// Scripted failures for tests.
#[derive(Default)]
pub struct FaultInjector {
    /// Fail the next N `set_upgrade_level` calls.
    fail_level_writes: AtomicU32,
    /// When set, every call fails as if the store were unreachable.
    outage: AtomicBool,
    /// Per-call script for `apply`: each call pops the front entry, `true`
    /// meaning "fail this call". Empty script means no injected failures.
    apply_script: Mutex<Vec<bool>>,
}

impl FaultInjector {
    pub fn fail_next_level_writes(&self, count: u32) {
        self.fail_level_writes.store(count, Ordering::SeqCst);
    }

    pub fn set_outage(&self, outage: bool) {
        self.outage.store(outage, Ordering::SeqCst);
    }

    pub fn script_applies(&self, script: Vec<bool>) {
        *self.apply_script.lock() = script;
    }

    fn check_outage(&self) -> Result<()> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(Error::Store("ledger store unreachable".into()));
        }
        Ok(())
    }

    fn next_apply_fails(&self) -> bool {
        let mut script = self.apply_script.lock();
        if script.is_empty() {
            false
        } else {
            script.remove(0)
        }
    }

    fn take_level_write_fault(&self) -> bool {
        self.fail_level_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// In-memory [`LedgerStore`] implementation.
#[derive(Default)]
pub struct MemoryLedgerStore {
    ledgers: DashMap<PlayerId, PlayerLedger>,
    upgrade_levels: DashMap<PlayerId, UpgradeLevels>,
    faults: FaultInjector,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Direct insert, bypassing `create` semantics. Test setup helper.
    pub fn put(&self, ledger: PlayerLedger) {
        self.ledgers.insert(ledger.id, ledger);
    }

    fn apply_to(ledger: &mut PlayerLedger, delta: &LedgerDelta) -> Result<()> {
        let new_lp = ledger.lp + delta.lp;
        if new_lp < 0.0 {
            return Err(Error::InsufficientLp {
                required: (-delta.lp).ceil() as u64,
                available: ledger.lp.floor() as u64,
            });
        }
        ledger.lp = new_lp;

        if let Some(stats) = delta.set_stats {
            ledger.lp_per_tap = stats.lp_per_tap;
            ledger.lp_per_hour = stats.lp_per_hour;
            ledger.max_energy = stats.max_energy;
        }

        let energy = i64::from(ledger.energy) + delta.energy;
        ledger.energy = energy.clamp(0, i64::from(ledger.max_energy)) as u32;

        if let Some(at) = delta.set_last_passive_claim {
            // Monotonic: a stale timestamp never rewinds the claim clock.
            if ledger.last_passive_claim.map_or(true, |prev| at > prev) {
                ledger.last_passive_claim = Some(at);
            }
        }
        if let Some(at) = delta.set_last_wheel_spin {
            if ledger.last_wheel_spin.map_or(true, |prev| at > prev) {
                ledger.last_wheel_spin = Some(at);
            }
        }
        if let Some(level) = delta.set_level {
            ledger.level = ledger.level.max(level);
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get(&self, player: PlayerId) -> Result<Option<PlayerLedger>> {
        self.faults.check_outage()?;
        Ok(self.ledgers.get(&player).map(|entry| entry.clone()))
    }

    async fn create(&self, ledger: PlayerLedger) -> Result<PlayerLedger> {
        self.faults.check_outage()?;
        Ok(self
            .ledgers
            .entry(ledger.id)
            .or_insert(ledger)
            .value()
            .clone())
    }

    async fn apply(&self, player: PlayerId, delta: LedgerDelta) -> Result<PlayerLedger> {
        self.faults.check_outage()?;
        if self.faults.next_apply_fails() {
            return Err(Error::Store("injected apply failure".into()));
        }
        // The shard entry stays locked while the delta is applied.
        let mut entry = self
            .ledgers
            .get_mut(&player)
            .ok_or(Error::PlayerNotFound(player))?;
        Self::apply_to(entry.value_mut(), &delta)?;
        Ok(entry.clone())
    }

    async fn upgrade_levels(&self, player: PlayerId) -> Result<UpgradeLevels> {
        self.faults.check_outage()?;
        Ok(self
            .upgrade_levels
            .get(&player)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn set_upgrade_level(&self, player: PlayerId, upgrade: &str, level: u32) -> Result<()> {
        self.faults.check_outage()?;
        if self.faults.take_level_write_fault() {
            return Err(Error::Store("injected level write failure".into()));
        }
        self.upgrade_levels
            .entry(player)
            .or_default()
            .insert(upgrade.to_string(), level);
        Ok(())
    }
}
