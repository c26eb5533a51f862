//! Circuit-breaker wrapper around a ledger store
//!
//! Implements [`LedgerStore`] by delegating to an inner store through one
//! shared [`CircuitBreaker`], so the engine never talks to the store
//! directly. While the circuit is open every operation fails fast with a
//! retryable `Unavailable` error naming the operation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::BreakerConfig;
use crate::error::Result;
use crate::ledger::{LedgerDelta, LedgerStore, PlayerId, PlayerLedger, UpgradeLevels};
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerStats, CircuitState};

pub struct ResilientLedger {
    inner: Arc<dyn LedgerStore>,
    breaker: CircuitBreaker,
}

impl ResilientLedger {
    pub fn new(inner: Arc<dyn LedgerStore>, config: BreakerConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(config),
        }
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.breaker.state().await
    }

    pub fn breaker_stats(&self) -> CircuitBreakerStats {
        self.breaker.stats()
    }
}

#[async_trait]
impl LedgerStore for ResilientLedger {
    async fn get(&self, player: PlayerId) -> Result<Option<PlayerLedger>> {
        self.breaker
            .call("ledger.get", || self.inner.get(player))
            .await
    }

    async fn create(&self, ledger: PlayerLedger) -> Result<PlayerLedger> {
        self.breaker
            .call("ledger.create", || self.inner.create(ledger))
            .await
    }

    async fn apply(&self, player: PlayerId, delta: LedgerDelta) -> Result<PlayerLedger> {
        self.breaker
            .call("ledger.apply", || self.inner.apply(player, delta))
            .await
    }

    async fn upgrade_levels(&self, player: PlayerId) -> Result<UpgradeLevels> {
        self.breaker
            .call("ledger.upgrade_levels", || self.inner.upgrade_levels(player))
            .await
    }

    async fn set_upgrade_level(&self, player: PlayerId, upgrade: &str, level: u32) -> Result<()> {
        self.breaker
            .call("ledger.set_upgrade_level", || {
                self.inner.set_upgrade_level(player, upgrade, level)
            })
            .await
    }
}
