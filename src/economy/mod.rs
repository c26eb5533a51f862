//! Economy engine
//!
//! The facade the outer transport layer (HTTP handlers, bot commands)
//! talks to. Exposes the six action verbs — tap, claim_passive, purchase,
//! spin, claim_reward, effective_stats — plus player registration and
//! maintenance hooks.
//!
//! Every mutation of one player's ledger runs under that player's lock, so
//! concurrent requests for the same player serialize instead of racing the
//! read-modify-write. All store traffic goes through the circuit breaker
//! wrapper; catalogs are immutable snapshots.

pub mod accrual;
pub mod claims;
pub mod purchase;
pub mod stats;
pub mod wheel;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use crate::catalog::{CatalogCache, PrizeDef, PrizeKind};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::ledger::{
    EffectiveStats, LedgerDelta, LedgerStore, PlayerId, PlayerLedger, UpgradeLevels,
};
use crate::resilience::{CircuitState, ResilientLedger};

pub use claims::ClaimGuard;
pub use wheel::WheelSelector;

/// Result of one tap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapOutcome {
    pub lp_gained: u64,
    pub energy_used: u32,
    pub new_lp: f64,
    pub new_energy: u32,
}

/// Result of a passive-accrual claim.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassiveClaimOutcome {
    pub claimed: u64,
    pub new_balance: f64,
    pub minutes_offline: u64,
}

/// Result of an upgrade purchase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PurchaseOutcome {
    pub new_level: u32,
    pub cost_paid: u64,
    pub new_stats: EffectiveStats,
}

/// Result of a wheel spin.
#[derive(Debug, Clone)]
pub struct SpinOutcome {
    pub prize: PrizeDef,
}

/// Result of a one-shot reward claim.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardClaimOutcome {
    pub amount: u64,
    pub new_balance: f64,
}

/// Audit record of one spin outcome.
#[derive(Debug, Clone)]
pub struct SpinAudit {
    pub player: PlayerId,
    pub prize_id: String,
    pub kind: PrizeKind,
    pub amount: u64,
    pub eligible_count: usize,
    pub total_weight: f64,
    pub at: chrono::DateTime<Utc>,
}

/// Engine events, delivered on the event stream for audit trails and
/// external systems (cosmetic prize fulfillment, notifications).
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Tapped {
        player: PlayerId,
        lp_gained: u64,
        new_energy: u32,
    },
    PassiveClaimed {
        player: PlayerId,
        claimed: u64,
        minutes_offline: u64,
    },
    UpgradePurchased {
        player: PlayerId,
        upgrade_id: String,
        new_level: u32,
        cost_paid: u64,
    },
    WheelSpun(SpinAudit),
    RewardClaimed {
        player: PlayerId,
        reward_key: String,
        amount: u64,
    },
}

/// Engine operation counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub taps: u64,
    pub passive_claims: u64,
    pub purchases: u64,
    pub spins: u64,
    pub rewards_claimed: u64,
    pub lp_granted: u64,
    pub lp_spent: u64,
}

#[derive(Default)]
struct EngineCounters {
    taps: AtomicU64,
    passive_claims: AtomicU64,
    purchases: AtomicU64,
    spins: AtomicU64,
    rewards_claimed: AtomicU64,
    lp_granted: AtomicU64,
    lp_spent: AtomicU64,
}

/// The player resource and reward economy engine.
pub struct EconomyEngine {
    config: EngineConfig,
    store: ResilientLedger,
    catalog: Arc<CatalogCache>,
    claims: ClaimGuard,
    wheel: WheelSelector,
    locks: DashMap<PlayerId, Arc<Mutex<()>>>,
    counters: EngineCounters,
    events: mpsc::UnboundedSender<EngineEvent>,
    event_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
}

impl EconomyEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn LedgerStore>,
        catalog: Arc<CatalogCache>,
    ) -> Self {
        let (events, event_rx) = mpsc::unbounded_channel();
        Self {
            store: ResilientLedger::new(store, config.breaker.clone()),
            config,
            catalog,
            claims: ClaimGuard::new(),
            wheel: WheelSelector::new(),
            locks: DashMap::new(),
            counters: EngineCounters::default(),
            events,
            event_rx: parking_lot::Mutex::new(Some(event_rx)),
        }
    }

    /// Replace the wheel's draw stream with a seeded one. Test hook.
    pub fn with_wheel_seed(mut self, seed: u64) -> Self {
        self.wheel = WheelSelector::with_seed(seed);
        self
    }

    /// Take the engine event stream. Yields `Some` exactly once.
    pub fn take_event_stream(&self) -> Option<mpsc::UnboundedReceiver<EngineEvent>> {
        self.event_rx.lock().take()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            taps: self.counters.taps.load(Ordering::Relaxed),
            passive_claims: self.counters.passive_claims.load(Ordering::Relaxed),
            purchases: self.counters.purchases.load(Ordering::Relaxed),
            spins: self.counters.spins.load(Ordering::Relaxed),
            rewards_claimed: self.counters.rewards_claimed.load(Ordering::Relaxed),
            lp_granted: self.counters.lp_granted.load(Ordering::Relaxed),
            lp_spent: self.counters.lp_spent.load(Ordering::Relaxed),
        }
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.store.circuit_state().await
    }

    /// Drop claim records older than the configured retention window.
    pub fn prune_claims(&self) -> usize {
        self.claims.prune(self.config.claims.retention)
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    fn player_lock(&self, player: PlayerId) -> Arc<Mutex<()>> {
        self.locks
            .entry(player)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn ledger_of(&self, player: PlayerId) -> Result<PlayerLedger> {
        self.store
            .get(player)
            .await?
            .ok_or(Error::PlayerNotFound(player))
    }

    fn compile_stats(&self, levels: &UpgradeLevels) -> EffectiveStats {
        stats::compile(
            levels,
            self.catalog.snapshot().upgrades(),
            &self.config.economy,
        )
    }

    /// Ledger bootstrap on first player contact. Idempotent: an existing
    /// ledger is returned untouched.
    pub async fn register_player(&self, player: PlayerId) -> Result<PlayerLedger> {
        let economy = &self.config.economy;
        let compiled = self.compile_stats(&UpgradeLevels::new());
        let mut ledger = PlayerLedger::bootstrap(
            player,
            economy.starting_lp,
            economy.starting_energy,
            compiled.max_energy,
            economy.starting_level,
        );
        ledger.lp_per_tap = compiled.lp_per_tap;
        ledger.lp_per_hour = compiled.lp_per_hour;
        self.store.create(ledger).await
    }

    /// Current effective stats, recompiled from the catalog and the
    /// player's upgrade levels.
    pub async fn effective_stats(&self, player: PlayerId) -> Result<EffectiveStats> {
        self.ledger_of(player).await?;
        let levels = self.store.upgrade_levels(player).await?;
        Ok(self.compile_stats(&levels))
    }

    /// One tap: consume one energy, credit LP-per-tap.
    pub async fn tap(&self, player: PlayerId) -> Result<TapOutcome> {
        let lock = self.player_lock(player);
        let _guard = lock.lock().await;

        let ledger = self.ledger_of(player).await?;
        if ledger.energy == 0 {
            return Err(Error::InsufficientEnergy);
        }
        let levels = self.store.upgrade_levels(player).await?;
        let compiled = self.compile_stats(&levels);

        let updated = self
            .store
            .apply(
                player,
                LedgerDelta::new()
                    .credit_lp(compiled.lp_per_tap as f64)
                    .energy(-1),
            )
            .await?;

        self.counters.taps.fetch_add(1, Ordering::Relaxed);
        self.counters
            .lp_granted
            .fetch_add(compiled.lp_per_tap, Ordering::Relaxed);
        self.emit(EngineEvent::Tapped {
            player,
            lp_gained: compiled.lp_per_tap,
            new_energy: updated.energy,
        });

        Ok(TapOutcome {
            lp_gained: compiled.lp_per_tap,
            energy_used: 1,
            new_lp: updated.lp,
            new_energy: updated.energy,
        })
    }

    /// Claim passive LP accrued since the last claim, capped at the
    /// accrual window. A zero-LP claim succeeds without advancing the
    /// claim timestamp.
    pub async fn claim_passive(&self, player: PlayerId) -> Result<PassiveClaimOutcome> {
        let lock = self.player_lock(player);
        let _guard = lock.lock().await;

        let ledger = self.ledger_of(player).await?;
        let levels = self.store.upgrade_levels(player).await?;
        let compiled = self.compile_stats(&levels);

        let now = Utc::now();
        let quote = accrual::quote(
            ledger.last_passive_claim,
            now,
            compiled.lp_per_hour,
            self.config.economy.accrual_window_minutes,
        );

        if quote.claimed == 0 {
            return Ok(PassiveClaimOutcome {
                claimed: 0,
                new_balance: ledger.lp,
                minutes_offline: quote.minutes_offline,
            });
        }

        let updated = self
            .store
            .apply(
                player,
                LedgerDelta::new()
                    .credit_lp(quote.claimed as f64)
                    .passive_claimed_at(now),
            )
            .await?;

        self.counters.passive_claims.fetch_add(1, Ordering::Relaxed);
        self.counters
            .lp_granted
            .fetch_add(quote.claimed, Ordering::Relaxed);
        self.emit(EngineEvent::PassiveClaimed {
            player,
            claimed: quote.claimed,
            minutes_offline: quote.minutes_offline,
        });

        Ok(PassiveClaimOutcome {
            claimed: quote.claimed,
            new_balance: updated.lp,
            minutes_offline: quote.minutes_offline,
        })
    }

    /// Buy one level of an upgrade.
    ///
    /// Two-step saga: debit LP first, then persist the level. If the level
    /// write fails, the debit is compensated by re-crediting the same
    /// amount; a failed compensation escalates as a fatal
    /// [`Error::ConsistencyViolation`].
    pub async fn purchase(&self, player: PlayerId, upgrade_id: &str) -> Result<PurchaseOutcome> {
        let lock = self.player_lock(player);
        let _guard = lock.lock().await;

        let snapshot = self.catalog.snapshot();
        let def = snapshot
            .upgrade(upgrade_id)
            .ok_or_else(|| Error::UpgradeNotFound(upgrade_id.to_string()))?;

        let ledger = self.ledger_of(player).await?;
        let mut levels = self.store.upgrade_levels(player).await?;
        let current_level = levels.get(upgrade_id).copied().unwrap_or(0);
        let cost = purchase::validate(def, &ledger, current_level)?;
        let new_level = current_level + 1;

        // Step 1: debit.
        self.store
            .apply(player, LedgerDelta::new().debit_lp(cost as f64))
            .await?;

        // Step 2: persist the level; compensate the debit on failure.
        if let Err(level_err) = self
            .store
            .set_upgrade_level(player, upgrade_id, new_level)
            .await
        {
            warn!(
                %player,
                upgrade = upgrade_id,
                error = %level_err,
                "level write failed after debit, rolling back"
            );
            match self
                .store
                .apply(player, LedgerDelta::new().credit_lp(cost as f64))
                .await
            {
                Ok(_) => return Err(level_err),
                Err(rollback_err) => {
                    let violation = Error::ConsistencyViolation {
                        player,
                        detail: format!(
                            "debit of {cost} LP for {upgrade_id} could not be rolled back: \
                             level write failed ({level_err}), rollback failed ({rollback_err})"
                        ),
                    };
                    error!(%player, upgrade = upgrade_id, cost, "{violation}");
                    return Err(violation);
                }
            }
        }

        levels.insert(upgrade_id.to_string(), new_level);
        let new_stats = self.compile_stats(&levels);

        // Refresh the cached stat fields. The cache is derivative (stats
        // are recompiled on every read), so a failed write here must not
        // report the committed purchase as failed.
        if let Err(e) = self
            .store
            .apply(player, LedgerDelta::new().stats(new_stats))
            .await
        {
            warn!(%player, error = %e, "cached stat refresh failed after purchase");
        }

        self.counters.purchases.fetch_add(1, Ordering::Relaxed);
        self.counters.lp_spent.fetch_add(cost, Ordering::Relaxed);
        self.emit(EngineEvent::UpgradePurchased {
            player,
            upgrade_id: upgrade_id.to_string(),
            new_level,
            cost_paid: cost,
        });
        info!(%player, upgrade = upgrade_id, new_level, cost, "upgrade purchased");

        Ok(PurchaseOutcome {
            new_level,
            cost_paid: cost,
            new_stats,
        })
    }

    /// Spin the reward wheel.
    pub async fn spin(&self, player: PlayerId) -> Result<SpinOutcome> {
        let lock = self.player_lock(player);
        let _guard = lock.lock().await;

        let ledger = self.ledger_of(player).await?;

        let now = Utc::now();
        if let Some(last) = ledger.last_wheel_spin {
            let elapsed = (now - last)
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            if elapsed < self.config.wheel.cooldown {
                return Err(Error::CooldownActive {
                    remaining: self.config.wheel.cooldown - elapsed,
                });
            }
        }

        let snapshot = self.catalog.snapshot();
        let eligible = WheelSelector::eligible(snapshot.prizes(), &ledger);
        let total_weight: f64 = eligible.iter().map(|p| p.weight).sum();
        let prize = self.wheel.draw(&eligible)?.clone();

        let mut delta = LedgerDelta::new().wheel_spun_at(now);
        match prize.kind {
            PrizeKind::Currency => {
                delta = delta.credit_lp(prize.amount as f64);
                self.counters
                    .lp_granted
                    .fetch_add(prize.amount, Ordering::Relaxed);
            }
            // Energy credits clamp at max_energy inside the store.
            PrizeKind::Energy => delta = delta.energy(prize.amount as i64),
            // Off-ledger prizes; external systems honor them via the event.
            PrizeKind::Cosmetic | PrizeKind::Other => {}
        }
        self.store.apply(player, delta).await?;

        let audit = SpinAudit {
            player,
            prize_id: prize.id.clone(),
            kind: prize.kind,
            amount: prize.amount,
            eligible_count: eligible.len(),
            total_weight,
            at: now,
        };
        info!(
            %player,
            prize = %audit.prize_id,
            amount = audit.amount,
            eligible = audit.eligible_count,
            "wheel spin resolved"
        );
        self.counters.spins.fetch_add(1, Ordering::Relaxed);
        self.emit(EngineEvent::WheelSpun(audit));

        Ok(SpinOutcome { prize })
    }

    /// Grant a one-shot task/achievement reward exactly once per player.
    pub async fn claim_reward(
        &self,
        player: PlayerId,
        reward_key: &str,
    ) -> Result<RewardClaimOutcome> {
        let lock = self.player_lock(player);
        let _guard = lock.lock().await;

        let amount = self
            .catalog
            .snapshot()
            .reward(reward_key)
            .ok_or_else(|| Error::RewardNotFound(reward_key.to_string()))?;
        self.ledger_of(player).await?;

        if !self.claims.try_claim(player, reward_key) {
            return Err(Error::AlreadyClaimed {
                reward_key: reward_key.to_string(),
            });
        }

        let updated = match self
            .store
            .apply(player, LedgerDelta::new().credit_lp(amount as f64))
            .await
        {
            Ok(ledger) => ledger,
            Err(e) => {
                // The grant never landed; free the key for a retry.
                self.claims.release(player, reward_key);
                return Err(e);
            }
        };

        self.counters.rewards_claimed.fetch_add(1, Ordering::Relaxed);
        self.counters.lp_granted.fetch_add(amount, Ordering::Relaxed);
        self.emit(EngineEvent::RewardClaimed {
            player,
            reward_key: reward_key.to_string(),
            amount,
        });

        Ok(RewardClaimOutcome {
            amount,
            new_balance: updated.lp,
        })
    }
}
