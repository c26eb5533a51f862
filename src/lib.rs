//! Tapforge - player resource and reward economy engine for tap games
//!
//! Players accrue LP by tapping, by passive accrual while offline, and by
//! spinning a weighted prize wheel; they spend LP on leveled upgrades that
//! compound their effective stats. This crate is the numeric/state engine
//! that owns LP, energy, upgrade levels and reward outcomes:
//! - ledger: the authoritative per-player record and the atomic-delta store contract
//! - catalog: static upgrade/prize/reward configuration, snapshot-refreshed
//! - economy: stat compilation, tap, passive accrual, purchase saga, wheel, claim guard
//! - resilience: circuit breaker wrapping all ledger store traffic
//!
//! Rendering, chat/AI responses, file storage and authentication live in
//! outer layers and consume this engine through [`EconomyEngine`].

pub mod catalog;
pub mod config;
pub mod economy;
pub mod error;
pub mod ledger;
pub mod resilience;

pub use catalog::{
    CatalogCache, CatalogFile, CatalogSnapshot, CatalogSource, FileCatalogSource, PrizeDef,
    PrizeKind, StaticCatalogSource, UpgradeCategory, UpgradeDef,
};
pub use config::{BreakerConfig, ClaimConfig, EconomyConfig, EngineConfig, WheelConfig};
pub use economy::{
    ClaimGuard, EconomyEngine, EngineEvent, EngineStats, PassiveClaimOutcome, PurchaseOutcome,
    RewardClaimOutcome, SpinAudit, SpinOutcome, TapOutcome, WheelSelector,
};
pub use error::{Error, Result};
pub use ledger::{
    EffectiveStats, LedgerDelta, LedgerStore, MemoryLedgerStore, PlayerId, PlayerLedger,
    UpgradeLevels,
};
pub use resilience::{CircuitBreaker, CircuitState, ResilientLedger};
