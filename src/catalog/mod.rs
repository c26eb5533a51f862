//! Static game catalogs
//!
//! Upgrade definitions, wheel prizes and one-shot task rewards are
//! configuration: loaded at startup, validated once, immutable for the
//! lifetime of a snapshot. A [`CatalogCache`] holds the current snapshot
//! behind an [`arc_swap::ArcSwap`] so readers never block and a refresh
//! swaps the whole snapshot at once.
//!
//! `category` is a required closed enum. Entries that omit it, or carry
//! out-of-range numeric fields, are rejected at load time rather than
//! guessed at runtime.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Which effective stat an upgrade feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeCategory {
    /// Adds to LP earned per tap.
    Tap,
    /// Adds to LP accrued per hour offline.
    Passive,
    /// Adds to maximum energy.
    Energy,
}

/// One entry of the static upgrade catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeDef {
    pub id: String,
    pub category: UpgradeCategory,
    pub base_cost: u64,
    /// Compounding factor on cost per owned level. Must be >= 1.
    pub cost_multiplier: f64,
    pub base_effect: u64,
    pub effect_multiplier: f64,
    pub max_level: u32,
    /// Player level required before this upgrade is purchasable.
    #[serde(default)]
    pub min_player_level: u32,
}

impl UpgradeDef {
    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::CatalogInvalid("upgrade with empty id".into()));
        }
        if !self.cost_multiplier.is_finite() || self.cost_multiplier < 1.0 {
            return Err(Error::CatalogInvalid(format!(
                "upgrade {}: cost_multiplier {} must be finite and >= 1",
                self.id, self.cost_multiplier
            )));
        }
        if !self.effect_multiplier.is_finite() || self.effect_multiplier < 0.0 {
            return Err(Error::CatalogInvalid(format!(
                "upgrade {}: effect_multiplier {} must be finite and >= 0",
                self.id, self.effect_multiplier
            )));
        }
        Ok(())
    }
}

/// What a wheel prize grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrizeKind {
    /// LP credit.
    Currency,
    /// Energy credit, clamped at max energy.
    Energy,
    /// Cosmetic unlock; no ledger effect, honored by external systems.
    Cosmetic,
    /// Anything else external systems grant off-ledger.
    Other,
}

/// One wheel catalog entry. Catalog order is the deterministic walk order
/// of the weighted draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrizeDef {
    pub id: String,
    pub kind: PrizeKind,
    pub amount: u64,
    pub weight: f64,
    #[serde(default)]
    pub vip_only: bool,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub min_level: u32,
    #[serde(default)]
    pub label: String,
}

impl PrizeDef {
    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::CatalogInvalid("prize with empty id".into()));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(Error::CatalogInvalid(format!(
                "prize {}: weight {} must be finite and >= 0",
                self.id, self.weight
            )));
        }
        Ok(())
    }
}

/// Serde shape of a catalog file (TOML or JSON).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub upgrades: Vec<UpgradeDef>,
    #[serde(default)]
    pub prizes: Vec<PrizeDef>,
    /// One-shot task/achievement rewards: reward key -> LP amount.
    #[serde(default)]
    pub rewards: HashMap<String, u64>,
}

/// A validated, immutable view of all catalogs.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    upgrades: Vec<UpgradeDef>,
    upgrade_index: HashMap<String, usize>,
    prizes: Vec<PrizeDef>,
    rewards: HashMap<String, u64>,
}

impl CatalogSnapshot {
    pub fn new(
        upgrades: Vec<UpgradeDef>,
        prizes: Vec<PrizeDef>,
        rewards: HashMap<String, u64>,
    ) -> Result<Self> {
        let mut upgrade_index = HashMap::with_capacity(upgrades.len());
        for (i, def) in upgrades.iter().enumerate() {
            def.validate()?;
            if upgrade_index.insert(def.id.clone(), i).is_some() {
                return Err(Error::CatalogInvalid(format!(
                    "duplicate upgrade id: {}",
                    def.id
                )));
            }
        }
        for prize in &prizes {
            prize.validate()?;
        }
        Ok(Self {
            upgrades,
            upgrade_index,
            prizes,
            rewards,
        })
    }

    pub fn from_file(file: CatalogFile) -> Result<Self> {
        Self::new(file.upgrades, file.prizes, file.rewards)
    }

    pub fn upgrades(&self) -> &[UpgradeDef] {
        &self.upgrades
    }

    pub fn upgrade(&self, id: &str) -> Option<&UpgradeDef> {
        self.upgrade_index.get(id).map(|&i| &self.upgrades[i])
    }

    pub fn prizes(&self) -> &[PrizeDef] {
        &self.prizes
    }

    /// LP amount of a one-shot task reward.
    pub fn reward(&self, key: &str) -> Option<u64> {
        self.rewards.get(key).copied()
    }
}

/// Source of catalog snapshots, refreshed at a configurable interval.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load(&self) -> Result<CatalogSnapshot>;
}

/// Catalog source backed by a file on disk (TOML, or JSON for a `.json`
/// extension). Re-reads the file on every `load`, so edits are picked up
/// by the next refresh tick.
pub struct FileCatalogSource {
    path: std::path::PathBuf,
}

impl FileCatalogSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    async fn load(&self) -> Result<CatalogSnapshot> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let is_json = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let file: CatalogFile = if is_json {
            serde_json::from_str(&raw).map_err(|e| Error::CatalogInvalid(e.to_string()))?
        } else {
            toml::from_str(&raw).map_err(|e| Error::CatalogInvalid(e.to_string()))?
        };
        CatalogSnapshot::from_file(file)
    }
}

/// Fixed in-memory source; used by tests and embedded deployments.
pub struct StaticCatalogSource {
    file: CatalogFile,
}

impl StaticCatalogSource {
    pub fn new(file: CatalogFile) -> Self {
        Self { file }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn load(&self) -> Result<CatalogSnapshot> {
        CatalogSnapshot::from_file(self.file.clone())
    }
}

/// Holds the current catalog snapshot and refreshes it from its source.
pub struct CatalogCache {
    source: Arc<dyn CatalogSource>,
    current: ArcSwap<CatalogSnapshot>,
    refresh_interval: Duration,
}

impl CatalogCache {
    /// Load the initial snapshot from the source.
    pub async fn load(source: Arc<dyn CatalogSource>, refresh_interval: Duration) -> Result<Self> {
        let initial = source.load().await?;
        debug!(
            upgrades = initial.upgrades.len(),
            prizes = initial.prizes.len(),
            rewards = initial.rewards.len(),
            "catalog loaded"
        );
        Ok(Self {
            source,
            current: ArcSwap::from_pointee(initial),
            refresh_interval,
        })
    }

    /// Current snapshot. Cheap; never blocks writers or readers.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current.load_full()
    }

    /// Reload from the source and swap the snapshot in. A failing reload
    /// keeps the previous snapshot.
    pub async fn refresh(&self) -> Result<()> {
        match self.source.load().await {
            Ok(next) => {
                self.current.store(Arc::new(next));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "catalog refresh failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Refresh loop; run as a background task.
    pub async fn run_refresh(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            let _ = self.refresh().await;
        }
    }
}
