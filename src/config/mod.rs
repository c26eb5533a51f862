//! Engine configuration
//!
//! Centralized, serde-deserializable configuration for the economy engine:
//! base stat values and accrual window, wheel cooldown, circuit breaker
//! thresholds and claim-record retention. Loadable from a TOML file with
//! validated defaults for every section.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub economy: EconomyConfig,
    pub wheel: WheelConfig,
    pub breaker: BreakerConfig,
    pub claims: ClaimConfig,
}

/// Base stat values and accrual behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// LP per tap before any upgrades. Effective value is clamped to >= 1.
    pub base_lp_per_tap: u64,
    /// Passive LP per hour before any upgrades.
    pub base_lp_per_hour: u64,
    /// Energy capacity before any upgrades. Effective value is clamped to >= 100.
    pub base_max_energy: u32,
    pub starting_lp: f64,
    pub starting_energy: u32,
    pub starting_level: u32,
    /// Cap on passive accrual; offline time beyond this earns nothing.
    pub accrual_window_minutes: u64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            base_lp_per_tap: 1,
            base_lp_per_hour: 0,
            base_max_energy: 100,
            starting_lp: 0.0,
            starting_energy: 100,
            starting_level: 1,
            accrual_window_minutes: 8 * 60,
        }
    }
}

/// Reward wheel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    /// Minimum time between spins per player.
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(24 * 3600),
        }
    }
}

/// Circuit breaker thresholds for ledger store traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures within the window before the circuit opens.
    pub failure_threshold: u32,
    /// Successes in half-open before the circuit closes again.
    pub success_threshold: u32,
    /// Window within which consecutive failures are counted.
    #[serde(with = "humantime_serde")]
    pub failure_window: Duration,
    /// How long an open circuit fails fast before probing.
    #[serde(with = "humantime_serde")]
    pub open_cooldown: Duration,
    /// Concurrent probe calls allowed while half-open.
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            failure_window: Duration::from_secs(60),
            open_cooldown: Duration::from_secs(30),
            half_open_max_calls: 1,
        }
    }
}

/// Claim-record retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimConfig {
    /// Claim records older than this may be pruned.
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let config: Self = toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.economy.accrual_window_minutes == 0 {
            return Err(Error::Config(
                "economy.accrual_window_minutes must be > 0".into(),
            ));
        }
        if self.economy.starting_level == 0 {
            return Err(Error::Config("economy.starting_level must be > 0".into()));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(Error::Config("breaker.failure_threshold must be > 0".into()));
        }
        if self.breaker.success_threshold == 0 {
            return Err(Error::Config("breaker.success_threshold must be > 0".into()));
        }
        if self.breaker.half_open_max_calls == 0 {
            return Err(Error::Config(
                "breaker.half_open_max_calls must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn default_accrual_window_is_eight_hours() {
        assert_eq!(EconomyConfig::default().accrual_window_minutes, 480);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [economy]
            base_lp_per_tap = 2
            starting_lp = 5000.0

            [wheel]
            cooldown = "12h"
        "#,
        )
        .unwrap();
        assert_eq!(config.economy.base_lp_per_tap, 2);
        assert_eq!(config.wheel.cooldown, Duration::from_secs(12 * 3600));
        assert_eq!(config.breaker.failure_threshold, 5);
        config.validate().unwrap();
    }

    #[test]
    fn zero_accrual_window_rejected() {
        let mut config = EngineConfig::default();
        config.economy.accrual_window_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn load_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[economy]\nbase_max_energy = 500").unwrap();
        let config = EngineConfig::load(file.path()).await.unwrap();
        assert_eq!(config.economy.base_max_energy, 500);
    }
}
