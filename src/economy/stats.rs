//! Upgrade effect compiler
//!
//! Computes a player's effective stats from the static upgrade catalog and
//! their purchased levels. Pure function of its inputs, so it can be cached
//! or recomputed on every stat read without drift. The engine recomputes on
//! every read and writes the result back to the ledger's cached fields
//! after each purchase.

use crate::catalog::{UpgradeCategory, UpgradeDef};
use crate::config::EconomyConfig;
use crate::ledger::{EffectiveStats, UpgradeLevels};

/// Minimum effective LP per tap after clamping.
pub const MIN_LP_PER_TAP: u64 = 1;
/// Minimum effective energy capacity after clamping.
pub const MIN_MAX_ENERGY: u32 = 100;

/// Compile effective stats from base values plus all owned upgrade levels.
///
/// Each owned catalog entry contributes `base_effect × level ×
/// effect_multiplier` to the stat bucket its `category` selects. Results
/// are floored to whole units and clamped to minimums.
pub fn compile(
    levels: &UpgradeLevels,
    catalog: &[UpgradeDef],
    base: &EconomyConfig,
) -> EffectiveStats {
    let mut lp_per_tap = base.base_lp_per_tap as f64;
    let mut lp_per_hour = base.base_lp_per_hour as f64;
    let mut max_energy = base.base_max_energy as f64;

    for def in catalog {
        let level = levels.get(&def.id).copied().unwrap_or(0);
        if level == 0 {
            continue;
        }
        let effect = def.base_effect as f64 * level as f64 * def.effect_multiplier;
        match def.category {
            UpgradeCategory::Tap => lp_per_tap += effect,
            UpgradeCategory::Passive => lp_per_hour += effect,
            UpgradeCategory::Energy => max_energy += effect,
        }
    }

    EffectiveStats {
        lp_per_tap: (lp_per_tap.floor() as u64).max(MIN_LP_PER_TAP),
        lp_per_hour: lp_per_hour.max(0.0).floor() as u64,
        max_energy: (max_energy.floor() as u32).max(MIN_MAX_ENERGY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::UpgradeLevels;

    fn def(id: &str, category: UpgradeCategory, base_effect: u64, mult: f64) -> UpgradeDef {
        UpgradeDef {
            id: id.into(),
            category,
            base_cost: 1000,
            cost_multiplier: 1.5,
            base_effect,
            effect_multiplier: mult,
            max_level: 20,
            min_player_level: 0,
        }
    }

    fn base() -> EconomyConfig {
        EconomyConfig {
            base_lp_per_tap: 1,
            base_lp_per_hour: 10,
            base_max_energy: 100,
            ..Default::default()
        }
    }

    #[test]
    fn no_upgrades_yields_base_values() {
        let catalog = vec![def("tap_boost", UpgradeCategory::Tap, 2, 1.0)];
        let stats = compile(&UpgradeLevels::new(), &catalog, &base());
        assert_eq!(stats.lp_per_tap, 1);
        assert_eq!(stats.lp_per_hour, 10);
        assert_eq!(stats.max_energy, 100);
    }

    #[test]
    fn effects_bucket_by_category_and_scale_with_level() {
        let catalog = vec![
            def("tap_boost", UpgradeCategory::Tap, 2, 1.0),
            def("hourly_engine", UpgradeCategory::Passive, 50, 1.0),
            def("battery", UpgradeCategory::Energy, 100, 1.0),
        ];
        let mut levels = UpgradeLevels::new();
        levels.insert("tap_boost".into(), 3);
        levels.insert("hourly_engine".into(), 2);
        levels.insert("battery".into(), 1);

        let stats = compile(&levels, &catalog, &base());
        assert_eq!(stats.lp_per_tap, 1 + 2 * 3);
        assert_eq!(stats.lp_per_hour, 10 + 50 * 2);
        assert_eq!(stats.max_energy, 100 + 100);
    }

    #[test]
    fn fractional_effects_are_floored() {
        let catalog = vec![def("tap_boost", UpgradeCategory::Tap, 1, 1.2)];
        let mut levels = UpgradeLevels::new();
        levels.insert("tap_boost".into(), 1);
        // 1 + 1*1*1.2 = 2.2 -> 2
        let stats = compile(&levels, &catalog, &base());
        assert_eq!(stats.lp_per_tap, 2);
    }

    #[test]
    fn clamps_hold_at_minimums() {
        let stats = compile(
            &UpgradeLevels::new(),
            &[],
            &EconomyConfig {
                base_lp_per_tap: 0,
                base_lp_per_hour: 0,
                base_max_energy: 10,
                ..Default::default()
            },
        );
        assert_eq!(stats.lp_per_tap, MIN_LP_PER_TAP);
        assert_eq!(stats.lp_per_hour, 0);
        assert_eq!(stats.max_energy, MIN_MAX_ENERGY);
    }

    #[test]
    fn compilation_is_idempotent() {
        let catalog = vec![def("tap_boost", UpgradeCategory::Tap, 2, 1.5)];
        let mut levels = UpgradeLevels::new();
        levels.insert("tap_boost".into(), 7);
        let first = compile(&levels, &catalog, &base());
        let second = compile(&levels, &catalog, &base());
        assert_eq!(first, second);
    }
}
