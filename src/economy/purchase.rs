//! Purchase validation and cost curve
//!
//! Pure half of the purchase transactor: next-level cost on the
//! compounding curve and the validation checks that gate a purchase. The
//! debit/level-write saga lives in [`crate::economy::EconomyEngine`]
//! because it needs the store.

use crate::catalog::UpgradeDef;
use crate::error::{Error, Result};
use crate::ledger::PlayerLedger;

/// Cost of buying the next level when `current_level` levels are owned:
/// `floor(base_cost × cost_multiplier ^ current_level)`.
pub fn upgrade_cost(def: &UpgradeDef, current_level: u32) -> u64 {
    (def.base_cost as f64 * def.cost_multiplier.powi(current_level as i32)).floor() as u64
}

/// Validate a purchase against the catalog entry and the player's state.
/// Returns the cost to pay on success.
pub fn validate(def: &UpgradeDef, ledger: &PlayerLedger, current_level: u32) -> Result<u64> {
    if current_level >= def.max_level {
        return Err(Error::MaxLevelReached {
            upgrade: def.id.clone(),
            max_level: def.max_level,
        });
    }
    if ledger.level < def.min_player_level {
        return Err(Error::LevelGateNotMet {
            upgrade: def.id.clone(),
            required: def.min_player_level,
            level: ledger.level,
        });
    }
    let cost = upgrade_cost(def, current_level);
    if (cost as f64) > ledger.lp {
        return Err(Error::InsufficientLp {
            required: cost,
            available: ledger.lp.floor() as u64,
        });
    }
    Ok(cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::UpgradeCategory;
    use crate::ledger::PlayerId;
    use proptest::prelude::*;

    fn def(base_cost: u64, cost_multiplier: f64, max_level: u32) -> UpgradeDef {
        UpgradeDef {
            id: "tap_boost".into(),
            category: UpgradeCategory::Tap,
            base_cost,
            cost_multiplier,
            base_effect: 1,
            effect_multiplier: 1.0,
            max_level,
            min_player_level: 0,
        }
    }

    fn player_with(lp: f64, level: u32) -> PlayerLedger {
        PlayerLedger::bootstrap(PlayerId::new(), lp, 100, 100, level)
    }

    #[test]
    fn cost_curve_compounds() {
        let def = def(2500, 1.5, 10);
        assert_eq!(upgrade_cost(&def, 0), 2500);
        assert_eq!(upgrade_cost(&def, 1), 3750);
        assert_eq!(upgrade_cost(&def, 2), 5625);
    }

    #[test]
    fn max_level_blocks_purchase() {
        let def = def(100, 1.0, 3);
        let err = validate(&def, &player_with(1_000_000.0, 1), 3).unwrap_err();
        assert!(matches!(err, Error::MaxLevelReached { max_level: 3, .. }));
    }

    #[test]
    fn level_gate_blocks_purchase() {
        let mut gated = def(100, 1.0, 10);
        gated.min_player_level = 5;
        let err = validate(&gated, &player_with(1_000_000.0, 3), 0).unwrap_err();
        assert!(matches!(
            err,
            Error::LevelGateNotMet {
                required: 5,
                level: 3,
                ..
            }
        ));
    }

    #[test]
    fn insufficient_lp_reports_exact_cost() {
        let def = def(2500, 1.5, 10);
        let err = validate(&def, &player_with(3000.0, 1), 1).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientLp {
                required: 3750,
                available: 3000
            }
        ));
    }

    #[test]
    fn exact_balance_is_enough() {
        let def = def(2500, 1.5, 10);
        assert_eq!(validate(&def, &player_with(2500.0, 1), 0).unwrap(), 2500);
    }

    proptest! {
        #[test]
        fn cost_is_monotone_in_level(
            base_cost in 1u64..1_000_000,
            mult in 1.0f64..3.0,
            level in 0u32..30,
        ) {
            let def = def(base_cost, mult, u32::MAX);
            prop_assert!(upgrade_cost(&def, level + 1) >= upgrade_cost(&def, level));
            prop_assert!(upgrade_cost(&def, 0) == base_cost);
        }
    }
}
