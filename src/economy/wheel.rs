//! Reward wheel selection
//!
//! Filters the prize catalog by player eligibility, then draws one prize
//! by weight: `r = uniform(0, Σweights)`, walk the eligible list in catalog
//! order subtracting each weight until `r` is exhausted. Catalog order is
//! fixed, so selection is deterministic given the draw; the last element
//! absorbs any floating-point remainder.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;

use crate::catalog::PrizeDef;
use crate::error::{Error, Result};
use crate::ledger::PlayerLedger;

/// Weighted prize selector with its own seedable draw stream.
pub struct WheelSelector {
    rng: Mutex<ChaCha12Rng>,
}

impl WheelSelector {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(ChaCha12Rng::from_entropy()),
        }
    }

    /// Deterministic draw stream for tests and replay.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha12Rng::seed_from_u64(seed)),
        }
    }

    /// The subset of the catalog this player may win, in catalog order.
    pub fn eligible<'a>(prizes: &'a [PrizeDef], player: &PlayerLedger) -> Vec<&'a PrizeDef> {
        prizes
            .iter()
            .filter(|p| {
                (!p.vip_only || player.vip)
                    && (!p.nsfw || player.nsfw_consent)
                    && player.level >= p.min_level
            })
            .collect()
    }

    /// Draw one prize from an eligible subset by weight.
    pub fn draw<'a>(&self, eligible: &[&'a PrizeDef]) -> Result<&'a PrizeDef> {
        let total_weight: f64 = eligible.iter().map(|p| p.weight).sum();
        if eligible.is_empty() || total_weight <= 0.0 {
            return Err(Error::NoEligiblePrizes);
        }

        let mut r = self.rng.lock().gen_range(0.0..total_weight);
        let mut fallback = None;
        for prize in eligible {
            if prize.weight <= 0.0 {
                continue;
            }
            fallback = Some(*prize);
            r -= prize.weight;
            if r <= 0.0 {
                return Ok(*prize);
            }
        }
        // Floating-point drift can leave a sliver of r; the final weighted
        // entry absorbs it.
        fallback.ok_or(Error::NoEligiblePrizes)
    }
}

impl Default for WheelSelector {
    fn default() -> Self {
        Self::new()
    }
}
