//! Statistical fairness and eligibility gating of the reward wheel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tapforge::{
    CatalogCache, CatalogFile, EconomyEngine, EngineConfig, LedgerStore, MemoryLedgerStore,
    PlayerId, PlayerLedger, PrizeDef, PrizeKind, StaticCatalogSource, WheelSelector,
};

fn prize(id: &str, weight: f64) -> PrizeDef {
    PrizeDef {
        id: id.into(),
        kind: PrizeKind::Currency,
        amount: 10,
        weight,
        vip_only: false,
        nsfw: false,
        min_level: 0,
        label: String::new(),
    }
}

#[test]
fn empirical_frequencies_track_weights() {
    const SPINS: u32 = 100_000;
    const TOLERANCE_PP: f64 = 1.5;

    let weights = [30.0, 25.0, 20.0, 15.0, 8.0, 1.5, 0.4, 0.1];
    let catalog: Vec<PrizeDef> = weights
        .iter()
        .enumerate()
        .map(|(i, &w)| prize(&format!("prize_{i}"), w))
        .collect();
    let refs: Vec<&PrizeDef> = catalog.iter().collect();

    let wheel = WheelSelector::with_seed(0xFA1_5E5);
    let mut counts: HashMap<String, u32> = HashMap::new();
    for _ in 0..SPINS {
        let winner = wheel.draw(&refs).unwrap();
        *counts.entry(winner.id.clone()).or_default() += 1;
    }

    for (i, &weight) in weights.iter().enumerate() {
        let observed = *counts.get(&format!("prize_{i}")).unwrap_or(&0) as f64 / SPINS as f64;
        let expected = weight / 100.0;
        let delta_pp = (observed - expected).abs() * 100.0;
        assert!(
            delta_pp <= TOLERANCE_PP,
            "prize_{i}: observed {:.3}% vs expected {:.3}% (off by {delta_pp:.2}pp)",
            observed * 100.0,
            expected * 100.0
        );
    }
}

#[test]
fn rare_prizes_still_land() {
    // 0.1% weight over 100k draws should land well over zero times.
    let catalog = vec![prize("common", 99.9), prize("jackpot", 0.1)];
    let refs: Vec<&PrizeDef> = catalog.iter().collect();
    let wheel = WheelSelector::with_seed(31337);
    let jackpots = (0..100_000)
        .filter(|_| wheel.draw(&refs).unwrap().id == "jackpot")
        .count();
    assert!(jackpots > 20, "expected roughly 100 jackpots, got {jackpots}");
    assert!(jackpots < 500);
}

#[tokio::test]
async fn ineligible_prizes_never_land_across_many_spins() {
    let mut vip_jackpot = prize("vip_jackpot", 40.0);
    vip_jackpot.vip_only = true;
    let mut veteran_chest = prize("veteran_chest", 40.0);
    veteran_chest.min_level = 5;
    let mut spicy = prize("spicy", 40.0);
    spicy.nsfw = true;
    let common = prize("common", 20.0);

    let catalog = CatalogFile {
        upgrades: vec![],
        prizes: vec![vip_jackpot, veteran_chest, spicy, common],
        rewards: HashMap::new(),
    };

    let mut config = EngineConfig::default();
    config.wheel.cooldown = Duration::ZERO;

    let store = Arc::new(MemoryLedgerStore::new());
    let cache = Arc::new(
        CatalogCache::load(
            Arc::new(StaticCatalogSource::new(catalog)),
            Duration::from_secs(300),
        )
        .await
        .unwrap(),
    );
    let engine =
        EconomyEngine::new(config, store.clone() as Arc<dyn LedgerStore>, cache).with_wheel_seed(7);

    // Level-3 player, no VIP, no NSFW consent.
    let player = PlayerId::from_platform(2001);
    store.put(PlayerLedger::bootstrap(player, 0.0, 100, 100, 3));

    for _ in 0..500 {
        let spin = engine.spin(player).await.unwrap();
        assert_eq!(
            spin.prize.id, "common",
            "ineligible prize {} was granted",
            spin.prize.id
        );
    }
}
