use std::sync::Arc;

use chrono::TimeZone;
use chrono_tz::Africa::Lagos;
use rust_decimal::Decimal;

use refledger::clock::ManualClock;
use refledger::config::LedgerConfig;
use refledger::engine::profit::FractionSampler;
use refledger::engine::Engine;

/// Engine at 2026-03-02 10:00 Lagos, lowest rate in every band.
pub fn engine_with(config: LedgerConfig) -> (Engine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Lagos.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap(),
    ));
    let engine = Engine::new(config, clock.clone(), Arc::new(FractionSampler(0.0)));
    (engine, clock)
}

pub fn engine() -> (Engine, Arc<ManualClock>) {
    engine_with(LedgerConfig::default())
}

/// Bring `id` to full activation: max referrals and every required ad.
pub fn activate(engine: &Engine, id: &str) {
    engine.create_or_get_user(id);
    let max = engine.config().max_referrals;
    for n in 0..max {
        engine
            .apply_referral(id, &format!("{id}-ref-{n}"))
            .unwrap();
    }
    for _ in 0..engine.config().ads_required {
        engine.record_ad_watch(id).unwrap();
    }
    assert!(engine.user(id).unwrap().trading_active);
}

/// Verified account holding `profit` in withdrawable profit.
pub fn eligible(engine: &Engine, id: &str, profit: Decimal) {
    engine.create_or_get_user(id);
    engine.users().update(id, |a| {
        a.verified = true;
        a.withdrawable_profit = profit;
    });
}
