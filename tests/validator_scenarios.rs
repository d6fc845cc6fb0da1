//! End-to-end scenarios for the momentum confirmation pipeline

use trendgate::config::{FusionConfig, ValidatorConfig};
use trendgate::fusion::FusionEngine;
use trendgate::types::{OrderSide, TradeAction, TrendDirection, TrendReading};
use trendgate::validator::{OrderStatus, OrderValidator};
use trendgate::CoreError;

const CYCLE_MS: i64 = 30_000;

fn validator(cfg: ValidatorConfig) -> OrderValidator {
    OrderValidator::new(cfg)
}

/// SELL created at 101000; 101500, 102000, 101500, 100000 with a 0.5%
/// reversal threshold and 3 wait cycles confirms on the 100000 cycle.
#[test]
fn sell_order_confirms_after_peak_and_retracement() {
    let mut v = validator(ValidatorConfig {
        reversal_threshold_pct: 0.005,
        confirmation_wait_cycles: 3,
        ..ValidatorConfig::default()
    });
    let id = v.create_order(OrderSide::Sell, 101_000.0, 0.001, 0);

    let prices = [101_500.0, 102_000.0, 101_500.0, 100_000.0];
    let mut statuses = Vec::new();
    for (i, price) in prices.iter().enumerate() {
        v.process_cycle(*price, (i as i64 + 1) * CYCLE_MS);
        statuses.push(v.get(&id).unwrap().status);
    }

    assert_eq!(
        statuses,
        vec![
            OrderStatus::Pending,
            OrderStatus::Pending,
            OrderStatus::Pending,
            OrderStatus::Confirmed,
        ]
    );
    let order = v.get(&id).unwrap();
    // The 102000 peak was recorded before the fall
    assert!(order.peaks.contains(&102_000.0));
    assert!(order.reason.contains("reversal confirmed"));
}

/// BUY created at 99000 in a downtrend; a +0.20% move against a 0.12%
/// bounce guard rejects it, and the later fall to 97000 cannot revive it.
#[test]
fn buy_order_is_rejected_on_adverse_bounce() {
    let mut v = validator(ValidatorConfig {
        bounce_guard_pct: 0.0012,
        ..ValidatorConfig::default()
    });
    let id = v.create_order(OrderSide::Buy, 99_000.0, 0.001, 0);

    v.process_cycle(99_200.0, CYCLE_MS);
    let order = v.get(&id).unwrap();
    assert_eq!(order.status, OrderStatus::Rejected);
    assert!(order.reason.contains("adverse bounce"));

    // Terminal: the later drop is a no-op StateViolation
    let err = v.update_order(&id, 97_000.0, 2 * CYCLE_MS).unwrap_err();
    assert!(matches!(err, CoreError::StateViolation { .. }));
    assert_eq!(v.get(&id).unwrap().status, OrderStatus::Rejected);

    // And the cycle path never confirms it either
    let report = v.process_cycle(97_000.0, 3 * CYCLE_MS);
    assert!(report.confirmed.is_empty());
    assert_eq!(v.get(&id).unwrap().status, OrderStatus::Rejected);
}

/// With a 300s TTL and 30s cycles, the order is alive at cycle 9 (270s)
/// and expired exactly at cycle 10 (300s).
#[test]
fn pending_order_expires_exactly_at_ttl() {
    let mut v = validator(ValidatorConfig {
        max_pending_secs: 300,
        ..ValidatorConfig::default()
    });
    let id = v.create_order(OrderSide::Buy, 100_000.0, 0.001, 0);

    for cycle in 1..=9i64 {
        v.process_cycle(100_000.0, cycle * CYCLE_MS);
        assert!(
            !v.get(&id).unwrap().status.is_terminal(),
            "terminal too early at cycle {}",
            cycle
        );
    }

    let report = v.process_cycle(100_000.0, 10 * CYCLE_MS);
    assert_eq!(report.expired, vec![id.clone()]);
    assert_eq!(v.get(&id).unwrap().status, OrderStatus::Expired);
}

/// Expiry wins regardless of price: even a perfect reversal price on the
/// TTL cycle expires instead of confirming.
#[test]
fn expiry_takes_precedence_over_price() {
    let mut v = validator(ValidatorConfig {
        reversal_threshold_pct: 0.005,
        confirmation_wait_cycles: 1,
        max_pending_secs: 60,
        ..ValidatorConfig::default()
    });
    let id = v.create_order(OrderSide::Sell, 101_000.0, 0.001, 0);
    v.process_cycle(102_000.0, CYCLE_MS);
    // TTL reached on this cycle despite a 1.9% retracement
    v.process_cycle(100_000.0, 2 * CYCLE_MS);
    assert_eq!(v.get(&id).unwrap().status, OrderStatus::Expired);
}

/// Every observed state sequence is a subsequence of
/// SIMULATED -> PENDING -> terminal.
#[test]
fn state_sequences_are_monotonic() {
    let rank = |status: OrderStatus| match status {
        OrderStatus::Simulated => 0,
        OrderStatus::Pending => 1,
        OrderStatus::Confirmed | OrderStatus::Rejected | OrderStatus::Expired => 2,
    };

    // A jittery price path across several orders of both sides
    let mut v = validator(ValidatorConfig {
        reversal_threshold_pct: 0.004,
        confirmation_wait_cycles: 2,
        bounce_guard_pct: 0.008,
        max_pending_secs: 240,
        ..ValidatorConfig::default()
    });
    let buy = v.create_order(OrderSide::Buy, 100_000.0, 0.001, 0);
    let sell = v.create_order(OrderSide::Sell, 100_000.0, 0.001, 0);

    let path = [
        100_200.0, 99_700.0, 100_100.0, 99_400.0, 99_900.0, 100_500.0, 100_300.0, 99_800.0,
        100_000.0, 100_200.0,
    ];
    let mut sequences: Vec<Vec<OrderStatus>> = vec![Vec::new(), Vec::new()];
    for (i, price) in path.iter().enumerate() {
        v.process_cycle(*price, (i as i64 + 1) * CYCLE_MS);
        for (idx, id) in [&buy, &sell].iter().enumerate() {
            if let Some(order) = v.get(id) {
                sequences[idx].push(order.status);
            }
        }
    }

    for sequence in sequences {
        for pair in sequence.windows(2) {
            assert!(
                rank(pair[1]) >= rank(pair[0]),
                "backward transition {:?} -> {:?}",
                pair[0],
                pair[1]
            );
        }
        // Terminal states never change once reached
        if let Some(first_terminal) = sequence.iter().position(|s| s.is_terminal()) {
            let terminal = sequence[first_terminal];
            assert!(sequence[first_terminal..].iter().all(|&s| s == terminal));
        }
    }
}

/// The divergence veto holds for every confidence combination.
#[test]
fn divergence_always_vetoes() {
    let engine = FusionEngine::new(FusionConfig::default());
    for ic in [0.1, 0.5, 0.9, 1.0] {
        for ec in [0.1, 0.5, 0.9, 1.0] {
            let d = engine.fuse(
                TrendReading::new(TrendDirection::Up, ic),
                TrendReading::new(TrendDirection::Down, ec),
                0,
            );
            assert!(!d.can_trade, "divergent pair traded at ic={} ec={}", ic, ec);
        }
    }
}

/// |combined| < 0.2 always maps to HOLD, and fusion is reproducible.
#[test]
fn fusion_hold_band_and_determinism() {
    let engine = FusionEngine::new(FusionConfig::default());
    let internal = TrendReading::new(TrendDirection::Up, 0.25);
    let external = TrendReading::new(TrendDirection::Down, 0.05);

    let first = engine.fuse(internal, external, 7);
    let second = engine.fuse(internal, external, 7);
    assert_eq!(first.combined_score, second.combined_score);
    assert_eq!(first.action, second.action);
    assert!(first.combined_score.abs() < 0.2);
    assert_eq!(first.action, TradeAction::Hold);
}
