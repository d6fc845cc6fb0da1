//! Momentum order validator
//!
//! Owns the collection of in-flight simulated orders and advances each one
//! exactly once per cycle. An order is held in suspension until the price
//! demonstrably reverses in its predicted direction; a false bounce rejects
//! it and a stale wait expires it. Confirmed orders are handed to the
//! execution collaborator; the validator never touches a venue itself.
//!
//! State machine: SIMULATED -> PENDING -> {CONFIRMED | REJECTED | EXPIRED}.
//! Transitions are monotonic; terminal orders are immutable and evicted
//! after a retention window.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ValidatorConfig;
use crate::error::CoreError;
use crate::types::OrderSide;

/// Samples compared when detecting a strict local extremum
const EXTREMUM_WINDOW: usize = 3;
/// Price history samples exposed in the monitoring snapshot
const SNAPSHOT_HISTORY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Simulated,
    Pending,
    Confirmed,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed | OrderStatus::Rejected | OrderStatus::Expired
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Simulated => write!(f, "SIMULATED"),
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Confirmed => write!(f, "CONFIRMED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
            OrderStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// A provisional trade intent awaiting momentum confirmation
#[derive(Debug, Clone, Serialize)]
pub struct SimulatedOrder {
    pub id: String,
    pub side: OrderSide,
    pub created_price: f64,
    pub current_price: f64,
    pub quantity: f64,
    /// Strict local maxima observed since creation (bounded)
    pub peaks: Vec<f64>,
    /// Strict local minima observed since creation (bounded)
    pub valleys: Vec<f64>,
    pub status: OrderStatus,
    /// Consecutive cycles the reversal pattern has held
    pub confirmation_reversals: u32,
    /// Timestamp in milliseconds
    pub created_at: i64,
    /// Timestamp in milliseconds
    pub last_update_at: i64,
    /// Human-readable outcome explanation
    pub reason: String,
    /// Retracement fraction required to confirm
    pub reversal_threshold: f64,
    /// Qualifying cycles required to confirm
    pub confirmation_wait_cycles: u32,
    /// Raw per-cycle price samples (bounded)
    #[serde(skip)]
    price_history: VecDeque<f64>,
    /// Best favorable extremum seen so far (max for SELL, min for BUY)
    #[serde(skip)]
    favorable_extremum: Option<f64>,
}

impl SimulatedOrder {
    /// Retracement from the favorable extremum toward the target, as a
    /// fraction of the extremum. Zero until an extremum exists.
    fn retracement(&self, price: f64) -> f64 {
        match (self.side, self.favorable_extremum) {
            (OrderSide::Sell, Some(peak)) if peak > 0.0 => (peak - price) / peak,
            (OrderSide::Buy, Some(valley)) if valley > 0.0 => (price - valley) / valley,
            _ => 0.0,
        }
    }

    /// Whether a favorable extremum at/beyond the entry price was recorded
    fn extremum_recorded(&self) -> bool {
        match (self.side, self.favorable_extremum) {
            (OrderSide::Sell, Some(peak)) => peak >= self.created_price,
            (OrderSide::Buy, Some(valley)) => valley <= self.created_price,
            _ => false,
        }
    }
}

/// Aggregate status counts over the tracked collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub simulated: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub rejected: usize,
    pub expired: usize,
}

/// Read-only per-order view for the monitoring collaborator
#[derive(Debug, Clone, Serialize)]
pub struct OrderSnapshot {
    pub id: String,
    pub side: OrderSide,
    pub created_price: f64,
    pub current_price: f64,
    pub quantity: f64,
    pub peaks: Vec<f64>,
    pub valleys: Vec<f64>,
    pub status: OrderStatus,
    pub confirmation_reversals: u32,
    pub created_at: i64,
    pub last_update_at: i64,
    pub reason: String,
    pub reversal_threshold: f64,
    pub confirmation_wait_cycles: u32,
    /// Most recent price samples, truncated for publishing
    pub price_history: Vec<f64>,
}

/// Periodically refreshed snapshot; consumers tolerate one-cycle staleness
#[derive(Debug, Clone, Serialize)]
pub struct ValidatorSnapshot {
    pub ts: i64,
    pub counts: StatusCounts,
    pub orders: Vec<OrderSnapshot>,
}

/// What one processed cycle did to the collection
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Orders confirmed this cycle, ready for the execution collaborator
    pub confirmed: Vec<SimulatedOrder>,
    pub rejected: Vec<String>,
    pub expired: Vec<String>,
    pub evicted: Vec<String>,
}

pub struct OrderValidator {
    config: ValidatorConfig,
    orders: HashMap<String, SimulatedOrder>,
}

impl OrderValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            orders: HashMap::new(),
        }
    }

    /// Track a new simulated order. Returns its id.
    pub fn create_order(&mut self, side: OrderSide, price: f64, quantity: f64, now: i64) -> String {
        let id = Uuid::new_v4().to_string();
        let order = SimulatedOrder {
            id: id.clone(),
            side,
            created_price: price,
            current_price: price,
            quantity,
            peaks: Vec::new(),
            valleys: Vec::new(),
            status: OrderStatus::Simulated,
            confirmation_reversals: 0,
            created_at: now,
            last_update_at: now,
            reason: String::new(),
            reversal_threshold: self.config.reversal_threshold_pct,
            confirmation_wait_cycles: self.config.confirmation_wait_cycles,
            price_history: VecDeque::with_capacity(self.config.history_cap),
            favorable_extremum: None,
        };
        info!(order_id = %id, %side, price, quantity, "simulated order created");
        self.orders.insert(id.clone(), order);
        id
    }

    /// Update a single order with the latest price.
    ///
    /// Attempting to mutate a terminal order is a no-op that returns
    /// `StateViolation` without altering state.
    pub fn update_order(
        &mut self,
        id: &str,
        price: f64,
        now: i64,
    ) -> Result<OrderStatus, CoreError> {
        let order = self
            .orders
            .get_mut(id)
            .ok_or_else(|| CoreError::StateViolation {
                order_id: id.to_string(),
                status: "unknown".into(),
            })?;
        if order.status.is_terminal() {
            return Err(CoreError::StateViolation {
                order_id: id.to_string(),
                status: order.status.to_string(),
            });
        }
        Self::advance(order, &self.config, price, now);
        Ok(order.status)
    }

    /// Advance every tracked non-terminal order exactly once with the
    /// latest market price, then evict terminal orders past retention.
    pub fn process_cycle(&mut self, price: f64, now: i64) -> CycleReport {
        let mut report = CycleReport::default();

        for order in self.orders.values_mut() {
            if order.status.is_terminal() {
                continue;
            }
            Self::advance(order, &self.config, price, now);
            match order.status {
                OrderStatus::Confirmed => report.confirmed.push(order.clone()),
                OrderStatus::Rejected => report.rejected.push(order.id.clone()),
                OrderStatus::Expired => report.expired.push(order.id.clone()),
                _ => {}
            }
        }

        let retention_ms = self.config.retention_secs as i64 * 1000;
        let evicted: Vec<String> = self
            .orders
            .values()
            .filter(|o| o.status.is_terminal() && now - o.last_update_at >= retention_ms)
            .map(|o| o.id.clone())
            .collect();
        for id in &evicted {
            self.orders.remove(id);
            debug!(order_id = %id, "terminal order evicted");
        }
        report.evicted = evicted;

        report
    }

    /// One price update against one non-terminal order. Checks run in a
    /// fixed order: expiry (price-independent), bounce rejection, then
    /// confirmation bookkeeping.
    fn advance(order: &mut SimulatedOrder, config: &ValidatorConfig, price: f64, now: i64) {
        order.current_price = price;
        order.last_update_at = now;

        order.price_history.push_back(price);
        while order.price_history.len() > config.history_cap {
            order.price_history.pop_front();
        }
        Self::record_local_extrema(order, config.history_cap);

        // First post-creation price update activates tracking
        if order.status == OrderStatus::Simulated {
            order.status = OrderStatus::Pending;
        }

        // Favorable extremum since creation
        order.favorable_extremum = Some(match (order.side, order.favorable_extremum) {
            (OrderSide::Sell, Some(peak)) => peak.max(price),
            (OrderSide::Buy, Some(valley)) => valley.min(price),
            (_, None) => price,
        });

        // TTL check, regardless of price
        let max_pending_ms = config.max_pending_secs as i64 * 1000;
        if now - order.created_at >= max_pending_ms {
            order.status = OrderStatus::Expired;
            order.reason = format!(
                "no reversal within {}s of creation",
                config.max_pending_secs
            );
            info!(order_id = %order.id, reason = %order.reason, "order expired");
            return;
        }

        // Bounce guard: an adverse move beyond the margin means the original
        // dip/peak was a false bounce, not a genuine reversal
        let adverse = match order.side {
            OrderSide::Buy => price >= order.created_price * (1.0 + config.bounce_guard_pct),
            OrderSide::Sell => price <= order.created_price * (1.0 - config.bounce_guard_pct),
        };
        if adverse {
            let move_pct = (price - order.created_price) / order.created_price * 100.0;
            order.status = OrderStatus::Rejected;
            order.reason = format!(
                "adverse bounce: price moved {:+.2}% past entry (guard {:.2}%)",
                move_pct,
                config.bounce_guard_pct * 100.0
            );
            info!(order_id = %order.id, reason = %order.reason, "order rejected");
            return;
        }

        // A qualifying cycle keeps the reversal pattern intact: price still
        // on the extremum side of entry, or already retraced past the
        // threshold. Anything else resets the streak (status unchanged).
        let retracement = order.retracement(price);
        let retraced = retracement >= order.reversal_threshold;
        let on_extremum_side = match order.side {
            OrderSide::Sell => price >= order.created_price,
            OrderSide::Buy => price <= order.created_price,
        };
        if on_extremum_side || retraced {
            order.confirmation_reversals += 1;
        } else {
            order.confirmation_reversals = 0;
        }

        if order.extremum_recorded()
            && retraced
            && order.confirmation_reversals >= order.confirmation_wait_cycles
        {
            order.status = OrderStatus::Confirmed;
            order.reason = format!(
                "reversal confirmed: {:.2}% retracement from {:.2} after {} cycles",
                retracement * 100.0,
                order.favorable_extremum.unwrap_or(order.created_price),
                order.confirmation_reversals
            );
            info!(order_id = %order.id, reason = %order.reason, "order confirmed");
        }
    }

    /// Append the previous sample to peaks/valleys when it is a strict
    /// local extremum of the trailing window
    fn record_local_extrema(order: &mut SimulatedOrder, cap: usize) {
        let n = order.price_history.len();
        if n < EXTREMUM_WINDOW {
            return;
        }
        let a = order.price_history[n - 3];
        let b = order.price_history[n - 2];
        let c = order.price_history[n - 1];
        if b > a && b > c {
            order.peaks.push(b);
            if order.peaks.len() > cap {
                order.peaks.remove(0);
            }
        } else if b < a && b < c {
            order.valleys.push(b);
            if order.valleys.len() > cap {
                order.valleys.remove(0);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&SimulatedOrder> {
        self.orders.get(id)
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for order in self.orders.values() {
            match order.status {
                OrderStatus::Simulated => counts.simulated += 1,
                OrderStatus::Pending => counts.pending += 1,
                OrderStatus::Confirmed => counts.confirmed += 1,
                OrderStatus::Rejected => counts.rejected += 1,
                OrderStatus::Expired => counts.expired += 1,
            }
        }
        counts
    }

    /// Read-only snapshot for the monitoring collaborator
    pub fn snapshot(&self, now: i64) -> ValidatorSnapshot {
        let orders = self
            .orders
            .values()
            .map(|o| OrderSnapshot {
                id: o.id.clone(),
                side: o.side,
                created_price: o.created_price,
                current_price: o.current_price,
                quantity: o.quantity,
                peaks: o.peaks.clone(),
                valleys: o.valleys.clone(),
                status: o.status,
                confirmation_reversals: o.confirmation_reversals,
                created_at: o.created_at,
                last_update_at: o.last_update_at,
                reason: o.reason.clone(),
                reversal_threshold: o.reversal_threshold,
                confirmation_wait_cycles: o.confirmation_wait_cycles,
                price_history: o
                    .price_history
                    .iter()
                    .rev()
                    .take(SNAPSHOT_HISTORY)
                    .rev()
                    .copied()
                    .collect(),
            })
            .collect();

        ValidatorSnapshot {
            ts: now,
            counts: self.status_counts(),
            orders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ValidatorConfig {
        ValidatorConfig::default()
    }

    #[test]
    fn first_update_moves_simulated_to_pending() {
        let mut v = OrderValidator::new(config());
        let id = v.create_order(OrderSide::Sell, 101_000.0, 0.001, 0);
        assert_eq!(v.get(&id).unwrap().status, OrderStatus::Simulated);

        v.process_cycle(101_100.0, 30_000);
        assert_eq!(v.get(&id).unwrap().status, OrderStatus::Pending);
    }

    #[test]
    fn terminal_order_mutation_is_a_state_violation_noop() {
        let mut v = OrderValidator::new(ValidatorConfig {
            bounce_guard_pct: 0.001,
            ..config()
        });
        let id = v.create_order(OrderSide::Buy, 100_000.0, 0.001, 0);
        // +0.5% above entry trips the 0.1% guard
        v.process_cycle(100_500.0, 30_000);
        let before = v.get(&id).unwrap().clone();
        assert_eq!(before.status, OrderStatus::Rejected);

        let err = v.update_order(&id, 90_000.0, 60_000).unwrap_err();
        assert!(matches!(err, CoreError::StateViolation { .. }));
        let after = v.get(&id).unwrap();
        assert_eq!(after.status, OrderStatus::Rejected);
        assert_eq!(after.current_price, before.current_price);
        assert_eq!(after.last_update_at, before.last_update_at);
    }

    #[test]
    fn non_qualifying_cycle_resets_streak_without_status_change() {
        let cfg = ValidatorConfig {
            reversal_threshold_pct: 0.01,
            bounce_guard_pct: 0.05,
            ..config()
        };
        let mut v = OrderValidator::new(cfg);
        let id = v.create_order(OrderSide::Sell, 100_000.0, 0.001, 0);

        v.process_cycle(100_200.0, 30_000); // qualifying, streak 1
        assert_eq!(v.get(&id).unwrap().confirmation_reversals, 1);

        // Below entry, retracement from 100_200 only 0.7%: streak resets
        v.process_cycle(99_500.0, 60_000);
        let order = v.get(&id).unwrap();
        assert_eq!(order.confirmation_reversals, 0);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn buy_confirmation_needs_valley_then_rise() {
        let cfg = ValidatorConfig {
            reversal_threshold_pct: 0.005,
            confirmation_wait_cycles: 3,
            bounce_guard_pct: 0.02,
            ..config()
        };
        let mut v = OrderValidator::new(cfg);
        let id = v.create_order(OrderSide::Buy, 100_000.0, 0.001, 0);

        v.process_cycle(99_500.0, 30_000); // below entry, streak 1
        v.process_cycle(99_000.0, 60_000); // valley forming, streak 2
        v.process_cycle(99_400.0, 90_000); // below entry, streak 3, +0.4% off valley
        assert_eq!(v.get(&id).unwrap().status, OrderStatus::Pending);

        // +1.0% off the 99_000 valley with the streak satisfied
        let report = v.process_cycle(99_990.0, 120_000);
        assert_eq!(report.confirmed.len(), 1);
        let order = v.get(&id).unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.reason.contains("reversal confirmed"));
    }

    #[test]
    fn expiry_fires_on_the_next_cycle_past_ttl() {
        let cfg = ValidatorConfig {
            max_pending_secs: 300,
            ..config()
        };
        let mut v = OrderValidator::new(cfg);
        let id = v.create_order(OrderSide::Buy, 100_000.0, 0.001, 0);

        for cycle in 1..=9 {
            v.process_cycle(100_000.0, cycle * 30_000);
            assert!(!v.get(&id).unwrap().status.is_terminal(), "cycle {}", cycle);
        }
        let report = v.process_cycle(100_000.0, 300_000);
        assert_eq!(report.expired, vec![id.clone()]);
        assert_eq!(v.get(&id).unwrap().status, OrderStatus::Expired);
    }

    #[test]
    fn terminal_orders_are_evicted_after_retention() {
        let cfg = ValidatorConfig {
            bounce_guard_pct: 0.001,
            retention_secs: 60,
            ..config()
        };
        let mut v = OrderValidator::new(cfg);
        let id = v.create_order(OrderSide::Buy, 100_000.0, 0.001, 0);
        v.process_cycle(100_500.0, 30_000); // rejected
        assert!(v.get(&id).is_some());

        let report = v.process_cycle(100_500.0, 95_000);
        assert!(report.evicted.contains(&id));
        assert!(v.get(&id).is_none());
    }

    #[test]
    fn strict_local_extrema_are_recorded_bounded() {
        let mut v = OrderValidator::new(ValidatorConfig {
            bounce_guard_pct: 0.5,
            max_pending_secs: 100_000,
            ..config()
        });
        let id = v.create_order(OrderSide::Sell, 100_000.0, 0.001, 0);
        let prices = [100_100.0, 100_300.0, 100_200.0, 100_050.0, 100_150.0];
        for (i, p) in prices.iter().enumerate() {
            v.process_cycle(*p, (i as i64 + 1) * 30_000);
        }
        let order = v.get(&id).unwrap();
        // 100_300 is a strict local max, 100_050 a strict local min
        assert_eq!(order.peaks, vec![100_300.0]);
        assert_eq!(order.valleys, vec![100_050.0]);
    }

    #[test]
    fn snapshot_truncates_history_and_counts_statuses() {
        let mut v = OrderValidator::new(ValidatorConfig {
            bounce_guard_pct: 0.5,
            max_pending_secs: 100_000,
            ..config()
        });
        let id = v.create_order(OrderSide::Sell, 100_000.0, 0.001, 0);
        for i in 1..=30i64 {
            v.process_cycle(100_000.0 + i as f64, i * 30_000);
        }
        let snap = v.snapshot(1_000_000);
        assert_eq!(snap.counts.pending, 1);
        let order = snap.orders.iter().find(|o| o.id == id).unwrap();
        assert_eq!(order.price_history.len(), 20);
        assert_eq!(*order.price_history.last().unwrap(), 100_030.0);
    }
}
