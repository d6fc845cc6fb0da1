//! Per-cycle orchestration
//!
//! One tick drives the whole pipeline synchronously: snapshot -> trend
//! aggregation -> decision fusion -> order validation -> adaptation. The
//! engine owns all four components; collaborators sit behind the
//! `MarketFeed` and `ExecutionSink` traits. No failure here aborts a cycle:
//! degraded inputs fall back to HOLD.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adaptive::{AdaptiveManager, CancelProposal, PositionAction};
use crate::aggregator::TrendAggregator;
use crate::fusion::FusionEngine;
use crate::types::{
    CompositeTrend, FusedDecision, MarketSnapshot, OrderSide, TradeAction, TrendDirection,
    TrendReading,
};
use crate::validator::{OrderValidator, SimulatedOrder, ValidatorSnapshot};

/// Supplies the per-cycle market snapshot
#[async_trait]
pub trait MarketFeed: Send {
    async fn snapshot(&mut self) -> Result<MarketSnapshot>;
}

/// Applies confirmed orders and proposals against the venue
#[async_trait]
pub trait ExecutionSink: Send {
    async fn submit_confirmed(&mut self, order: &SimulatedOrder) -> Result<()>;
    async fn cancel_order(&mut self, proposal: &CancelProposal) -> Result<()>;
    async fn rebalance(&mut self, action: &PositionAction) -> Result<()>;
}

/// What one cycle produced, for logging and monitoring
#[derive(Debug)]
pub struct CycleSummary {
    pub decision: FusedDecision,
    pub composite: Option<CompositeTrend>,
    pub created_order: Option<String>,
    pub confirmed: usize,
    pub profile_switched: bool,
}

pub struct Engine {
    aggregator: TrendAggregator,
    fusion: FusionEngine,
    validator: OrderValidator,
    adaptive: AdaptiveManager,
    dry_run: bool,
    /// Portfolio value at the first observed cycle, for pnl-at-switch
    initial_value: Option<f64>,
}

impl Engine {
    pub fn new(
        aggregator: TrendAggregator,
        fusion: FusionEngine,
        validator: OrderValidator,
        adaptive: AdaptiveManager,
        dry_run: bool,
    ) -> Self {
        Self {
            aggregator,
            fusion,
            validator,
            adaptive,
            dry_run,
            initial_value: None,
        }
    }

    /// Bot-local trend reading: a vote over the precomputed indicators.
    /// Missing indicators abstain, so warm-up degrades toward NEUTRAL.
    fn internal_reading(snapshot: &MarketSnapshot) -> TrendReading {
        let ind = &snapshot.indicators;
        let mut votes = 0i32;
        let mut available = 0i32;

        if let Some(rsi) = ind.rsi {
            available += 1;
            if rsi > 55.0 {
                votes += 1;
            } else if rsi < 45.0 {
                votes -= 1;
            }
        }
        if let (Some(short), Some(long)) = (ind.ema_short, ind.ema_long) {
            available += 1;
            if short > long {
                votes += 1;
            } else if short < long {
                votes -= 1;
            }
        }
        if let (Some(macd), Some(signal)) = (ind.macd, ind.macd_signal) {
            available += 1;
            if macd > signal {
                votes += 1;
            } else if macd < signal {
                votes -= 1;
            }
        }

        if available == 0 || votes == 0 {
            return TrendReading::new(TrendDirection::Neutral, 0.0);
        }

        let direction = if votes > 0 {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        };
        let mut confidence = votes.unsigned_abs() as f64 / available as f64;
        // ADX scales conviction: a weak trend halves it, a strong one keeps it
        if let Some(adx) = ind.adx {
            confidence *= (adx / 25.0).clamp(0.5, 1.0);
        }
        TrendReading::new(direction, confidence)
    }

    /// Run one full cycle against the given execution sink
    pub async fn process_cycle(
        &mut self,
        snapshot: MarketSnapshot,
        sink: &mut dyn ExecutionSink,
    ) -> CycleSummary {
        let now = snapshot.tick.ts;
        let price = snapshot.tick.mid();
        let snapshot = Arc::new(snapshot);

        if self.initial_value.is_none() {
            self.initial_value = Some(snapshot.positions.total_value(price));
        }

        // External composite; a total source outage degrades to NEUTRAL
        let composite = match self.aggregator.aggregate(&snapshot).await {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(error = %e, "aggregation degraded, treating external trend as neutral");
                None
            }
        };
        let external = composite
            .as_ref()
            .map(|c| c.as_reading())
            .unwrap_or_else(|| TrendReading::new(TrendDirection::Neutral, 0.0));
        let internal = Self::internal_reading(&snapshot);

        let decision = self.fusion.fuse(internal, external, now);
        for warning in &decision.warnings {
            warn!(warning = %warning, "decision warning");
        }

        // Advance every tracked order once; orders created below see their
        // first price update on the next cycle
        let report = self.validator.process_cycle(price, now);
        let confirmed = report.confirmed.len();

        // Gated entry: only an un-vetoed directional signal spawns a
        // simulated order
        let created_order = if decision.can_trade && decision.action != TradeAction::Hold {
            let profile = self.adaptive.active();
            let (side, quantity) = match decision.action {
                TradeAction::BuySignal => {
                    (OrderSide::Buy, profile.order_size * profile.buy_bias)
                }
                TradeAction::SellSignal => {
                    (OrderSide::Sell, profile.order_size * profile.sell_bias)
                }
                TradeAction::Hold => unreachable!(),
            };
            Some(self.validator.create_order(side, price, quantity, now))
        } else {
            None
        };

        for order in &report.confirmed {
            if self.dry_run {
                info!(order_id = %order.id, side = %order.side, "dry run: confirmed order not forwarded");
                continue;
            }
            if let Err(e) = sink.submit_confirmed(order).await {
                warn!(order_id = %order.id, error = %e, "execution sink rejected confirmed order");
            }
        }

        // Adaptation runs off the aggregator classification only
        let mut profile_switched = false;
        if let Some(composite) = &composite {
            let pnl = snapshot.positions.total_value(price) - self.initial_value.unwrap_or(0.0);
            if let Some(outcome) = self.adaptive.observe(composite.trend, &snapshot, pnl, now) {
                profile_switched = true;
                for proposal in &outcome.cancels {
                    if self.dry_run {
                        info!(order_id = %proposal.order_id, reason = %proposal.reason, "dry run: cancel proposal");
                    } else if let Err(e) = sink.cancel_order(proposal).await {
                        warn!(order_id = %proposal.order_id, error = %e, "cancel proposal failed");
                    }
                }
                for action in &outcome.rebalance {
                    if self.dry_run {
                        info!(side = %action.side, quantity = action.quantity, reason = %action.reason, "dry run: rebalance proposal");
                    } else if let Err(e) = sink.rebalance(action).await {
                        warn!(error = %e, "rebalance proposal failed");
                    }
                }
            }
        }

        CycleSummary {
            decision,
            composite,
            created_order,
            confirmed,
            profile_switched,
        }
    }

    /// Read-only monitoring snapshot (up to one cycle stale by design)
    pub fn monitor_snapshot(&self, now: i64) -> ValidatorSnapshot {
        self.validator.snapshot(now)
    }

    /// The strategy profile currently in force
    pub fn active_profile(&self) -> &crate::adaptive::AdaptiveConfig {
        self.adaptive.active()
    }
}
