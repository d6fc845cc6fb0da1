//! Adaptive strategy manager
//!
//! Watches the aggregator's trend classification and only switches the
//! active strategy profile after several consecutive agreeing cycles, which
//! damps whipsaw. A confirmed switch replaces the active profile wholesale,
//! appends an audit record and derives rebalance / cancellation proposals
//! for the execution collaborator. Nothing here places orders or moves
//! funds.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{AdaptiveManagerConfig, ProfileConfig};
use crate::types::{MarketSnapshot, OrderSide, TrendBias};

/// The strategy profile currently in force; replaced wholesale on a
/// confirmed trend switch.
#[derive(Debug, Clone, Serialize)]
pub struct AdaptiveConfig {
    pub trend: TrendBias,
    pub strategy_name: String,
    pub spread_pct: f64,
    pub min_spread_pct: f64,
    pub max_spread_pct: f64,
    pub order_size: f64,
    pub max_position: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub buy_bias: f64,
    pub sell_bias: f64,
    pub max_order_age_secs: u64,
}

impl AdaptiveConfig {
    fn from_profile(trend: TrendBias, profile: &ProfileConfig) -> Self {
        Self {
            trend,
            strategy_name: profile.strategy_name.clone(),
            spread_pct: profile.spread_pct,
            min_spread_pct: profile.min_spread_pct,
            max_spread_pct: profile.max_spread_pct,
            order_size: profile.order_size,
            max_position: profile.max_position,
            stop_loss_pct: profile.stop_loss_pct,
            take_profit_pct: profile.take_profit_pct,
            buy_bias: profile.buy_bias,
            sell_bias: profile.sell_bias,
            max_order_age_secs: profile.max_order_age_secs,
        }
    }
}

/// Append-only audit entry for every confirmed switch
#[derive(Debug, Clone, Serialize)]
pub struct AdaptationRecord {
    /// Timestamp in milliseconds
    pub ts: i64,
    pub trend: TrendBias,
    pub strategy_name: String,
    pub pnl_at_switch: f64,
    pub reason: String,
}

/// Proposed position rebalancing, applied by the execution collaborator
#[derive(Debug, Clone, Serialize)]
pub struct PositionAction {
    pub side: OrderSide,
    pub quantity: f64,
    pub reason: String,
}

/// Proposed cancellation of an open order
#[derive(Debug, Clone, Serialize)]
pub struct CancelProposal {
    pub order_id: String,
    pub reason: String,
    pub side: OrderSide,
    pub price: f64,
}

/// Everything a confirmed trend switch produces
#[derive(Debug, Clone)]
pub struct AdaptationOutcome {
    pub config: AdaptiveConfig,
    pub rebalance: Vec<PositionAction>,
    pub cancels: Vec<CancelProposal>,
}

pub struct AdaptiveManager {
    config: AdaptiveManagerConfig,
    last_trend: TrendBias,
    streak: u32,
    active: AdaptiveConfig,
    history: Vec<AdaptationRecord>,
}

impl AdaptiveManager {
    pub fn new(config: AdaptiveManagerConfig) -> Self {
        let active = AdaptiveConfig::from_profile(TrendBias::Neutral, &config.neutral);
        Self {
            config,
            last_trend: TrendBias::Neutral,
            streak: 0,
            active,
            history: Vec::new(),
        }
    }

    fn profile_for(&self, trend: TrendBias) -> &ProfileConfig {
        match trend {
            TrendBias::Bullish => &self.config.up,
            TrendBias::Bearish => &self.config.down,
            TrendBias::Neutral => &self.config.neutral,
        }
    }

    /// Feed one cycle's trend classification. Returns an outcome only when
    /// a confirmed switch replaces the active profile.
    pub fn observe(
        &mut self,
        trend: TrendBias,
        snapshot: &MarketSnapshot,
        pnl: f64,
        now: i64,
    ) -> Option<AdaptationOutcome> {
        if trend == self.last_trend {
            self.streak += 1;
        } else {
            self.last_trend = trend;
            self.streak = 1;
        }
        debug!(%trend, streak = self.streak, "trend classification observed");

        if self.streak < self.config.trend_change_threshold {
            return None;
        }
        // Confirmed, but a trend that stays confirmed does not re-switch
        if trend == self.active.trend {
            return None;
        }

        let new_config = AdaptiveConfig::from_profile(trend, self.profile_for(trend));
        let reason = format!(
            "trend {} confirmed after {} consecutive cycles",
            trend, self.streak
        );
        info!(
            %trend,
            strategy = %new_config.strategy_name,
            pnl_at_switch = pnl,
            "strategy profile switched"
        );

        self.history.push(AdaptationRecord {
            ts: now,
            trend,
            strategy_name: new_config.strategy_name.clone(),
            pnl_at_switch: pnl,
            reason,
        });
        if self.history.len() > self.config.history_cap {
            let overflow = self.history.len() - self.config.history_cap;
            self.history.drain(..overflow);
        }

        self.active = new_config.clone();

        Some(AdaptationOutcome {
            rebalance: self.derive_rebalance(trend, snapshot),
            cancels: self.derive_cancels(trend, snapshot),
            config: new_config,
        })
    }

    /// Convert idle cash into the asset in an up-trend, trim exposure in a
    /// down-trend
    fn derive_rebalance(&self, trend: TrendBias, snapshot: &MarketSnapshot) -> Vec<PositionAction> {
        let price = snapshot.tick.mid();
        if price <= 0.0 {
            return Vec::new();
        }
        let positions = &snapshot.positions;
        let total = positions.total_value(price);
        if total <= 0.0 {
            return Vec::new();
        }
        let holdings_value = positions.asset_qty * price;
        let holdings_frac = holdings_value / total;
        let mut actions = Vec::new();

        match trend {
            TrendBias::Bullish => {
                if holdings_frac < self.config.min_holdings_frac {
                    let target_value = self.config.min_holdings_frac * total;
                    let affordable = positions.cash_balance / price;
                    let quantity = ((target_value - holdings_value) / price).min(affordable);
                    if quantity > 0.0 {
                        actions.push(PositionAction {
                            side: OrderSide::Buy,
                            quantity,
                            reason: format!(
                                "up-trend: holdings {:.1}% of portfolio below {:.1}% floor",
                                holdings_frac * 100.0,
                                self.config.min_holdings_frac * 100.0
                            ),
                        });
                    }
                }
            }
            TrendBias::Bearish => {
                if holdings_frac > self.config.max_exposure_frac {
                    let quantity = positions.asset_qty * self.config.downtrend_liquidation_frac;
                    if quantity > 0.0 {
                        actions.push(PositionAction {
                            side: OrderSide::Sell,
                            quantity,
                            reason: format!(
                                "down-trend: exposure {:.1}% of portfolio above {:.1}% ceiling",
                                holdings_frac * 100.0,
                                self.config.max_exposure_frac * 100.0
                            ),
                        });
                    }
                }
            }
            TrendBias::Neutral => {}
        }

        actions
    }

    /// Flag open orders priced far from market, or whose side conflicts
    /// with the newly confirmed trend while sitting too close to it
    fn derive_cancels(&self, trend: TrendBias, snapshot: &MarketSnapshot) -> Vec<CancelProposal> {
        let price = snapshot.tick.mid();
        if price <= 0.0 {
            return Vec::new();
        }
        let mut cancels = Vec::new();

        for order in &snapshot.open_orders {
            let distance = (order.price - price).abs() / price;
            if distance > self.config.stale_distance_pct {
                cancels.push(CancelProposal {
                    order_id: order.id.clone(),
                    reason: format!("stale: {:.1}% from market", distance * 100.0),
                    side: order.side,
                    price: order.price,
                });
                continue;
            }
            let conflicting = matches!(
                (trend, order.side),
                (TrendBias::Bullish, OrderSide::Sell) | (TrendBias::Bearish, OrderSide::Buy)
            );
            if conflicting && distance < self.config.conflict_proximity_pct {
                cancels.push(CancelProposal {
                    order_id: order.id.clone(),
                    reason: format!(
                        "{} order conflicts with confirmed {} trend at {:.1}% from market",
                        order.side,
                        trend,
                        distance * 100.0
                    ),
                    side: order.side,
                    price: order.price,
                });
            }
        }

        cancels
    }

    /// The profile currently in force
    pub fn active(&self) -> &AdaptiveConfig {
        &self.active
    }

    pub fn history(&self) -> &[AdaptationRecord] {
        &self.history
    }
}
