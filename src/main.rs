//! TrendGate runtime entry point
//!
//! Wires the four core components together and drives them from a fixed
//! interval tick. Venue connectivity is a collaborator concern; this binary
//! ships a random-walk demo feed and a logging execution sink so the core
//! runs end to end out of the box.

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trendgate::adaptive::{AdaptiveManager, CancelProposal, PositionAction};
use trendgate::aggregator::sources::{
    MomentumSource, SentimentSource, TechnicalSource, TrendSource,
};
use trendgate::aggregator::TrendAggregator;
use trendgate::config::AppConfig;
use trendgate::engine::{Engine, ExecutionSink, MarketFeed};
use trendgate::fusion::FusionEngine;
use trendgate::types::{now_ms, IndicatorSet, MarketSnapshot, MarketTick, Positions};
use trendgate::validator::{OrderValidator, SimulatedOrder};

/// Random-walk market feed for running the core without a venue
struct DemoFeed {
    price: f64,
    positions: Positions,
}

impl DemoFeed {
    fn new(start_price: f64, cash: f64) -> Self {
        Self {
            price: start_price,
            positions: Positions {
                asset_qty: 0.0,
                cash_balance: cash,
            },
        }
    }
}

#[async_trait]
impl MarketFeed for DemoFeed {
    async fn snapshot(&mut self) -> Result<MarketSnapshot> {
        let mut rng = rand::thread_rng();
        // +/-0.4% step per cycle
        let step = rng.gen_range(-0.004..0.004);
        self.price *= 1.0 + step;
        let spread = self.price * 0.0002;

        // Coarse indicator stand-ins derived from the walk itself
        let rsi = 50.0 + step * 5_000.0;
        Ok(MarketSnapshot {
            tick: MarketTick {
                ts: now_ms(),
                bid: self.price - spread / 2.0,
                ask: self.price + spread / 2.0,
                last: self.price,
                volatility: step.abs(),
            },
            indicators: IndicatorSet {
                rsi: Some(rsi.clamp(5.0, 95.0)),
                ema_short: Some(self.price),
                ema_long: Some(self.price * (1.0 - step)),
                macd: Some(step * 100.0),
                macd_signal: Some(0.0),
                adx: Some(25.0),
            },
            positions: self.positions,
            open_orders: vec![],
            sentiment_index: None,
        })
    }
}

/// Execution sink that only logs; order placement lives in a collaborator
struct LoggingSink;

#[async_trait]
impl ExecutionSink for LoggingSink {
    async fn submit_confirmed(&mut self, order: &SimulatedOrder) -> Result<()> {
        info!(
            order_id = %order.id,
            side = %order.side,
            quantity = order.quantity,
            price = order.current_price,
            "➡️ confirmed order forwarded to execution"
        );
        Ok(())
    }

    async fn cancel_order(&mut self, proposal: &CancelProposal) -> Result<()> {
        info!(order_id = %proposal.order_id, reason = %proposal.reason, "➡️ cancel proposed");
        Ok(())
    }

    async fn rebalance(&mut self, action: &PositionAction) -> Result<()> {
        info!(side = %action.side, quantity = action.quantity, reason = %action.reason, "➡️ rebalance proposed");
        Ok(())
    }
}

fn build_sources(config: &AppConfig) -> Result<Vec<Arc<dyn TrendSource>>> {
    let src = &config.sources;
    let mut sources: Vec<Arc<dyn TrendSource>> = Vec::new();
    if src.momentum_enabled {
        sources.push(Arc::new(MomentumSource::new(src.momentum_weight)));
    }
    if src.technical_enabled {
        sources.push(Arc::new(TechnicalSource::new(src.technical_weight)));
    }
    if src.sentiment_enabled {
        sources.push(Arc::new(SentimentSource::new(
            src.sentiment_weight,
            src.sentiment_url.clone(),
            Duration::from_secs(src.fetch_timeout_secs),
        )?));
    }
    Ok(sources)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::load()?;
    info!("🚀 TrendGate starting: {}", config.digest());

    let sources = build_sources(&config)?;
    let aggregator = TrendAggregator::new(
        sources,
        Duration::from_secs(config.sources.fetch_timeout_secs),
    );
    let mut engine = Engine::new(
        aggregator,
        FusionEngine::new(config.fusion.clone()),
        OrderValidator::new(config.validator.clone()),
        AdaptiveManager::new(config.adaptive.clone()),
        config.bot.dry_run,
    );

    let mut feed = DemoFeed::new(100_000.0, 10_000.0);
    let mut sink = LoggingSink;

    let mut ticker = tokio::time::interval(Duration::from_secs(config.bot.cycle_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("⏱️ cycle loop running every {}s", config.bot.cycle_interval_secs);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("👋 shutdown requested");
                break;
            }
        }

        let snapshot = match feed.snapshot().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "market feed unavailable this cycle");
                continue;
            }
        };
        let now = snapshot.tick.ts;

        let summary = engine.process_cycle(snapshot, &mut sink).await;
        info!(
            action = %summary.decision.action,
            alignment = %summary.decision.alignment,
            combined = format!("{:.3}", summary.decision.combined_score),
            can_trade = summary.decision.can_trade,
            confirmed = summary.confirmed,
            profile = %engine.active_profile().strategy_name,
            "cycle complete"
        );

        // Monitoring snapshot, eventually consistent by design
        match serde_json::to_string(&engine.monitor_snapshot(now)) {
            Ok(json) => info!(target: "trendgate::monitor", snapshot = %json, "validator state"),
            Err(e) => warn!(error = %e, "snapshot serialization failed"),
        }
    }

    Ok(())
}
