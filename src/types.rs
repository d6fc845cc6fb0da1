//! Core types used throughout TrendGate
//!
//! Defines common data structures for ticks, indicators, trend observations
//! and fused decisions.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized trend direction shared by all signal producers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendDirection {
    Up,
    Down,
    Neutral,
}

impl Default for TrendDirection {
    fn default() -> Self {
        TrendDirection::Neutral
    }
}

impl TrendDirection {
    /// Signed contribution of this direction (+1 / -1 / 0)
    pub fn sign(&self) -> f64 {
        match self {
            TrendDirection::Up => 1.0,
            TrendDirection::Down => -1.0,
            TrendDirection::Neutral => 0.0,
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "UP" | "BULLISH" | "BUY" => Some(TrendDirection::Up),
            "DOWN" | "BEARISH" | "SELL" => Some(TrendDirection::Down),
            "NEUTRAL" | "FLAT" => Some(TrendDirection::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Up => write!(f, "UP"),
            TrendDirection::Down => write!(f, "DOWN"),
            TrendDirection::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Composite trend classification produced by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendBias {
    Bullish,
    Bearish,
    Neutral,
}

impl Default for TrendBias {
    fn default() -> Self {
        TrendBias::Neutral
    }
}

impl TrendBias {
    pub fn as_direction(&self) -> TrendDirection {
        match self {
            TrendBias::Bullish => TrendDirection::Up,
            TrendBias::Bearish => TrendDirection::Down,
            TrendBias::Neutral => TrendDirection::Neutral,
        }
    }
}

impl fmt::Display for TrendBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendBias::Bullish => write!(f, "BULLISH"),
            TrendBias::Bearish => write!(f, "BEARISH"),
            TrendBias::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Order side for simulated and open orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Signal source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceId {
    /// External market momentum (short-horizon price change magnitude)
    MarketMomentum,
    /// Short-horizon technical indicators (RSI / EMA / MACD)
    Technical,
    /// Market sentiment index
    Sentiment,
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::MarketMomentum => write!(f, "market-momentum"),
            SourceId::Technical => write!(f, "technical"),
            SourceId::Sentiment => write!(f, "sentiment"),
        }
    }
}

impl std::error::Error for SourceId {}

/// Market tick consumed from the data collaborator each cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketTick {
    /// Timestamp in milliseconds
    pub ts: i64,
    /// Best bid price
    pub bid: f64,
    /// Best ask price
    pub ask: f64,
    /// Last traded price
    pub last: f64,
    /// Short-horizon volatility estimate
    pub volatility: f64,
}

impl MarketTick {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// Precomputed technical indicator set; fields are `None` while the
/// upstream indicator pipeline is still warming up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rsi: Option<f64>,
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub adx: Option<f64>,
}

/// Current holdings, consumed from the balance collaborator
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Positions {
    pub asset_qty: f64,
    pub cash_balance: f64,
}

impl Positions {
    /// Total portfolio value at the given price
    pub fn total_value(&self, price: f64) -> f64 {
        self.cash_balance + self.asset_qty * price
    }
}

/// An open order on the venue, as reported by the execution collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    pub id: String,
    pub side: OrderSide,
    pub price: f64,
    pub size: f64,
    /// Timestamp in milliseconds
    pub created_at: i64,
}

/// Everything the core consumes in one cycle
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub tick: MarketTick,
    pub indicators: IndicatorSet,
    pub positions: Positions,
    pub open_orders: Vec<OpenOrder>,
    /// Raw sentiment payload, when the collaborator pre-fetched one
    pub sentiment_index: Option<f64>,
}

/// Per-source raw metrics, tagged by source kind so each variant gets an
/// explicit normalization rule instead of duck-typed field access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceMetrics {
    Momentum {
        /// Percent change over the short lookback (e.g. 0.8 = +0.8%)
        pct_change: f64,
        /// Volatility at observation time
        volatility: f64,
    },
    Technical {
        rsi: f64,
        /// EMA-derived momentum in percent
        momentum_pct: f64,
        macd_histogram: f64,
    },
    Sentiment {
        /// Raw index value in [0, 100]
        index: f64,
    },
}

/// One normalized reading from a single source. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendObservation {
    pub source: SourceId,
    pub direction: TrendDirection,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Sub-score in [0, 100], centered at 50
    pub sub_score: f64,
    pub metrics: SourceMetrics,
    /// Timestamp in milliseconds
    pub ts: i64,
}

/// Weighted fusion of all available trend observations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeTrend {
    pub trend: TrendBias,
    /// Composite score in [0, 100], centered at 50
    pub score: f64,
    /// Answered weight mass in [0, 1]
    pub confidence: f64,
    /// Sources that answered in time
    pub sources: Vec<SourceId>,
    /// Timestamp in milliseconds
    pub ts: i64,
}

impl CompositeTrend {
    pub fn as_reading(&self) -> TrendReading {
        TrendReading {
            direction: self.trend.as_direction(),
            confidence: self.confidence,
        }
    }
}

/// A (direction, confidence) pair fed into the fusion engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReading {
    pub direction: TrendDirection,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl TrendReading {
    pub fn new(direction: TrendDirection, confidence: f64) -> Self {
        Self {
            direction,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Signed score in [-1, 1]
    pub fn signed_score(&self) -> f64 {
        self.direction.sign() * self.confidence
    }
}

/// Agreement level between the internal and external trend readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    Aligned,
    Partial,
    Divergent,
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alignment::Aligned => write!(f, "ALIGNED"),
            Alignment::Partial => write!(f, "PARTIAL"),
            Alignment::Divergent => write!(f, "DIVERGENT"),
        }
    }
}

/// Gated action emitted by the fusion engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Hold,
    BuySignal,
    SellSignal,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Hold => write!(f, "HOLD"),
            TradeAction::BuySignal => write!(f, "BUY_SIGNAL"),
            TradeAction::SellSignal => write!(f, "SELL_SIGNAL"),
        }
    }
}

/// One fused decision per cycle; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedDecision {
    /// Combined score in [-1, 1]
    pub combined_score: f64,
    pub action: TradeAction,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub alignment: Alignment,
    /// False when any safety veto fired
    pub can_trade: bool,
    /// Veto and degradation reasons, in the order they fired
    pub warnings: Vec<String>,
    /// Timestamp in milliseconds
    pub ts: i64,
}

/// Current time in milliseconds, the timestamp convention used throughout
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
