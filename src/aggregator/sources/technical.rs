//! Short-horizon technical source
//!
//! Combines the precomputed RSI, EMA spread and MACD histogram into one
//! sub-score. Indicator arithmetic happens upstream; this source only
//! normalizes already-computed values.

use async_trait::async_trait;
use tracing::debug;

use crate::aggregator::sources::{confidence_for, direction_for, ensure_finite, TrendSource};
use crate::error::CoreError;
use crate::types::{MarketSnapshot, SourceId, SourceMetrics, TrendDirection, TrendObservation};

pub struct TechnicalSource {
    weight: f64,
}

impl TechnicalSource {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }

    fn score(rsi: f64, momentum_pct: f64, macd_histogram: f64) -> f64 {
        let mut score = 50.0;

        // RSI: trend-following read, not mean-reversion
        if rsi > 60.0 {
            score += 15.0;
        } else if rsi < 40.0 {
            score -= 15.0;
        }

        // EMA spread momentum, saturating at +/-1%
        score += (momentum_pct / 1.0).clamp(-1.0, 1.0) * 20.0;

        // MACD histogram sign
        if macd_histogram > 0.0 {
            score += 10.0;
        } else if macd_histogram < 0.0 {
            score -= 10.0;
        }

        score.clamp(0.0, 100.0)
    }
}

#[async_trait]
impl TrendSource for TechnicalSource {
    fn id(&self) -> SourceId {
        SourceId::Technical
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn observe(&self, snapshot: &MarketSnapshot) -> Result<TrendObservation, CoreError> {
        let ind = &snapshot.indicators;

        let (Some(rsi), Some(ema_short), Some(ema_long)) = (ind.rsi, ind.ema_short, ind.ema_long)
        else {
            // Indicator pipeline still warming up: neutral, zero confidence
            debug!(source = %self.id(), "indicators warming up, contributing neutral");
            return Ok(TrendObservation {
                source: self.id(),
                direction: TrendDirection::Neutral,
                confidence: 0.0,
                sub_score: 50.0,
                metrics: SourceMetrics::Technical {
                    rsi: 50.0,
                    momentum_pct: 0.0,
                    macd_histogram: 0.0,
                },
                ts: snapshot.tick.ts,
            });
        };

        let rsi = ensure_finite(rsi, self.id(), "rsi")?;
        let ema_short = ensure_finite(ema_short, self.id(), "ema_short")?;
        let ema_long = ensure_finite(ema_long, self.id(), "ema_long")?;
        if ema_long <= 0.0 {
            return Err(CoreError::InvalidSignal {
                source: self.id(),
                detail: format!("non-positive ema_long {}", ema_long),
            });
        }

        let macd_histogram = match (ind.macd, ind.macd_signal) {
            (Some(m), Some(s)) => ensure_finite(m - s, self.id(), "macd_histogram")?,
            _ => 0.0,
        };

        let momentum_pct = (ema_short - ema_long) / ema_long * 100.0;
        let sub_score = Self::score(rsi, momentum_pct, macd_histogram);

        Ok(TrendObservation {
            source: self.id(),
            direction: direction_for(sub_score),
            confidence: confidence_for(sub_score),
            sub_score,
            metrics: SourceMetrics::Technical {
                rsi,
                momentum_pct,
                macd_histogram,
            },
            ts: snapshot.tick.ts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IndicatorSet, MarketTick, Positions};

    fn snapshot(indicators: IndicatorSet) -> MarketSnapshot {
        MarketSnapshot {
            tick: MarketTick {
                ts: 0,
                bid: 49_999.5,
                ask: 50_000.5,
                last: 50_000.0,
                volatility: 0.01,
            },
            indicators,
            positions: Positions::default(),
            open_orders: vec![],
            sentiment_index: None,
        }
    }

    #[tokio::test]
    async fn warmup_yields_neutral_zero_confidence() {
        let source = TechnicalSource::new(0.4);
        let obs = source.observe(&snapshot(IndicatorSet::default())).await.unwrap();
        assert_eq!(obs.direction, TrendDirection::Neutral);
        assert_eq!(obs.confidence, 0.0);
        assert_eq!(obs.sub_score, 50.0);
    }

    #[tokio::test]
    async fn bullish_indicators_score_above_sixty() {
        let source = TechnicalSource::new(0.4);
        let obs = source
            .observe(&snapshot(IndicatorSet {
                rsi: Some(68.0),
                ema_short: Some(50_500.0),
                ema_long: Some(50_000.0),
                macd: Some(12.0),
                macd_signal: Some(5.0),
                adx: Some(30.0),
            }))
            .await
            .unwrap();
        assert!(obs.sub_score > 60.0);
        assert_eq!(obs.direction, TrendDirection::Up);
    }

    #[tokio::test]
    async fn nan_rsi_is_invalid() {
        let source = TechnicalSource::new(0.4);
        let err = source
            .observe(&snapshot(IndicatorSet {
                rsi: Some(f64::NAN),
                ema_short: Some(50_000.0),
                ema_long: Some(50_000.0),
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignal { .. }));
    }
}
