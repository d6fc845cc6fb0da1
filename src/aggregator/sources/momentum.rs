//! External market momentum source
//!
//! Tracks the mid price across cycles and scores the short-horizon percent
//! change in magnitude buckets: small drifts stay near neutral, large moves
//! push the sub-score toward the extremes.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::aggregator::sources::{confidence_for, direction_for, ensure_finite, TrendSource};
use crate::error::CoreError;
use crate::types::{MarketSnapshot, SourceId, SourceMetrics, TrendObservation};

/// Number of mid samples retained for the lookback
const LOOKBACK_SAMPLES: usize = 10;

pub struct MomentumSource {
    weight: f64,
    /// (ts, mid) ring of recent cycle prices; single writer per cycle
    history: Mutex<VecDeque<(i64, f64)>>,
}

impl MomentumSource {
    pub fn new(weight: f64) -> Self {
        Self {
            weight,
            history: Mutex::new(VecDeque::with_capacity(LOOKBACK_SAMPLES)),
        }
    }

    /// Map a percent change to a sub-score bucket
    fn bucket(pct_change: f64) -> f64 {
        match pct_change {
            p if p >= 2.0 => 90.0,
            p if p >= 1.0 => 80.0,
            p if p >= 0.5 => 70.0,
            p if p >= 0.2 => 60.0,
            p if p > -0.2 => 50.0,
            p if p > -0.5 => 40.0,
            p if p > -1.0 => 30.0,
            p if p > -2.0 => 20.0,
            _ => 10.0,
        }
    }
}

#[async_trait]
impl TrendSource for MomentumSource {
    fn id(&self) -> SourceId {
        SourceId::MarketMomentum
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn observe(&self, snapshot: &MarketSnapshot) -> Result<TrendObservation, CoreError> {
        let mid = ensure_finite(snapshot.tick.mid(), self.id(), "mid")?;
        let volatility = ensure_finite(snapshot.tick.volatility, self.id(), "volatility")?;

        let oldest = {
            let mut history = self
                .history
                .lock()
                .map_err(|_| CoreError::SourceUnavailable("momentum history lock poisoned".into()))?;
            history.push_back((snapshot.tick.ts, mid));
            while history.len() > LOOKBACK_SAMPLES {
                history.pop_front();
            }
            if history.len() < 2 {
                None
            } else {
                history.front().copied()
            }
        };

        let Some((_, base)) = oldest else {
            // Not enough history yet: neutral reading, zero confidence
            return Ok(TrendObservation {
                source: self.id(),
                direction: crate::types::TrendDirection::Neutral,
                confidence: 0.0,
                sub_score: 50.0,
                metrics: SourceMetrics::Momentum {
                    pct_change: 0.0,
                    volatility,
                },
                ts: snapshot.tick.ts,
            });
        };

        if base <= 0.0 {
            return Err(CoreError::InvalidSignal {
                source: self.id(),
                detail: format!("non-positive base price {}", base),
            });
        }

        let pct_change = (mid - base) / base * 100.0;
        let sub_score = Self::bucket(pct_change);

        Ok(TrendObservation {
            source: self.id(),
            direction: direction_for(sub_score),
            confidence: confidence_for(sub_score),
            sub_score,
            metrics: SourceMetrics::Momentum {
                pct_change,
                volatility,
            },
            ts: snapshot.tick.ts,
        })
    }
}
