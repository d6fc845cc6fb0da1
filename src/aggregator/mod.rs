//! Trend aggregator - fuses heterogeneous signal sources
//!
//! Fans out to every enabled source with an independent timeout, then folds
//! the answered observations into one composite [0, 100] score. A slow or
//! failing source never blocks the rest; its weight is simply omitted, so
//! confidence reflects how much of the configured weight mass answered.

pub mod sources;

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::types::{CompositeTrend, MarketSnapshot, TrendBias, TrendObservation};
use sources::TrendSource;

/// Score above this classifies BULLISH
const BULLISH_FLOOR: f64 = 60.0;
/// Score below this classifies BEARISH
const BEARISH_CEIL: f64 = 40.0;

pub struct TrendAggregator {
    sources: Vec<Arc<dyn TrendSource>>,
    fetch_timeout: Duration,
}

impl TrendAggregator {
    pub fn new(sources: Vec<Arc<dyn TrendSource>>, fetch_timeout: Duration) -> Self {
        Self {
            sources,
            fetch_timeout,
        }
    }

    /// Collect one observation per source, dropping failures and timeouts
    async fn collect(&self, snapshot: &Arc<MarketSnapshot>) -> Vec<(f64, TrendObservation)> {
        let tasks: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let snapshot = Arc::clone(snapshot);
                let deadline = self.fetch_timeout;
                tokio::spawn(async move {
                    let weight = source.weight();
                    let id = source.id();
                    let result =
                        tokio::time::timeout(deadline, source.observe(&snapshot)).await;
                    (id, weight, result)
                })
            })
            .collect();

        let mut answered = Vec::with_capacity(self.sources.len());
        for joined in join_all(tasks).await {
            let (id, weight, result) = match joined {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "source task panicked, dropping its weight");
                    continue;
                }
            };
            match result {
                Ok(Ok(obs)) => answered.push((weight, obs)),
                Ok(Err(e)) => {
                    warn!(source = %id, error = %e, "source failed, dropping its weight");
                }
                Err(_) => {
                    warn!(source = %id, timeout = ?self.fetch_timeout, "source timed out, dropping its weight");
                }
            }
        }
        answered
    }

    /// Produce the composite trend for this cycle.
    ///
    /// Errors with `SourceUnavailable` only when every source failed;
    /// otherwise returns a best-effort result whose confidence equals the
    /// answered weight mass.
    pub async fn aggregate(
        &self,
        snapshot: &Arc<MarketSnapshot>,
    ) -> Result<CompositeTrend, CoreError> {
        let answered = self.collect(snapshot).await;

        if answered.is_empty() {
            return Err(CoreError::SourceUnavailable(
                "all trend sources failed or timed out".into(),
            ));
        }

        let mut score = 50.0;
        let mut confidence = 0.0;
        let mut source_ids = Vec::with_capacity(answered.len());

        for (weight, obs) in &answered {
            score += (obs.sub_score - 50.0) * weight;
            confidence += weight;
            source_ids.push(obs.source);
            debug!(
                source = %obs.source,
                sub_score = obs.sub_score,
                weight,
                direction = %obs.direction,
                "source observation"
            );
        }

        let score = score.clamp(0.0, 100.0);
        let trend = if score > BULLISH_FLOOR {
            TrendBias::Bullish
        } else if score < BEARISH_CEIL {
            TrendBias::Bearish
        } else {
            TrendBias::Neutral
        };

        Ok(CompositeTrend {
            trend,
            score,
            confidence: confidence.clamp(0.0, 1.0),
            sources: source_ids,
            ts: snapshot.tick.ts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        IndicatorSet, MarketTick, Positions, SourceId, SourceMetrics, TrendDirection,
    };
    use async_trait::async_trait;

    struct StaticSource {
        id: SourceId,
        weight: f64,
        sub_score: f64,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl TrendSource for StaticSource {
        fn id(&self) -> SourceId {
            self.id
        }

        fn weight(&self) -> f64 {
            self.weight
        }

        async fn observe(
            &self,
            snapshot: &MarketSnapshot,
        ) -> Result<TrendObservation, CoreError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(CoreError::SourceUnavailable("down".into()));
            }
            Ok(TrendObservation {
                source: self.id,
                direction: TrendDirection::Neutral,
                confidence: 0.5,
                sub_score: self.sub_score,
                metrics: SourceMetrics::Sentiment {
                    index: self.sub_score,
                },
                ts: snapshot.tick.ts,
            })
        }
    }

    fn snapshot() -> Arc<MarketSnapshot> {
        Arc::new(MarketSnapshot {
            tick: MarketTick {
                ts: 1_000,
                bid: 49_999.5,
                ask: 50_000.5,
                last: 50_000.0,
                volatility: 0.01,
            },
            indicators: IndicatorSet::default(),
            positions: Positions::default(),
            open_orders: vec![],
            sentiment_index: None,
        })
    }

    fn src(id: SourceId, weight: f64, sub_score: f64) -> Arc<dyn TrendSource> {
        Arc::new(StaticSource {
            id,
            weight,
            sub_score,
            fail: false,
            delay: None,
        })
    }

    #[tokio::test]
    async fn weighted_scores_combine_around_fifty() {
        let agg = TrendAggregator::new(
            vec![
                src(SourceId::MarketMomentum, 0.4, 80.0),
                src(SourceId::Technical, 0.4, 70.0),
                src(SourceId::Sentiment, 0.2, 50.0),
            ],
            Duration::from_secs(1),
        );
        let composite = agg.aggregate(&snapshot()).await.unwrap();
        // 50 + 30*0.4 + 20*0.4 + 0*0.2 = 70
        assert!((composite.score - 70.0).abs() < 1e-9);
        assert_eq!(composite.trend, TrendBias::Bullish);
        assert!((composite.confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failed_source_degrades_confidence_not_result() {
        let agg = TrendAggregator::new(
            vec![
                src(SourceId::MarketMomentum, 0.4, 20.0),
                Arc::new(StaticSource {
                    id: SourceId::Technical,
                    weight: 0.4,
                    sub_score: 0.0,
                    fail: true,
                    delay: None,
                }),
                src(SourceId::Sentiment, 0.2, 30.0),
            ],
            Duration::from_secs(1),
        );
        let composite = agg.aggregate(&snapshot()).await.unwrap();
        // 50 - 30*0.4 - 20*0.2 = 34
        assert!((composite.score - 34.0).abs() < 1e-9);
        assert_eq!(composite.trend, TrendBias::Bearish);
        assert!((composite.confidence - 0.6).abs() < 1e-9);
        assert_eq!(composite.sources.len(), 2);
    }

    #[tokio::test]
    async fn slow_source_is_timed_out_without_blocking_others() {
        let agg = TrendAggregator::new(
            vec![
                src(SourceId::MarketMomentum, 0.4, 65.0),
                Arc::new(StaticSource {
                    id: SourceId::Sentiment,
                    weight: 0.6,
                    sub_score: 90.0,
                    fail: false,
                    delay: Some(Duration::from_secs(5)),
                }),
            ],
            Duration::from_millis(50),
        );
        let composite = agg.aggregate(&snapshot()).await.unwrap();
        assert_eq!(composite.sources.len(), 1);
        assert!((composite.confidence - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn all_sources_failing_is_source_unavailable() {
        let agg = TrendAggregator::new(
            vec![Arc::new(StaticSource {
                id: SourceId::Technical,
                weight: 1.0,
                sub_score: 0.0,
                fail: true,
                delay: None,
            })],
            Duration::from_secs(1),
        );
        let err = agg.aggregate(&snapshot()).await.unwrap_err();
        assert!(matches!(err, CoreError::SourceUnavailable(_)));
    }
}
