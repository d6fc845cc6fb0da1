//! Market sentiment index source
//!
//! Uses the raw index value directly as a sub-score (fear-and-greed style,
//! already on a 0-100 scale). Prefers a payload pre-fetched by the data
//! collaborator; falls back to a bounded HTTP fetch otherwise.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::aggregator::sources::{confidence_for, direction_for, ensure_finite, TrendSource};
use crate::error::CoreError;
use crate::types::{MarketSnapshot, SourceId, SourceMetrics, TrendObservation};

#[derive(Debug, Deserialize)]
struct FngResponse {
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
}

pub struct SentimentSource {
    weight: f64,
    url: String,
    client: reqwest::Client,
}

impl SentimentSource {
    pub fn new(weight: f64, url: String, fetch_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .context("Failed to create sentiment HTTP client")?;
        Ok(Self {
            weight,
            url,
            client,
        })
    }

    async fn fetch_index(&self) -> Result<f64, CoreError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CoreError::SourceUnavailable(format!("sentiment fetch: {}", e)))?;

        let body: FngResponse = response
            .json()
            .await
            .map_err(|e| CoreError::SourceUnavailable(format!("sentiment decode: {}", e)))?;

        let entry = body.data.first().ok_or_else(|| {
            CoreError::InsufficientData {
                source: SourceId::Sentiment,
                detail: "empty index payload".into(),
            }
        })?;

        entry.value.parse::<f64>().map_err(|_| CoreError::InvalidSignal {
            source: SourceId::Sentiment,
            detail: format!("non-numeric index value {:?}", entry.value),
        })
    }

    fn observation(&self, index: f64, ts: i64) -> Result<TrendObservation, CoreError> {
        let index = ensure_finite(index, self.id(), "index")?;
        if !(0.0..=100.0).contains(&index) {
            return Err(CoreError::InvalidSignal {
                source: self.id(),
                detail: format!("index {} outside [0, 100]", index),
            });
        }

        // The index is already a 0-100 score centered at 50
        Ok(TrendObservation {
            source: self.id(),
            direction: direction_for(index),
            confidence: confidence_for(index),
            sub_score: index,
            metrics: SourceMetrics::Sentiment { index },
            ts,
        })
    }
}

#[async_trait]
impl TrendSource for SentimentSource {
    fn id(&self) -> SourceId {
        SourceId::Sentiment
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn observe(&self, snapshot: &MarketSnapshot) -> Result<TrendObservation, CoreError> {
        let index = match snapshot.sentiment_index {
            Some(index) => index,
            None => self.fetch_index().await?,
        };
        self.observation(index, snapshot.tick.ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IndicatorSet, MarketTick, Positions, TrendDirection};

    fn source() -> SentimentSource {
        SentimentSource::new(0.2, "http://localhost/unused".into(), Duration::from_secs(1))
            .unwrap()
    }

    fn snapshot(index: Option<f64>) -> MarketSnapshot {
        MarketSnapshot {
            tick: MarketTick {
                ts: 0,
                bid: 49_999.5,
                ask: 50_000.5,
                last: 50_000.0,
                volatility: 0.01,
            },
            indicators: IndicatorSet::default(),
            positions: Positions::default(),
            open_orders: vec![],
            sentiment_index: index,
        }
    }

    #[tokio::test]
    async fn prefetched_index_is_used_directly() {
        let obs = source().observe(&snapshot(Some(72.0))).await.unwrap();
        assert_eq!(obs.sub_score, 72.0);
        assert_eq!(obs.direction, TrendDirection::Up);
        assert!((obs.confidence - 0.44).abs() < 1e-9);
    }

    #[tokio::test]
    async fn out_of_range_index_is_invalid() {
        let err = source().observe(&snapshot(Some(140.0))).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignal { .. }));
    }
}
