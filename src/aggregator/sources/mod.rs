//! Trend source implementations
//!
//! Each source normalizes its own raw metrics into a sub-score in [0, 100]
//! centered at 50, plus a direction and confidence. Sources fail
//! independently; the aggregator drops a failed source's weight and carries
//! on with the rest.

mod momentum;
mod sentiment;
mod technical;

pub use momentum::MomentumSource;
pub use sentiment::SentimentSource;
pub use technical::TechnicalSource;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::{MarketSnapshot, SourceId, TrendDirection, TrendObservation};

/// A single trend signal source with a fixed fusion weight
#[async_trait]
pub trait TrendSource: Send + Sync {
    fn id(&self) -> SourceId;

    /// Fixed weight of this source in the composite score
    fn weight(&self) -> f64;

    /// Produce one normalized observation for this cycle
    async fn observe(&self, snapshot: &MarketSnapshot) -> Result<TrendObservation, CoreError>;
}

/// Direction implied by a sub-score (same bands the aggregator uses for the
/// composite: >60 up, <40 down)
pub(crate) fn direction_for(sub_score: f64) -> TrendDirection {
    if sub_score > 60.0 {
        TrendDirection::Up
    } else if sub_score < 40.0 {
        TrendDirection::Down
    } else {
        TrendDirection::Neutral
    }
}

/// Confidence implied by how far a sub-score sits from neutral
pub(crate) fn confidence_for(sub_score: f64) -> f64 {
    ((sub_score - 50.0).abs() / 50.0).clamp(0.0, 1.0)
}

/// Reject NaN / infinite metrics before they can poison the composite
pub(crate) fn ensure_finite(value: f64, source: SourceId, name: &str) -> Result<f64, CoreError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CoreError::InvalidSignal {
            source,
            detail: format!("{} is not finite: {}", name, value),
        })
    }
}
