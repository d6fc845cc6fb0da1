//! Decision fusion engine
//!
//! Blends the bot-local trend reading with the aggregator's external one
//! into a single gated decision. The engine never errors: every cycle yields
//! a `FusedDecision` with `can_trade` explicit and each veto spelled out in
//! the warnings, so a degraded signal defaults to HOLD instead of failing.

use tracing::debug;

use crate::config::FusionConfig;
use crate::types::{Alignment, FusedDecision, TradeAction, TrendDirection, TrendReading};

pub struct FusionEngine {
    config: FusionConfig,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    fn alignment(internal: TrendDirection, external: TrendDirection) -> Alignment {
        if internal == external {
            Alignment::Aligned
        } else if internal == TrendDirection::Neutral || external == TrendDirection::Neutral {
            Alignment::Partial
        } else {
            Alignment::Divergent
        }
    }

    fn multiplier(&self, alignment: Alignment) -> f64 {
        match alignment {
            Alignment::Aligned => self.config.aligned_boost,
            Alignment::Partial => self.config.partial_multiplier,
            Alignment::Divergent => self.config.divergent_multiplier,
        }
    }

    /// Fuse one cycle's internal and external readings
    pub fn fuse(&self, internal: TrendReading, external: TrendReading, ts: i64) -> FusedDecision {
        let cfg = &self.config;
        let alignment = Self::alignment(internal.direction, external.direction);

        let internal_score = internal.signed_score();
        let external_score = external.signed_score();
        let combined =
            internal_score * cfg.internal_weight + external_score * cfg.external_weight;

        let action = if combined.abs() < cfg.hold_band {
            TradeAction::Hold
        } else if combined > 0.0 {
            TradeAction::BuySignal
        } else {
            TradeAction::SellSignal
        };

        let mut warnings = Vec::new();
        let mut can_trade = true;

        // Divergence always vetoes, regardless of confidence
        if alignment == Alignment::Divergent {
            can_trade = false;
            warnings.push(format!(
                "divergent signals: internal {} vs external {}",
                internal.direction, external.direction
            ));
        }
        if internal.confidence < cfg.min_internal_confidence && alignment != Alignment::Aligned {
            can_trade = false;
            warnings.push(format!(
                "internal confidence {:.2} below minimum {:.2} without alignment",
                internal.confidence, cfg.min_internal_confidence
            ));
        }
        if combined.abs() < cfg.veto_band && alignment != Alignment::Aligned {
            can_trade = false;
            warnings.push(format!(
                "combined score {:.2} inside veto band {:.2} without alignment",
                combined, cfg.veto_band
            ));
        }

        let confidence = if alignment == Alignment::Aligned {
            ((internal.confidence + external.confidence) / 2.0 * cfg.aligned_boost).min(1.0)
        } else {
            (combined.abs() * self.multiplier(alignment)).clamp(0.0, 1.0)
        };

        debug!(
            %action,
            %alignment,
            combined = format!("{:.3}", combined),
            confidence = format!("{:.3}", confidence),
            can_trade,
            "fused decision"
        );

        FusedDecision {
            combined_score: combined.clamp(-1.0, 1.0),
            action,
            confidence,
            alignment,
            can_trade,
            warnings,
            ts,
        }
    }
}
