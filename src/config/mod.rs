//! Configuration management for TrendGate
//!
//! Loads from YAML files + environment variables via .env. Every component
//! receives its own immutable config section at construction; there is no
//! global state.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub sources: SourcesConfig,
    pub fusion: FusionConfig,
    pub validator: ValidatorConfig,
    pub adaptive: AdaptiveManagerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Bot version tag for logging
    pub tag: String,
    /// Asset label used in logs and proposals
    pub asset: String,
    /// Cycle tick interval in seconds
    pub cycle_interval_secs: u64,
    /// Dry run mode (confirmed orders are logged, not forwarded)
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Enable the external market momentum source
    pub momentum_enabled: bool,
    /// Enable the short-horizon technical source
    pub technical_enabled: bool,
    /// Enable the sentiment index source
    pub sentiment_enabled: bool,
    /// Fixed weight per source; enabled weights must sum to 1.0
    pub momentum_weight: f64,
    pub technical_weight: f64,
    pub sentiment_weight: f64,
    /// Per-source fetch timeout in seconds
    pub fetch_timeout_secs: u64,
    /// Sentiment index endpoint
    pub sentiment_url: String,
}

impl SourcesConfig {
    /// Enabled weights must sum to 1.0 (within float tolerance)
    pub fn validate(&self) -> Result<()> {
        let mut sum = 0.0;
        if self.momentum_enabled {
            sum += self.momentum_weight;
        }
        if self.technical_enabled {
            sum += self.technical_weight;
        }
        if self.sentiment_enabled {
            sum += self.sentiment_weight;
        }
        if !self.momentum_enabled && !self.technical_enabled && !self.sentiment_enabled {
            bail!("at least one trend source must be enabled");
        }
        if (sum - 1.0).abs() > 1e-6 {
            bail!("enabled source weights must sum to 1.0, got {:.4}", sum);
        }
        Ok(())
    }
}

/// Decision fusion constants. Defaults follow the documented strategy
/// figures; all of them are tunable.
#[derive(Debug, Clone, Deserialize)]
pub struct FusionConfig {
    /// Weight of the internal (bot-local) score
    pub internal_weight: f64,
    /// Weight of the external (aggregator) score
    pub external_weight: f64,
    /// |combined| below this is a HOLD
    pub hold_band: f64,
    /// |combined| below this vetoes unless alignment is ALIGNED
    pub veto_band: f64,
    /// Internal confidence below this vetoes unless alignment is ALIGNED
    pub min_internal_confidence: f64,
    /// Confidence boost when both sides agree
    pub aligned_boost: f64,
    /// Multiplier when either side is neutral
    pub partial_multiplier: f64,
    /// Multiplier when the sides strictly oppose
    pub divergent_multiplier: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            internal_weight: 0.6,
            external_weight: 0.4,
            hold_band: 0.2,
            veto_band: 0.3,
            min_internal_confidence: 0.5,
            aligned_boost: 1.2,
            partial_multiplier: 0.8,
            divergent_multiplier: 0.3,
        }
    }
}

/// Momentum confirmation knobs. The percent fields are fractions
/// (0.01 = 1%).
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    /// Retracement from the favorable extremum required to confirm
    pub reversal_threshold_pct: f64,
    /// Consecutive qualifying cycles required before confirmation
    pub confirmation_wait_cycles: u32,
    /// Adverse move beyond entry that marks a false bounce
    pub bounce_guard_pct: f64,
    /// Pending orders older than this expire
    pub max_pending_secs: u64,
    /// Terminal orders are evicted after this long
    pub retention_secs: u64,
    /// Per-order price history / peaks / valleys cap
    pub history_cap: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reversal_threshold_pct: 0.01,
            confirmation_wait_cycles: 3,
            bounce_guard_pct: 0.012,
            max_pending_secs: 300,
            retention_secs: 900,
            history_cap: 50,
        }
    }
}

/// One trend-specific strategy profile
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
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

#[derive(Debug, Clone, Deserialize)]
pub struct AdaptiveManagerConfig {
    /// Consecutive identical classifications needed to confirm a trend
    pub trend_change_threshold: u32,
    /// Up-trend: buy when holdings value falls below this portfolio fraction
    pub min_holdings_frac: f64,
    /// Down-trend: sell when holdings value exceeds this portfolio fraction
    pub max_exposure_frac: f64,
    /// Fraction of holdings to liquidate on a confirmed down-trend
    pub downtrend_liquidation_frac: f64,
    /// Orders farther than this from market are proposed for cancellation
    pub stale_distance_pct: f64,
    /// Trend-conflicting orders within this distance are proposed for
    /// cancellation
    pub conflict_proximity_pct: f64,
    /// In-memory adaptation audit log cap
    pub history_cap: usize,
    pub up: ProfileConfig,
    pub down: ProfileConfig,
    pub neutral: ProfileConfig,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Bot defaults
            .set_default("bot.tag", env!("CARGO_PKG_VERSION"))?
            .set_default("bot.asset", "BTC")?
            .set_default("bot.cycle_interval_secs", 30)?
            .set_default("bot.dry_run", true)?
            // Source defaults
            .set_default("sources.momentum_enabled", true)?
            .set_default("sources.technical_enabled", true)?
            .set_default("sources.sentiment_enabled", true)?
            .set_default("sources.momentum_weight", 0.4)?
            .set_default("sources.technical_weight", 0.4)?
            .set_default("sources.sentiment_weight", 0.2)?
            .set_default("sources.fetch_timeout_secs", 10)?
            .set_default("sources.sentiment_url", "https://api.alternative.me/fng/")?
            // Fusion defaults
            .set_default("fusion.internal_weight", 0.6)?
            .set_default("fusion.external_weight", 0.4)?
            .set_default("fusion.hold_band", 0.2)?
            .set_default("fusion.veto_band", 0.3)?
            .set_default("fusion.min_internal_confidence", 0.5)?
            .set_default("fusion.aligned_boost", 1.2)?
            .set_default("fusion.partial_multiplier", 0.8)?
            .set_default("fusion.divergent_multiplier", 0.3)?
            // Validator defaults
            .set_default("validator.reversal_threshold_pct", 0.01)?
            .set_default("validator.confirmation_wait_cycles", 3)?
            .set_default("validator.bounce_guard_pct", 0.012)?
            .set_default("validator.max_pending_secs", 300)?
            .set_default("validator.retention_secs", 900)?
            .set_default("validator.history_cap", 50)?
            // Adaptive defaults
            .set_default("adaptive.trend_change_threshold", 3)?
            .set_default("adaptive.min_holdings_frac", 0.2)?
            .set_default("adaptive.max_exposure_frac", 0.6)?
            .set_default("adaptive.downtrend_liquidation_frac", 0.3)?
            .set_default("adaptive.stale_distance_pct", 0.05)?
            .set_default("adaptive.conflict_proximity_pct", 0.01)?
            .set_default("adaptive.history_cap", 200)?
            // Up-trend profile: narrow spread, buy bias
            .set_default("adaptive.up.strategy_name", "trend_follow_up")?
            .set_default("adaptive.up.spread_pct", 0.0015)?
            .set_default("adaptive.up.min_spread_pct", 0.001)?
            .set_default("adaptive.up.max_spread_pct", 0.003)?
            .set_default("adaptive.up.order_size", 0.002)?
            .set_default("adaptive.up.max_position", 0.01)?
            .set_default("adaptive.up.stop_loss_pct", 0.02)?
            .set_default("adaptive.up.take_profit_pct", 0.03)?
            .set_default("adaptive.up.buy_bias", 1.3)?
            .set_default("adaptive.up.sell_bias", 0.8)?
            .set_default("adaptive.up.max_order_age_secs", 180)?
            // Down-trend profile: wide spread, sell bias
            .set_default("adaptive.down.strategy_name", "defensive_down")?
            .set_default("adaptive.down.spread_pct", 0.005)?
            .set_default("adaptive.down.min_spread_pct", 0.003)?
            .set_default("adaptive.down.max_spread_pct", 0.01)?
            .set_default("adaptive.down.order_size", 0.001)?
            .set_default("adaptive.down.max_position", 0.005)?
            .set_default("adaptive.down.stop_loss_pct", 0.015)?
            .set_default("adaptive.down.take_profit_pct", 0.02)?
            .set_default("adaptive.down.buy_bias", 0.7)?
            .set_default("adaptive.down.sell_bias", 1.3)?
            .set_default("adaptive.down.max_order_age_secs", 120)?
            // Neutral profile: balanced
            .set_default("adaptive.neutral.strategy_name", "range_neutral")?
            .set_default("adaptive.neutral.spread_pct", 0.003)?
            .set_default("adaptive.neutral.min_spread_pct", 0.002)?
            .set_default("adaptive.neutral.max_spread_pct", 0.005)?
            .set_default("adaptive.neutral.order_size", 0.0015)?
            .set_default("adaptive.neutral.max_position", 0.0075)?
            .set_default("adaptive.neutral.stop_loss_pct", 0.02)?
            .set_default("adaptive.neutral.take_profit_pct", 0.025)?
            .set_default("adaptive.neutral.buy_bias", 1.0)?
            .set_default("adaptive.neutral.sell_bias", 1.0)?
            .set_default("adaptive.neutral.max_order_age_secs", 300)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (TRENDGATE_*)
            .add_source(Environment::with_prefix("TRENDGATE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.sources.validate()?;

        Ok(app_config)
    }

    /// Generate a one-line digest of the config for startup logging
    pub fn digest(&self) -> String {
        format!(
            "bot={} asset={} cycle={}s dry_run={} wait_cycles={} reversal={:.2}% trend_threshold={}",
            self.bot.tag,
            self.bot.asset,
            self.bot.cycle_interval_secs,
            self.bot.dry_run,
            self.validator.confirmation_wait_cycles,
            self.validator.reversal_threshold_pct * 100.0,
            self.adaptive.trend_change_threshold,
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
