// =============================================================================
// Runtime Configuration — Hot-reloadable engine settings with atomic save
// =============================================================================
//
// Central configuration hub for the decision-support engine. Every tunable
// parameter lives here so that the engine can be reconfigured at runtime
// without a restart.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default = "...")]` so that adding new
// fields never breaks loading an older config file. Bounds are not enforced
// by the type system; `validate()` is called once after load.
//
// =============================================================================

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_trading_capital() -> f64 {
    500_000.0
}

fn default_max_risk_per_trade_pct() -> f64 {
    1.0
}

fn default_max_daily_loss_pct() -> f64 {
    1.5
}

fn default_max_trades_per_day() -> u32 {
    2
}

fn default_max_consecutive_losses() -> u32 {
    2
}

fn default_data_buffer_size() -> usize {
    100
}

fn default_min_buffer_fill_pct() -> f64 {
    80.0
}

fn default_max_data_staleness_seconds() -> i64 {
    5
}

fn default_max_latency_ms() -> i64 {
    500
}

fn default_min_confluence_score() -> f64 {
    7.0
}

fn default_min_risk_reward() -> f64 {
    2.0
}

fn default_lot_size() -> u32 {
    15
}

fn default_market_open() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 15, 0).unwrap()
}

fn default_market_close() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 30, 0).unwrap()
}

fn default_opening_range_end_minute() -> u32 {
    30
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the engine.
///
/// Every field has a serde default so that older or hand-edited JSON files
/// missing new fields will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Base currency amount used for position sizing and loss caps.
    #[serde(default = "default_trading_capital")]
    pub trading_capital: f64,

    /// Cap on risk-amount per plan, as a percentage of trading capital.
    #[serde(default = "default_max_risk_per_trade_pct")]
    pub max_risk_per_trade_pct: f64,

    /// Hard shutdown threshold, as a percentage of trading capital.
    #[serde(default = "default_max_daily_loss_pct")]
    pub max_daily_loss_pct: f64,

    /// Hard cap on the number of trades the risk governor allows per day.
    #[serde(default = "default_max_trades_per_day")]
    pub max_trades_per_day: u32,

    /// Hard shutdown threshold on consecutive losing trades.
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,

    /// Ring buffer capacity (number of snapshots retained).
    #[serde(default = "default_data_buffer_size")]
    pub data_buffer_size: usize,

    /// Warm-up gate: percentage of `data_buffer_size` that must be filled
    /// with fresh snapshots before trading is allowed.
    #[serde(default = "default_min_buffer_fill_pct")]
    pub min_buffer_fill_pct: f64,

    /// Validator threshold: snapshot age beyond which data is stale.
    #[serde(default = "default_max_data_staleness_seconds")]
    pub max_data_staleness_seconds: i64,

    /// Validator warning threshold for feed latency.
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: i64,

    /// Confluence eligibility gate.
    #[serde(default = "default_min_confluence_score")]
    pub min_confluence_score: f64,

    /// Builder risk-reward gate (at target 2).
    #[serde(default = "default_min_risk_reward")]
    pub min_risk_reward: f64,

    /// Bank Nifty contract size, used as a sizing multiplier.
    #[serde(default = "default_lot_size")]
    pub lot_size: u32,

    /// Exchange-local market open time (Asia/Kolkata).
    #[serde(default = "default_market_open")]
    pub market_open: NaiveTime,

    /// Exchange-local market close time (Asia/Kolkata).
    #[serde(default = "default_market_close")]
    pub market_close: NaiveTime,

    /// Minutes past market open when the opening range freezes.
    #[serde(default = "default_opening_range_end_minute")]
    pub opening_range_end_minute: u32,

    /// Derived, cached once at load: capital × max_risk_per_trade_pct/100.
    #[serde(default)]
    pub max_risk_amount: f64,

    /// Derived, cached once at load: capital × max_daily_loss_pct/100.
    #[serde(default)]
    pub max_daily_loss_amount: f64,

    /// Derived, cached once at load: floor(data_buffer_size × min_buffer_fill_pct/100).
    #[serde(default)]
    pub min_buffer_fill_count: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let mut cfg = Self {
            trading_capital: default_trading_capital(),
            max_risk_per_trade_pct: default_max_risk_per_trade_pct(),
            max_daily_loss_pct: default_max_daily_loss_pct(),
            max_trades_per_day: default_max_trades_per_day(),
            max_consecutive_losses: default_max_consecutive_losses(),
            data_buffer_size: default_data_buffer_size(),
            min_buffer_fill_pct: default_min_buffer_fill_pct(),
            max_data_staleness_seconds: default_max_data_staleness_seconds(),
            max_latency_ms: default_max_latency_ms(),
            min_confluence_score: default_min_confluence_score(),
            min_risk_reward: default_min_risk_reward(),
            lot_size: default_lot_size(),
            market_open: default_market_open(),
            market_close: default_market_close(),
            opening_range_end_minute: default_opening_range_end_minute(),
            max_risk_amount: 0.0,
            max_daily_loss_amount: 0.0,
            min_buffer_fill_count: 0,
        };
        cfg.recompute_derived();
        cfg
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`, recomputing derived
    /// values and validating bounds before returning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        config.recompute_derived();
        config.validate()?;

        info!(
            path = %path.display(),
            capital = config.trading_capital,
            max_risk_amount = config.max_risk_amount,
            max_daily_loss_amount = config.max_daily_loss_amount,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Recomputes the cached derived values from the primary fields. Called
    /// once after load or construction; cheap enough to call again after a
    /// runtime mutation if the caller wants fresh derived values.
    pub fn recompute_derived(&mut self) {
        self.max_risk_amount = self.trading_capital * self.max_risk_per_trade_pct / 100.0;
        self.max_daily_loss_amount = self.trading_capital * self.max_daily_loss_pct / 100.0;
        self.min_buffer_fill_count =
            (self.data_buffer_size as f64 * self.min_buffer_fill_pct / 100.0).floor() as usize;
    }

    /// Checks every option against its documented bounds. Bounds are not
    /// enforced by the type system, matching the rest of this crate's
    /// permissive-deserialization-plus-post-hoc-validation convention.
    pub fn validate(&self) -> Result<()> {
        if self.trading_capital < 10_000.0 {
            bail!("trading_capital must be >= 10000, got {}", self.trading_capital);
        }
        if !(0.1..=2.0).contains(&self.max_risk_per_trade_pct) {
            bail!(
                "max_risk_per_trade_pct must be in [0.1, 2.0], got {}",
                self.max_risk_per_trade_pct
            );
        }
        if !(0.5..=3.0).contains(&self.max_daily_loss_pct) {
            bail!("max_daily_loss_pct must be in [0.5, 3.0], got {}", self.max_daily_loss_pct);
        }
        if !(1..=5).contains(&self.max_trades_per_day) {
            bail!("max_trades_per_day must be in [1, 5], got {}", self.max_trades_per_day);
        }
        if !(1..=5).contains(&self.max_consecutive_losses) {
            bail!(
                "max_consecutive_losses must be in [1, 5], got {}",
                self.max_consecutive_losses
            );
        }
        if !(20..=500).contains(&self.data_buffer_size) {
            bail!("data_buffer_size must be in [20, 500], got {}", self.data_buffer_size);
        }
        if !(50.0..=100.0).contains(&self.min_buffer_fill_pct) {
            bail!(
                "min_buffer_fill_pct must be in [50, 100], got {}",
                self.min_buffer_fill_pct
            );
        }
        if !(1..=30).contains(&self.max_data_staleness_seconds) {
            bail!(
                "max_data_staleness_seconds must be in [1, 30], got {}",
                self.max_data_staleness_seconds
            );
        }
        if !(100..=2000).contains(&self.max_latency_ms) {
            bail!("max_latency_ms must be in [100, 2000], got {}", self.max_latency_ms);
        }
        if !(5.0..=10.0).contains(&self.min_confluence_score) {
            bail!(
                "min_confluence_score must be in [5.0, 10.0], got {}",
                self.min_confluence_score
            );
        }
        if !(1.5..=5.0).contains(&self.min_risk_reward) {
            bail!("min_risk_reward must be in [1.5, 5.0], got {}", self.min_risk_reward);
        }
        if !(15..=45).contains(&self.opening_range_end_minute) {
            bail!(
                "opening_range_end_minute must be in [15, 45], got {}",
                self.opening_range_end_minute
            );
        }
        Ok(())
    }
}
