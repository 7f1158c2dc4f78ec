// =============================================================================
// Central Application State — Bank Nifty Decision-Support Engine
// =============================================================================
//
// The single source of truth the scheduled activities and the API handlers
// share. All subsystems hold Arc references to their own state; AppState
// ties them together and provides a unified snapshot for the dashboard API.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared collections.
//   - Arc wrappers for subsystem engines that manage their own interior
//     mutability.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Asia::Kolkata;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::buffer::MarketDataBuffer;
use crate::confluence::ConfluenceScorer;
use crate::models::signal::TradeSignal;
use crate::models::trade::{ExecutedTrade, TradePlan};
use crate::models::MarketRegime;
use crate::options_intel::OptionsIntelEngine;
use crate::persistence::{
    ExecutedTradeRepository, RiskStateRepository, SignalRepository, TradePlanRepository,
};
use crate::regime::{RegimeClassifier, RegimeConfig};
use crate::regime::detector::VixContext;
use crate::risk_governor::{RiskGovernor, RiskGovernorConfig};
use crate::runtime_config::RuntimeConfig;
use crate::signal_fuser;
use crate::trade_builder::{self, BuilderConfig};
use crate::validator::DataValidator;

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;
/// Strikes kept on each side of the ATM strike when pulling the chain.
const STRIKES_AROUND_ATM: usize = 5;

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    pub at: String,
}

/// Outcome of one signal-pipeline pass, recorded for the API and logs.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub signal: TradeSignal,
    pub plan: Option<TradePlan>,
    pub plan_accepted: bool,
    pub risk_warnings: Vec<String>,
}

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    pub state_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    pub broker: Arc<Broker>,
    pub validator: Arc<DataValidator>,
    pub buffer: Arc<MarketDataBuffer>,

    pub regime_classifier: Arc<RwLock<RegimeClassifier>>,
    pub confluence_scorer: Arc<ConfluenceScorer>,
    pub options_intel: Arc<RwLock<OptionsIntelEngine>>,
    pub risk_governor: Arc<RiskGovernor>,

    pub signals: Arc<SignalRepository>,
    pub trade_plans: Arc<TradePlanRepository>,
    pub executed_trades: Arc<ExecutedTradeRepository>,
    pub risk_states: Arc<RiskStateRepository>,

    pub last_outcome: RwLock<Option<PipelineOutcome>>,
    pub recent_errors: RwLock<Vec<ErrorRecord>>,
    pub current_trading_day: RwLock<Option<NaiveDate>>,

    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct a new `AppState` from the given runtime configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        let regime_config = RegimeConfig {
            market_open: config.market_open,
            market_close: config.market_close,
            opening_range_end: config.market_open
                + chrono::Duration::minutes(config.opening_range_end_minute as i64),
            new_entries_cutoff: chrono::NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        };

        let validator = DataValidator::new(
            config.max_data_staleness_seconds,
            config.max_latency_ms,
            config.market_open,
            config.market_close,
            regime_config.opening_range_end,
        );

        let buffer = MarketDataBuffer::new(
            config.data_buffer_size,
            config.min_buffer_fill_pct,
            config.max_data_staleness_seconds as u64,
        );

        let risk_governor_config = RiskGovernorConfig {
            starting_capital: config.trading_capital,
            max_daily_loss_amount: config.max_daily_loss_amount,
            max_trades: config.max_trades_per_day,
            max_consecutive_losses: config.max_consecutive_losses,
            min_risk_reward: config.min_risk_reward,
            lot_size: config.lot_size,
        };

        Self {
            state_version: AtomicU64::new(1),

            runtime_config: Arc::new(RwLock::new(config)),

            broker: Arc::new(Broker::new()),
            validator: Arc::new(validator),
            buffer: Arc::new(buffer),

            regime_classifier: Arc::new(RwLock::new(RegimeClassifier::new(regime_config))),
            confluence_scorer: Arc::new(ConfluenceScorer::new(0.0)),
            options_intel: Arc::new(RwLock::new(OptionsIntelEngine::new())),
            risk_governor: Arc::new(RiskGovernor::new(risk_governor_config)),

            signals: Arc::new(SignalRepository::new()),
            trade_plans: Arc::new(TradePlanRepository::new()),
            executed_trades: Arc::new(ExecutedTradeRepository::new()),
            risk_states: Arc::new(RiskStateRepository::new()),

            last_outcome: RwLock::new(None),
            recent_errors: RwLock::new(Vec::new()),
            current_trading_day: RwLock::new(None),

            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        };
        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        self.increment_version();
    }

    // ── Day lifecycle ───────────────────────────────────────────────────

    /// Starts a new trading day: re-seeds the risk governor, rolls the
    /// broker's session anchors, and resets the regime classifier's
    /// intra-day state (keeping its cross-day ATR baseline).
    pub fn start_trading_day(&self, date: NaiveDate) {
        self.risk_governor.initialize_day(date);
        self.broker.roll_day();
        self.regime_classifier.write().reset_day();
        self.options_intel.write().reset_day();
        *self.current_trading_day.write() = Some(date);
        info!(%date, "trading day initialised");
        self.increment_version();
    }

    /// Finalizes the trading day: persists the day's risk state so a
    /// restart later that day reloads the same counters.
    pub fn finalize_trading_day(&self) {
        if let Some(state) = self.risk_governor.current_state() {
            self.risk_states.upsert(state.clone());
            info!(date = %state.date, status = %state.status, total_pnl = state.total_pnl, "trading day finalized");
        }
        self.increment_version();
    }

    // ── Data pull + validate + buffer (the "fetch" periodic activity) ───

    /// Pulls one snapshot from the broker, validates it, and appends it to
    /// the ring buffer. Transient broker/validator failures are recovered
    /// locally: the tick is skipped and logged, the next scheduled tick
    /// retries.
    pub fn fetch_tick(&self) {
        let Some(snapshot) = self.broker.get_market_snapshot(STRIKES_AROUND_ATM) else {
            warn!("broker returned no snapshot this tick");
            return;
        };

        let now = Utc::now();
        let check_trading_hours = true;
        let result = self.validator.validate_snapshot(&snapshot, check_trading_hours);
        if !result.is_valid {
            debug!(status = %result.status, errors = ?result.errors, "snapshot failed validation, tick skipped");
            return;
        }

        self.buffer.add_snapshot(snapshot);
        let _ = now;
    }

    // ── Signal pipeline (the "decide" periodic activity) ─────────────────

    /// Runs regime classification, confluence scoring, and options
    /// intelligence against the buffered data, fuses them into a signal,
    /// and if valid builds and risk-checks a trade plan. Returns `None`
    /// when the buffer isn't warmed up yet.
    pub fn run_pipeline(&self) -> Option<PipelineOutcome> {
        if !self.buffer.trade_allowed() {
            debug!(reason = ?self.buffer.get_no_trade_reason(), "buffer not ready, pipeline skipped");
            return None;
        }

        let snapshot = self.buffer.latest()?;
        let bars = self.buffer.get_spot_ohlcv(60);
        let local_now = Utc::now().with_timezone(&Kolkata);
        let local_time = local_now.time();

        let vix_context = VixContext {
            level: snapshot.vix.level(),
            change_pct: snapshot.vix.change_pct(),
        };

        let regime: MarketRegime = {
            let mut classifier = self.regime_classifier.write();
            classifier.classify(
                &snapshot.spot.ohlcv,
                local_time,
                vix_context,
                snapshot.spot.prev_close,
                snapshot.spot.prev_close,
            )
        };

        let confluence = {
            let min_score = self.runtime_config.read().min_confluence_score;
            let scorer = ConfluenceScorer::new(min_score);
            let regime_direction = if regime.trade_allowed {
                Some(crate::models::signal::SignalDirection::from(regime.trend_direction))
            } else {
                None
            };
            scorer.score(&bars, regime_direction)
        };

        let options_intel = self.options_intel.write().analyze(&snapshot.options_chain);

        let signal = signal_fuser::fuse(&regime, &confluence, &options_intel);
        self.signals.insert(signal.clone());

        let (max_risk_amount, min_risk_reward, lot_size) = {
            let cfg = self.runtime_config.read();
            (cfg.max_risk_amount, cfg.min_risk_reward, cfg.lot_size)
        };
        let builder_config = BuilderConfig {
            max_risk_amount,
            min_risk_reward,
            lot_size,
        };

        let plan = trade_builder::build_plan(&signal, &snapshot, &builder_config);
        let mut plan_accepted = false;
        let mut risk_warnings = Vec::new();

        if let Some(plan) = &plan {
            let risk_result = self.risk_governor.check_trade_risk(plan);
            risk_warnings = risk_result.warnings.clone();
            if risk_result.is_allowed {
                plan_accepted = true;
                self.risk_governor.record_trade_entry(plan);
                info!(id = %plan.id, direction = %plan.direction, "trade plan published");
            } else {
                debug!(reasons = ?risk_result.rejection_reasons, "trade plan rejected by risk governor");
            }
            self.trade_plans.insert(plan.clone());
        }

        self.increment_version();

        let outcome = PipelineOutcome {
            signal,
            plan,
            plan_accepted,
            risk_warnings,
        };
        *self.last_outcome.write() = Some(outcome.clone());
        Some(outcome)
    }

    /// Records the exit of a previously entered trade against the risk
    /// governor and the persistence layer.
    pub fn record_trade_exit(&self, trade: ExecutedTrade) {
        self.risk_governor.record_trade_exit(&trade);
        self.executed_trades.update(trade);
        self.increment_version();
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    pub fn build_snapshot(&self) -> StateSnapshot {
        let risk_state = self.risk_governor.current_state();
        let buffer_metrics = self.buffer.get_metrics();
        let last_outcome = self.last_outcome.read().clone();
        let recent_errors = self.recent_errors.read().clone();

        StateSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            risk_state,
            buffer_status: buffer_metrics.status.to_string(),
            buffer_size: buffer_metrics.current_size,
            buffer_fill_percentage: buffer_metrics.fill_percentage,
            trade_allowed: self.buffer.trade_allowed() && self.risk_governor.can_trade().0,
            last_outcome,
            recent_errors,
        }
    }
}

/// Full engine state snapshot served by the status/snapshot API surface.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_seconds: u64,
    pub risk_state: Option<crate::models::risk::DailyRiskState>,
    pub buffer_status: String,
    pub buffer_size: usize,
    pub buffer_fill_percentage: f64,
    pub trade_allowed: bool,
    pub last_outcome: Option<PipelineOutcome>,
    pub recent_errors: Vec<ErrorRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_app_state_has_no_trade_allowed_until_warmed_up() {
        let state = AppState::new(RuntimeConfig::default());
        let snapshot = state.build_snapshot();
        assert!(!snapshot.trade_allowed);
        assert_eq!(snapshot.buffer_size, 0);
    }

    #[test]
    fn start_trading_day_initialises_risk_governor() {
        let state = AppState::new(RuntimeConfig::default());
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        state.start_trading_day(date);
        let risk_state = state.risk_governor.current_state().expect("risk state");
        assert_eq!(risk_state.date, date);
        assert_eq!(risk_state.trades_taken, 0);
    }

    #[test]
    fn fetch_tick_without_broker_connection_is_a_noop() {
        let state = AppState::new(RuntimeConfig::default());
        state.fetch_tick();
        assert_eq!(state.buffer.size(), 0);
    }

    #[test]
    fn fetch_tick_appends_to_buffer_once_connected() {
        let state = AppState::new(RuntimeConfig::default());
        state.broker.connect();
        state.fetch_tick();
        assert_eq!(state.buffer.size(), 1);
    }

    #[test]
    fn push_error_caps_at_max_recent_errors() {
        let state = AppState::new(RuntimeConfig::default());
        for i in 0..(MAX_RECENT_ERRORS + 10) {
            state.push_error(format!("error {i}"));
        }
        assert_eq!(state.recent_errors.read().len(), MAX_RECENT_ERRORS);
    }
}
