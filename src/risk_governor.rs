// =============================================================================
// Risk Governor — the single authoritative daily risk circuit breaker
// =============================================================================
//
// Holds one `DailyRiskState` keyed by date behind a read-write lock, mirroring
// the engine's original single-state-behind-a-lock shape. Hard-shutdown is
// monotone for the day: once set, nothing in this module clears it.

use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::models::risk::{DailyRiskState, PositionRisk, RiskCheckResult, RiskStatus};
use crate::models::trade::{ExecutedTrade, TradePlan};

const LAST_ALLOWED_TRADE_WARNING_FRACTION: f64 = 1.0;
const RISK_AMOUNT_WARNING_FRACTION: f64 = 0.5;
const TIGHTEN_SL_TARGET_FRACTION: f64 = 0.5;

/// Day-scoped configuration the governor needs to build a fresh
/// `DailyRiskState` and evaluate trade-level checks.
#[derive(Debug, Clone, Copy)]
pub struct RiskGovernorConfig {
    pub starting_capital: f64,
    pub max_daily_loss_amount: f64,
    pub max_trades: u32,
    pub max_consecutive_losses: u32,
    pub min_risk_reward: f64,
    pub lot_size: u32,
}

/// Thread-safe wrapper around the day's risk state.
pub struct RiskGovernor {
    config: RiskGovernorConfig,
    state: RwLock<Option<DailyRiskState>>,
}

impl RiskGovernor {
    pub fn new(config: RiskGovernorConfig) -> Self {
        Self {
            config,
            state: RwLock::new(None),
        }
    }

    pub fn initialize_day(&self, date: NaiveDate) {
        let state = DailyRiskState::new(
            date,
            self.config.starting_capital,
            self.config.max_daily_loss_amount,
            self.config.max_trades,
            self.config.max_consecutive_losses,
        );
        info!(%date, capital = self.config.starting_capital, "risk day initialised");
        *self.state.write() = Some(state);
    }

    pub fn current_state(&self) -> Option<DailyRiskState> {
        self.state.read().clone()
    }

    /// Quick non-blocking check distinct from `check_trade_risk`: hard
    /// shutdown first, then max-trades, then max-loss.
    pub fn can_trade(&self) -> (bool, &'static str) {
        match self.state.read().as_ref() {
            Some(state) => state.can_trade(),
            None => (false, "Risk day not initialised"),
        }
    }

    /// Ordered risk gate for a candidate trade plan. The first failing check
    /// returns immediately; passing checks may still append non-blocking
    /// warnings.
    pub fn check_trade_risk(&self, plan: &TradePlan) -> RiskCheckResult {
        let guard = self.state.read();
        let state = match guard.as_ref() {
            Some(state) => state,
            None => {
                return RiskCheckResult {
                    is_allowed: false,
                    rejection_reasons: vec!["Risk day not initialised".to_string()],
                    warnings: vec![],
                    trade_count_ok: false,
                    daily_loss_ok: false,
                    consecutive_loss_ok: false,
                    position_size_ok: false,
                    risk_reward_ok: false,
                    suggested_position_size: None,
                }
            }
        };

        let risk_points = plan.risk_points();

        if state.hard_shutdown {
            return reject(state, "Hard shutdown active".to_string(), risk_points, self.config.lot_size);
        }
        if state.trades_taken >= state.max_trades {
            return reject(
                state,
                "Maximum trades for the day reached".to_string(),
                risk_points,
                self.config.lot_size,
            );
        }
        if state.total_pnl <= -state.max_daily_loss_amount {
            return reject(state, "Maximum daily loss reached".to_string(), risk_points, self.config.lot_size);
        }
        if plan.risk_amount > state.remaining_risk_capacity {
            return reject(
                state,
                format!(
                    "Plan risk amount {:.2} exceeds remaining capacity {:.2}",
                    plan.risk_amount, state.remaining_risk_capacity
                ),
                risk_points,
                self.config.lot_size,
            );
        }
        if !plan.is_valid {
            let guard_result = RiskCheckResult {
                is_allowed: false,
                rejection_reasons: plan.rejection_reasons.clone(),
                warnings: vec![],
                trade_count_ok: true,
                daily_loss_ok: true,
                consecutive_loss_ok: state.consecutive_losses < state.max_consecutive_losses,
                position_size_ok: true,
                risk_reward_ok: plan.risk_reward_t2 >= self.config.min_risk_reward,
                suggested_position_size: suggested_smaller_lots(state, risk_points, self.config.lot_size),
            };
            return guard_result;
        }
        if plan.risk_reward_t2 < self.config.min_risk_reward {
            return reject(
                state,
                format!(
                    "Risk-reward at T2 {:.2} below minimum {:.2}",
                    plan.risk_reward_t2, self.config.min_risk_reward
                ),
                risk_points,
                self.config.lot_size,
            );
        }

        let mut warnings = Vec::new();
        if state.consecutive_losses >= 1 {
            warnings.push(format!("{} consecutive losses so far today", state.consecutive_losses));
        }
        if state.trades_taken as f64 >= state.max_trades as f64 - LAST_ALLOWED_TRADE_WARNING_FRACTION {
            warnings.push("This would be the last allowed trade today".to_string());
        }
        if plan.risk_amount > RISK_AMOUNT_WARNING_FRACTION * state.remaining_risk_capacity {
            warnings.push("Risk amount exceeds half of remaining daily capacity".to_string());
        }

        RiskCheckResult {
            is_allowed: true,
            rejection_reasons: vec![],
            warnings,
            trade_count_ok: true,
            daily_loss_ok: true,
            consecutive_loss_ok: true,
            position_size_ok: true,
            risk_reward_ok: true,
            suggested_position_size: None,
        }
    }

    pub fn record_trade_entry(&self, plan: &TradePlan) {
        let mut guard = self.state.write();
        let Some(state) = guard.as_mut() else { return };
        let _ = plan;
        state.trades_taken += 1;
        state.trades_remaining = state.max_trades.saturating_sub(state.trades_taken);
        if state.trades_taken >= state.max_trades {
            state.max_trades_reached = true;
        }
        state.refresh_status();
    }

    pub fn record_trade_exit(&self, trade: &ExecutedTrade) {
        let mut guard = self.state.write();
        let Some(state) = guard.as_mut() else { return };
        let pnl = trade.pnl_amount.unwrap_or(0.0);

        state.realized_pnl += pnl;
        state.total_pnl = state.realized_pnl + state.unrealized_pnl;
        state.current_capital = state.starting_capital + state.total_pnl;

        if pnl > state.best_trade_pnl {
            state.best_trade_pnl = pnl;
        }
        if pnl < state.worst_trade_pnl {
            state.worst_trade_pnl = pnl;
        }

        if pnl >= 0.0 {
            state.consecutive_losses = 0;
        } else {
            state.consecutive_losses += 1;
        }

        state.remaining_risk_capacity = state.max_daily_loss_amount + state.total_pnl;

        self.check_hard_shutdown(state);
        state.refresh_status();
    }

    /// Updates unrealized P&L, total P&L, and current capital only. Never
    /// triggers the hard-shutdown check.
    pub fn update_unrealized(&self, amount: f64) {
        let mut guard = self.state.write();
        let Some(state) = guard.as_mut() else { return };
        state.unrealized_pnl = amount;
        state.total_pnl = state.realized_pnl + state.unrealized_pnl;
        state.current_capital = state.starting_capital + state.total_pnl;
    }

    pub fn should_tighten_sl(&self, unrealized_points: f64, target_1_points: f64) -> (bool, &'static str) {
        if target_1_points > 0.0 && unrealized_points >= TIGHTEN_SL_TARGET_FRACTION * target_1_points {
            (true, "move to breakeven")
        } else {
            (false, "")
        }
    }

    pub fn position_risk(&self, unrealized_pnl: f64, unrealized_pnl_pct: f64, progress_to_target_1: f64) -> PositionRisk {
        let (should_tighten_stop, _) = self.should_tighten_sl(progress_to_target_1, 1.0);
        PositionRisk {
            unrealized_pnl,
            unrealized_pnl_pct,
            progress_to_target_1,
            should_tighten_stop,
        }
    }

    /// Monotone, evaluated in order; never clears a shutdown already set.
    fn check_hard_shutdown(&self, state: &mut DailyRiskState) {
        if state.total_pnl <= -state.max_daily_loss_amount {
            state.max_loss_reached = true;
            if !state.hard_shutdown {
                state.hard_shutdown = true;
                state.shutdown_reason = Some("Maximum daily loss reached".to_string());
                warn!(total_pnl = state.total_pnl, "hard shutdown: maximum daily loss reached");
            }
        }
        if state.consecutive_losses >= state.max_consecutive_losses {
            if !state.hard_shutdown {
                state.hard_shutdown = true;
                state.shutdown_reason = Some(format!("{} consecutive losses", state.consecutive_losses));
                warn!(consecutive_losses = state.consecutive_losses, "hard shutdown: consecutive losses");
            }
        }
    }
}

fn suggested_smaller_lots(state: &DailyRiskState, risk_points: f64, lot_size: u32) -> Option<u32> {
    if state.remaining_risk_capacity <= 0.0 || risk_points <= 0.0 {
        return None;
    }
    let risk_per_lot = risk_points * lot_size as f64;
    if risk_per_lot <= 0.0 {
        return None;
    }
    let lots = (state.remaining_risk_capacity / risk_per_lot).floor() as i64;
    Some(lots.max(1) as u32)
}

fn reject(state: &DailyRiskState, reason: String, risk_points: f64, lot_size: u32) -> RiskCheckResult {
    RiskCheckResult {
        is_allowed: false,
        rejection_reasons: vec![reason],
        warnings: vec![],
        trade_count_ok: state.trades_taken < state.max_trades,
        daily_loss_ok: state.total_pnl > -state.max_daily_loss_amount,
        consecutive_loss_ok: state.consecutive_losses < state.max_consecutive_losses,
        position_size_ok: true,
        risk_reward_ok: true,
        suggested_position_size: suggested_smaller_lots(state, risk_points, lot_size),
    }
}
