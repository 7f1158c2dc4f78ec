// =============================================================================
// Risk Models — daily risk state and per-trade risk check results
// =============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Running tally of a single trading day's risk budget and outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRiskState {
    pub date: NaiveDate,
    pub starting_capital: f64,
    pub current_capital: f64,
    pub max_daily_loss_amount: f64,
    pub max_trades: u32,
    pub max_consecutive_losses: u32,
    pub remaining_risk_capacity: f64,
    pub trades_taken: u32,
    pub trades_remaining: u32,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_pnl: f64,
    pub consecutive_losses: u32,
    pub worst_trade_pnl: f64,
    pub best_trade_pnl: f64,
    pub max_loss_reached: bool,
    pub max_trades_reached: bool,
    pub hard_shutdown: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_reason: Option<String>,
    pub status: RiskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyRiskState {
    pub fn new(
        date: NaiveDate,
        starting_capital: f64,
        max_daily_loss_amount: f64,
        max_trades: u32,
        max_consecutive_losses: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            date,
            starting_capital,
            current_capital: starting_capital,
            max_daily_loss_amount,
            max_trades,
            max_consecutive_losses,
            remaining_risk_capacity: max_daily_loss_amount,
            trades_taken: 0,
            trades_remaining: max_trades,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            total_pnl: 0.0,
            consecutive_losses: 0,
            worst_trade_pnl: 0.0,
            best_trade_pnl: 0.0,
            max_loss_reached: false,
            max_trades_reached: false,
            hard_shutdown: false,
            shutdown_reason: None,
            status: RiskStatus::Normal,
            created_at: now,
            updated_at: now,
        }
    }

    /// Quick non-blocking check distinct from the governor's full
    /// `check_trade_risk`: hard-shutdown first, then max-trades, then
    /// max-loss.
    pub fn can_trade(&self) -> (bool, &'static str) {
        if self.hard_shutdown {
            (false, "Hard shutdown active")
        } else if self.max_trades_reached {
            (false, "Maximum trades for the day reached")
        } else if self.max_loss_reached {
            (false, "Maximum daily loss reached")
        } else {
            (true, "Trading allowed")
        }
    }

    /// Recomputes `status` from the current counters. First matching wins:
    /// shutdown > critical > warning > caution > normal.
    pub fn refresh_status(&mut self) {
        self.status = if self.hard_shutdown {
            RiskStatus::Shutdown
        } else if self.max_loss_reached || self.max_trades_reached {
            RiskStatus::Critical
        } else if self.consecutive_losses >= 1
            || self.remaining_risk_capacity < 0.5 * self.max_daily_loss_amount
        {
            RiskStatus::Warning
        } else if self.trades_taken >= 1 || self.total_pnl < 0.0 {
            RiskStatus::Caution
        } else {
            RiskStatus::Normal
        };
    }
}

/// Live risk snapshot for a single open position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionRisk {
    pub unrealized_pnl: f64,
    pub unrealized_pnl_pct: f64,
    pub progress_to_target_1: f64,
    pub should_tighten_stop: bool,
}

/// Outcome of checking a candidate trade plan against the day's risk state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCheckResult {
    pub is_allowed: bool,
    pub rejection_reasons: Vec<String>,
    pub warnings: Vec<String>,
    pub trade_count_ok: bool,
    pub daily_loss_ok: bool,
    pub consecutive_loss_ok: bool,
    pub position_size_ok: bool,
    pub risk_reward_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_position_size: Option<u32>,
}

/// Status enum used for wire responses summarising overall risk posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskStatus {
    Normal,
    Caution,
    Warning,
    Critical,
    Shutdown,
}

impl Default for RiskStatus {
    fn default() -> Self {
        RiskStatus::Normal
    }
}

impl std::fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskStatus::Normal => "normal",
            RiskStatus::Caution => "caution",
            RiskStatus::Warning => "warning",
            RiskStatus::Critical => "critical",
            RiskStatus::Shutdown => "shutdown",
        };
        write!(f, "{s}")
    }
}
