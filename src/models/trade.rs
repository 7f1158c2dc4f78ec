// =============================================================================
// Trade Models — entry zone, trade plan, and post-execution record
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Long,
    Short,
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TradeDirection::Long => "long",
            TradeDirection::Short => "short",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentType {
    Futures,
    Call,
    Put,
}

impl std::fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstrumentType::Futures => "futures",
            InstrumentType::Call => "call",
            InstrumentType::Put => "put",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Pending,
    Active,
    Closed,
    Rejected,
    Expired,
}

impl Default for TradeStatus {
    fn default() -> Self {
        TradeStatus::Pending
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Active => "active",
            TradeStatus::Closed => "closed",
            TradeStatus::Rejected => "rejected",
            TradeStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of a not-yet-executed trade plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    Pending,
    Active,
    Executed,
    Cancelled,
    Expired,
    Rejected,
}

impl Default for PlanStatus {
    fn default() -> Self {
        PlanStatus::Pending
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Active => "active",
            PlanStatus::Executed => "executed",
            PlanStatus::Cancelled => "cancelled",
            PlanStatus::Expired => "expired",
            PlanStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// How the stop loss is meant to be managed once the plan is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlType {
    Fixed,
    Trailing,
    Breakeven,
}

impl Default for SlType {
    fn default() -> Self {
        SlType::Fixed
    }
}

impl std::fmt::Display for SlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SlType::Fixed => "fixed",
            SlType::Trailing => "trailing",
            SlType::Breakeven => "breakeven",
        };
        write!(f, "{s}")
    }
}

/// Suggested entry band around the current price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntryZone {
    pub lower: f64,
    pub upper: f64,
    pub optimal: f64,
}

impl EntryZone {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.lower && price <= self.upper
    }
}

/// A fully constructed, not-yet-executed trade recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePlan {
    pub id: Uuid,
    pub signal_id: Uuid,
    pub direction: TradeDirection,
    pub instrument_type: InstrumentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument_symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strike: Option<f64>,
    pub entry_zone: EntryZone,
    pub stop_loss: f64,
    pub sl_type: SlType,
    pub target_1: f64,
    pub target_2: f64,
    pub target_1_exit_pct: f64,
    pub position_size: u32,
    pub risk_amount: f64,
    pub risk_reward_t1: f64,
    pub risk_reward_t2: f64,
    pub confidence: f64,
    pub status: PlanStatus,
    pub is_valid: bool,
    pub rejection_reasons: Vec<String>,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TradePlan {
    pub fn risk_points(&self) -> f64 {
        (self.entry_zone.optimal - self.stop_loss).abs()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A trade plan that was actually entered and (eventually) exited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedTrade {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub direction: TradeDirection,
    pub instrument_type: InstrumentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument_symbol: Option<String>,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub target_1: f64,
    pub target_2: f64,
    pub position_size: u32,
    pub status: TradeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl_points: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl_amount: Option<f64>,
    pub entry_time: DateTime<Utc>,
}

impl ExecutedTrade {
    pub fn is_winner(&self) -> Option<bool> {
        self.pnl_amount.map(|pnl| pnl > 0.0)
    }

    pub fn unrealized_pnl_points(&self, current_price: f64) -> f64 {
        match self.direction {
            TradeDirection::Long => current_price - self.entry_price,
            TradeDirection::Short => self.entry_price - current_price,
        }
    }

    pub fn unrealized_pnl_amount(&self, current_price: f64, lot_size: u32) -> f64 {
        self.unrealized_pnl_points(current_price) * self.position_size as f64 * lot_size as f64
    }
}
