// =============================================================================
// Persistence — append-oriented in-memory repositories
// =============================================================================
//
// Outbound collaborator the core pipeline writes through: signals, trade
// plans, executed trades, and risk state. Keyed by UUID for the first three;
// risk state is upserted by `date`. Process-lifetime storage only — a real
// deployment swaps this module for a durable store without the core
// noticing, matching the crate's existing RwLock<Vec<_>>-backed cache idiom.

use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::risk::DailyRiskState;
use crate::models::signal::TradeSignal;
use crate::models::trade::{ExecutedTrade, TradePlan};

/// Append-only store for fused trade signals, keyed implicitly by insertion
/// order and retrievable by id.
#[derive(Default)]
pub struct SignalRepository {
    rows: RwLock<Vec<TradeSignal>>,
}

impl SignalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, signal: TradeSignal) {
        debug!(id = %signal.id, valid = signal.is_valid, "signal persisted");
        self.rows.write().push(signal);
    }

    pub fn get(&self, id: Uuid) -> Option<TradeSignal> {
        self.rows.read().iter().find(|s| s.id == id).cloned()
    }

    pub fn recent(&self, limit: usize) -> Vec<TradeSignal> {
        let rows = self.rows.read();
        rows.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only store for constructed (not-yet-executed) trade plans.
#[derive(Default)]
pub struct TradePlanRepository {
    rows: RwLock<Vec<TradePlan>>,
}

impl TradePlanRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, plan: TradePlan) {
        debug!(id = %plan.id, status = %plan.status, "trade plan persisted");
        self.rows.write().push(plan);
    }

    pub fn get(&self, id: Uuid) -> Option<TradePlan> {
        self.rows.read().iter().find(|p| p.id == id).cloned()
    }

    pub fn recent(&self, limit: usize) -> Vec<TradePlan> {
        let rows = self.rows.read();
        rows.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only store for trades that were actually entered.
#[derive(Default)]
pub struct ExecutedTradeRepository {
    rows: RwLock<Vec<ExecutedTrade>>,
}

impl ExecutedTradeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, trade: ExecutedTrade) {
        debug!(id = %trade.id, status = %trade.status, "executed trade persisted");
        self.rows.write().push(trade);
    }

    pub fn get(&self, id: Uuid) -> Option<ExecutedTrade> {
        self.rows.read().iter().find(|t| t.id == id).cloned()
    }

    /// Updates an existing row in place (e.g. recording an exit fill) by id.
    /// Logs and does nothing if the id is unknown, matching this crate's
    /// "persistence errors are logged, the in-memory pipeline continues"
    /// propagation policy.
    pub fn update(&self, trade: ExecutedTrade) {
        let mut rows = self.rows.write();
        match rows.iter_mut().find(|t| t.id == trade.id) {
            Some(existing) => *existing = trade,
            None => warn!(id = %trade.id, "update for unknown executed trade id ignored"),
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<ExecutedTrade> {
        let rows = self.rows.read();
        rows.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Upserted-by-date store for the day's risk state, so a restart mid-day can
/// reload the same `DailyRiskState` it last saw.
#[derive(Default)]
pub struct RiskStateRepository {
    rows: RwLock<HashMap<NaiveDate, DailyRiskState>>,
}

impl RiskStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, state: DailyRiskState) {
        debug!(date = %state.date, status = %state.status, "risk state persisted");
        self.rows.write().insert(state.date, state);
    }

    pub fn get(&self, date: NaiveDate) -> Option<DailyRiskState> {
        self.rows.read().get(&date).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::signal::{ConfluenceScore, OptionsIntelligence, SignalDirection};
    use crate::models::trade::{EntryZone, InstrumentType, PlanStatus, SlType, TradeDirection, TradeStatus};
    use crate::models::MarketRegime;
    use crate::models::regime::{RegimeType, TrendDirection, VolatilityLevel};
    use chrono::{Duration, Utc};

    fn sample_plan() -> TradePlan {
        TradePlan {
            id: Uuid::new_v4(),
            signal_id: Uuid::new_v4(),
            direction: TradeDirection::Long,
            instrument_type: InstrumentType::Futures,
            instrument_symbol: Some("BANKNIFTYFUT".into()),
            strike: None,
            entry_zone: EntryZone { lower: 51000.0, upper: 51100.0, optimal: 51070.0 },
            stop_loss: 50900.0,
            sl_type: SlType::Fixed,
            target_1: 51250.0,
            target_2: 51400.0,
            target_1_exit_pct: 50.0,
            position_size: 2,
            risk_amount: 3000.0,
            risk_reward_t1: 1.5,
            risk_reward_t2: 2.5,
            confidence: 0.7,
            status: PlanStatus::Pending,
            is_valid: true,
            rejection_reasons: vec![],
            reasoning: String::new(),
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::minutes(30),
        }
    }

    fn sample_trade(id: Uuid) -> ExecutedTrade {
        ExecutedTrade {
            id,
            plan_id: Uuid::new_v4(),
            direction: TradeDirection::Long,
            instrument_type: InstrumentType::Futures,
            instrument_symbol: Some("BANKNIFTYFUT".into()),
            entry_price: 51070.0,
            stop_loss: 50900.0,
            target_1: 51250.0,
            target_2: 51400.0,
            position_size: 2,
            status: TradeStatus::Active,
            exit_price: None,
            exit_reason: None,
            exit_time: None,
            pnl_points: None,
            pnl_amount: None,
            entry_time: Utc::now(),
        }
    }

    fn sample_signal() -> TradeSignal {
        TradeSignal {
            id: Uuid::new_v4(),
            direction: SignalDirection::Bullish,
            regime_score: 10.0,
            confluence_score: 8.0,
            options_score: 8.0,
            total_score: 26.0,
            regime: MarketRegime {
                regime: RegimeType::TrendingBullish,
                volatility: VolatilityLevel::Normal,
                trend_direction: TrendDirection::Up,
                allowed_setups: vec![],
                trade_allowed: true,
                opening_range: None,
                atr_ratio: 1.0,
                vwap_slope: 0.1,
                price_vs_vwap: "above".into(),
                prev_day_high: 51500.0,
                prev_day_low: 50800.0,
                vix_direction: "stable".into(),
                vix_level: "normal".into(),
                regime_reasons: vec![],
                trade_rejection_reasons: vec![],
                timestamp: Utc::now(),
            },
            confluence: ConfluenceScore {
                total_score: 8.0,
                max_score: 10.0,
                direction: SignalDirection::Bullish,
                bullish_count: 4,
                bearish_count: 0,
                neutral_count: 1,
                indicators: vec![],
                meets_threshold: true,
                timestamp: Utc::now(),
            },
            options_intel: OptionsIntelligence {
                pcr: 1.1,
                max_pain_strike: 51100.0,
                call_oi_wall: None,
                put_oi_wall: None,
                iv_status: "normal".into(),
                iv_percentile: 50.0,
                iv_trend: "stable".into(),
                buildup: "long_buildup".into(),
                direction: SignalDirection::Bullish,
                confidence: 0.8,
                has_conflict: false,
                conflict_reason: None,
                timestamp: Utc::now(),
            },
            is_valid: true,
            rejection_reasons: vec![],
            reasoning: String::new(),
            suggested_setup: None,
            suggested_instrument: Some("futures".into()),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn signal_repository_insert_and_get() {
        let repo = SignalRepository::new();
        let signal = sample_signal();
        let id = signal.id;
        repo.insert(signal);
        assert_eq!(repo.len(), 1);
        assert!(repo.get(id).is_some());
        assert!(repo.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn trade_plan_repository_recent_is_newest_first() {
        let repo = TradePlanRepository::new();
        let first = sample_plan();
        let second = sample_plan();
        let second_id = second.id;
        repo.insert(first);
        repo.insert(second);
        let recent = repo.recent(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, second_id);
    }

    #[test]
    fn executed_trade_repository_update_replaces_existing_row() {
        let repo = ExecutedTradeRepository::new();
        let id = Uuid::new_v4();
        repo.insert(sample_trade(id));
        let mut updated = sample_trade(id);
        updated.status = TradeStatus::Closed;
        updated.exit_price = Some(51250.0);
        repo.update(updated);
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get(id).unwrap().status, TradeStatus::Closed);
    }

    #[test]
    fn executed_trade_repository_update_unknown_id_is_noop() {
        let repo = ExecutedTradeRepository::new();
        repo.update(sample_trade(Uuid::new_v4()));
        assert!(repo.is_empty());
    }

    #[test]
    fn risk_state_repository_upsert_by_date() {
        let repo = RiskStateRepository::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let state = DailyRiskState::new(date, 500_000.0, 7_500.0, 2, 2);
        repo.upsert(state.clone());
        assert_eq!(repo.len(), 1);
        let mut updated = state;
        updated.trades_taken = 1;
        repo.upsert(updated);
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get(date).unwrap().trades_taken, 1);
    }
}
