// =============================================================================
// Trade Builder — entry zone, stop loss, targets, sizing, R:R gate
// =============================================================================

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::models::signal::{SignalDirection, TradeSignal};
use crate::models::trade::{EntryZone, InstrumentType, PlanStatus, SlType, TradeDirection, TradePlan};
use crate::models::MarketSnapshot;

const ENTRY_ZONE_WIDTH_FACTOR: f64 = 0.3;
const ENTRY_OPTIMAL_FACTOR: f64 = 0.3;
const SL_BUFFER_ATR_FACTOR: f64 = 1.5;
const SL_BUFFER_OR_FACTOR: f64 = 0.5;
const OR_PAD_POINTS: f64 = 10.0;
const TARGET_1_RR: f64 = 1.5;
const TARGET_2_RR: f64 = 2.5;
const TARGET_1_EXIT_PCT: f64 = 50.0;
const PLAN_EXPIRY_MINUTES: i64 = 30;

/// Builder configuration: the risk and eligibility bounds the final gate
/// checks against. Loaded from `RuntimeConfig`.
#[derive(Debug, Clone, Copy)]
pub struct BuilderConfig {
    pub max_risk_amount: f64,
    pub min_risk_reward: f64,
    pub lot_size: u32,
}

/// `atr-estimate = max(session range * 0.5, 0.2% of price)`. Shared,
/// unchanged, between the entry-zone and stop-loss calculations.
fn atr_estimate(session_range: f64, price: f64) -> f64 {
    (session_range * 0.5).max(price * 0.002)
}

/// Builds a trade plan from a valid fused signal. Returns `None` immediately
/// if the signal is not valid.
pub fn build_plan(signal: &TradeSignal, snapshot: &MarketSnapshot, config: &BuilderConfig) -> Option<TradePlan> {
    if !signal.is_valid {
        return None;
    }

    let direction = match signal.direction {
        SignalDirection::Bullish => TradeDirection::Long,
        SignalDirection::Bearish => TradeDirection::Short,
        SignalDirection::Neutral => return None,
    };

    let price = snapshot.spot.ltp;
    let session_range = snapshot.spot.ohlcv.range();
    let atr = atr_estimate(session_range, price);

    let (instrument_type, instrument_symbol, strike) = select_instrument(signal, direction, snapshot);

    let width = ENTRY_ZONE_WIDTH_FACTOR * atr;
    let (entry_zone, optimal) = match direction {
        TradeDirection::Long => {
            let optimal = price - ENTRY_OPTIMAL_FACTOR * width;
            (
                EntryZone {
                    lower: price - width,
                    upper: price,
                    optimal,
                },
                optimal,
            )
        }
        TradeDirection::Short => {
            let optimal = price + ENTRY_OPTIMAL_FACTOR * width;
            (
                EntryZone {
                    lower: price,
                    upper: price + width,
                    optimal,
                },
                optimal,
            )
        }
    };

    let opening_range = signal.regime.opening_range.filter(|or| or.captured);
    let sl_buffer = SL_BUFFER_ATR_FACTOR * atr;
    let sl_buffer = match opening_range {
        Some(or) => sl_buffer.max(SL_BUFFER_OR_FACTOR * or.range()),
        None => sl_buffer,
    };

    let stop_loss = match direction {
        TradeDirection::Long => {
            let computed = optimal - sl_buffer;
            match opening_range {
                Some(or) => computed.min(or.low - OR_PAD_POINTS),
                None => computed,
            }
        }
        TradeDirection::Short => {
            let computed = optimal + sl_buffer;
            match opening_range {
                Some(or) => computed.max(or.high + OR_PAD_POINTS),
                None => computed,
            }
        }
    };

    let risk_points = (optimal - stop_loss).abs();
    let (target_1, target_2) = match direction {
        TradeDirection::Long => (
            optimal + TARGET_1_RR * risk_points,
            optimal + TARGET_2_RR * risk_points,
        ),
        TradeDirection::Short => (
            optimal - TARGET_1_RR * risk_points,
            optimal - TARGET_2_RR * risk_points,
        ),
    };

    let risk_reward_t1 = TARGET_1_RR;
    let risk_reward_t2 = TARGET_2_RR;

    let lots = if risk_points > 0.0 {
        (config.max_risk_amount / (risk_points * config.lot_size as f64)).floor() as i64
    } else {
        0
    };
    let position_size = lots.clamp(1, 5) as u32;
    let risk_amount = risk_points * position_size as f64 * config.lot_size as f64;

    let mut rejection_reasons = Vec::new();
    if risk_reward_t2 < config.min_risk_reward {
        rejection_reasons.push(format!(
            "Risk-Reward at T2 {risk_reward_t2:.2} below minimum {:.2}",
            config.min_risk_reward
        ));
    }
    if risk_amount > config.max_risk_amount {
        rejection_reasons.push(format!(
            "Risk amount {risk_amount:.2} exceeds max risk amount {:.2}",
            config.max_risk_amount
        ));
    }
    if !signal.regime.trade_allowed {
        rejection_reasons.push("Regime does not allow trading".to_string());
    }
    if lots < 1 {
        rejection_reasons.push("Computed lot count below 1".to_string());
    }

    let is_valid = rejection_reasons.is_empty();
    let status = if is_valid { PlanStatus::Pending } else { PlanStatus::Rejected };
    let confidence = (signal.total_score / 30.0).clamp(0.0, 1.0);
    let created_at = Utc::now();

    Some(TradePlan {
        id: Uuid::new_v4(),
        signal_id: signal.id,
        direction,
        instrument_type,
        instrument_symbol,
        strike,
        entry_zone,
        stop_loss,
        sl_type: SlType::Fixed,
        target_1,
        target_2,
        target_1_exit_pct: TARGET_1_EXIT_PCT,
        position_size,
        risk_amount,
        risk_reward_t1,
        risk_reward_t2,
        confidence,
        status,
        is_valid,
        rejection_reasons,
        reasoning: signal.reasoning.clone(),
        created_at,
        expires_at: created_at + Duration::minutes(PLAN_EXPIRY_MINUTES),
    })
}

/// Defaults to futures. Switches to the ATM call/put for defined-risk entry
/// when IV is extreme or the options intel flagged a conflict (defensive:
/// a conflicted signal does not reach the builder under normal fusion).
fn select_instrument(
    signal: &TradeSignal,
    direction: TradeDirection,
    snapshot: &MarketSnapshot,
) -> (InstrumentType, Option<String>, Option<f64>) {
    let needs_defined_risk = signal.options_intel.is_extreme_iv() || signal.options_intel.has_conflict;
    if !needs_defined_risk {
        return (InstrumentType::Futures, Some(snapshot.futures.symbol.clone()), None);
    }

    match direction {
        TradeDirection::Long => match snapshot.options_chain.atm_call() {
            Some(call) => (InstrumentType::Call, Some(call.symbol.clone()), Some(call.strike)),
            None => (InstrumentType::Futures, Some(snapshot.futures.symbol.clone()), None),
        },
        TradeDirection::Short => match snapshot.options_chain.atm_put() {
            Some(put) => (InstrumentType::Put, Some(put.symbol.clone()), Some(put.strike)),
            None => (InstrumentType::Futures, Some(snapshot.futures.symbol.clone()), None),
        },
    }
}
