// =============================================================================
// Regime Classifier
// =============================================================================
//
// Classification hierarchy (evaluated top-to-bottom; first match wins):
//
//   1. OPENING-RANGE   — still inside the opening-range window
//   2. VOLATILE        — ATR-ratio/VIX in the extreme band
//   3. TRENDING-*       — price broke the opening range in the voted trend
//   4. TRENDING-*       — VWAP slope alone is steep enough
//   5. PRE-BREAKOUT     — price coiled near an OR edge in a quiet tape
//   6. VOLATILE         — ATR-ratio/VIX in the high band
//   7. RANGE-BOUND      — everything else
//
// State is carried across snapshots within a session: the opening-range
// accumulator, a trailing true-range window for the intraday ATR estimate, a
// short window of recent bars for the VWAP slope/trend vote, and the
// previous bar's close (needed for true range). `reset_day` clears all of
// that except the longer-lived per-day ATR history, which keeps accumulating
// a rolling baseline across sessions.

use std::collections::VecDeque;

use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indicators::vwap::{cumulative_vwap_series, linear_slope};
use crate::models::regime::{MarketRegime, OpeningRange, RegimeType, TrendDirection, VolatilityLevel};
use crate::models::OHLCV;

const TRUE_RANGE_WINDOW: usize = 14;
const DAILY_ATR_HISTORY_CAPACITY: usize = 20;
const VWAP_WINDOW_CAPACITY: usize = 20;

const PRICE_VWAP_HYSTERESIS_PCT: f64 = 0.002;
const TREND_VOTE_VWAP_BAND_PCT: f64 = 0.001;
const TREND_VOTE_SLOPE_THRESHOLD: f64 = 0.1;
const STEEP_SLOPE_THRESHOLD: f64 = 0.15;
const PRE_BREAKOUT_OR_PROXIMITY_PCT: f64 = 0.3;

/// Session time boundaries, loaded once from the configuration surface.
#[derive(Debug, Clone, Copy)]
pub struct RegimeConfig {
    pub market_open: NaiveTime,
    pub market_close: NaiveTime,
    pub opening_range_end: NaiveTime,
    pub new_entries_cutoff: NaiveTime,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            market_open: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            market_close: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            opening_range_end: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            new_entries_cutoff: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        }
    }
}

/// VIX context the classifier reads for the volatility and suppression
/// steps, decoupled from the broker's own `VIXData` type so this module can
/// be unit tested without constructing a full snapshot.
#[derive(Debug, Clone, Copy)]
pub struct VixContext {
    pub level: &'static str,
    pub change_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistentState {
    daily_atr_history: VecDeque<f64>,
}

/// Stateful session classifier: accumulates the opening range, a trailing
/// true-range window, and a short VWAP window across successive snapshots.
pub struct RegimeClassifier {
    config: RegimeConfig,
    opening_range: Option<OpeningRange>,
    or_frozen: bool,
    true_ranges: VecDeque<f64>,
    daily_atr_history: VecDeque<f64>,
    vwap_window: VecDeque<OHLCV>,
    prev_close: Option<f64>,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        Self {
            config,
            opening_range: None,
            or_frozen: false,
            true_ranges: VecDeque::with_capacity(TRUE_RANGE_WINDOW + 1),
            daily_atr_history: VecDeque::with_capacity(DAILY_ATR_HISTORY_CAPACITY),
            vwap_window: VecDeque::with_capacity(VWAP_WINDOW_CAPACITY),
            prev_close: None,
        }
    }

    /// Clears intra-day state (opening range, VWAP window, trailing true
    /// ranges) and folds the day's final ATR estimate into the persistent
    /// per-day history before doing so.
    pub fn reset_day(&mut self) {
        if let Some(atr) = self.current_atr() {
            if self.daily_atr_history.len() == DAILY_ATR_HISTORY_CAPACITY {
                self.daily_atr_history.pop_front();
            }
            self.daily_atr_history.push_back(atr);
        }
        self.opening_range = None;
        self.or_frozen = false;
        self.true_ranges.clear();
        self.vwap_window.clear();
        self.prev_close = None;
    }

    fn true_range(&self, bar: &OHLCV) -> f64 {
        match self.prev_close {
            None => bar.range(),
            Some(prev_close) => bar
                .range()
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs()),
        }
    }

    fn current_atr(&self) -> Option<f64> {
        if self.true_ranges.is_empty() {
            return None;
        }
        let window: Vec<f64> = self
            .true_ranges
            .iter()
            .rev()
            .take(TRUE_RANGE_WINDOW)
            .copied()
            .collect();
        Some(window.iter().sum::<f64>() / window.len() as f64)
    }

    /// current-ATR / 20-day-average-ATR. Returns 1.0 below 14 trailing
    /// observations, or when there is no persisted baseline yet.
    fn atr_ratio(&self) -> f64 {
        if self.true_ranges.len() < TRUE_RANGE_WINDOW {
            return 1.0;
        }
        let current = match self.current_atr() {
            Some(atr) => atr,
            None => return 1.0,
        };
        if self.daily_atr_history.is_empty() {
            return 1.0;
        }
        let baseline =
            self.daily_atr_history.iter().sum::<f64>() / self.daily_atr_history.len() as f64;
        if baseline <= 0.0 {
            1.0
        } else {
            current / baseline
        }
    }

    fn update_opening_range(&mut self, bar: &OHLCV, local_time: NaiveTime) {
        if local_time > self.config.opening_range_end {
            if !self.or_frozen {
                self.or_frozen = true;
                if let Some(or) = self.opening_range.as_mut() {
                    or.captured = true;
                }
            }
            return;
        }
        if local_time < self.config.market_open {
            return;
        }
        match self.opening_range.as_mut() {
            Some(or) => {
                or.high = or.high.max(bar.high);
                or.low = or.low.min(bar.low);
                or.timestamp = Utc::now();
            }
            None => {
                self.opening_range = Some(OpeningRange {
                    high: bar.high,
                    low: bar.low,
                    captured: false,
                    start_time: self.config.market_open,
                    end_time: self.config.opening_range_end,
                    timestamp: Utc::now(),
                });
            }
        }
    }

    fn vwap_and_slope(&self) -> (Option<f64>, f64) {
        let bars: Vec<OHLCV> = self.vwap_window.iter().copied().collect();
        let series = cumulative_vwap_series(&bars);
        let vwap = series.last().copied();
        let slope = linear_slope(&series);
        (vwap, slope)
    }

    /// Runs the full per-snapshot pipeline and returns the classified regime.
    pub fn classify(
        &mut self,
        bar: &OHLCV,
        local_time: NaiveTime,
        vix: VixContext,
        prev_day_high: f64,
        prev_day_low: f64,
    ) -> MarketRegime {
        // Step 1: opening range.
        self.update_opening_range(bar, local_time);
        let in_opening_range_period = local_time >= self.config.market_open
            && local_time <= self.config.opening_range_end;

        // True-range bookkeeping feeds step 2.
        let tr = self.true_range(bar);
        if self.true_ranges.len() == TRUE_RANGE_WINDOW {
            self.true_ranges.pop_front();
        }
        self.true_ranges.push_back(tr);
        self.prev_close = Some(bar.close);

        // Step 2: ATR-ratio.
        let atr_ratio = self.atr_ratio();

        // Step 3: VWAP + slope over the short rolling window.
        if self.vwap_window.len() == VWAP_WINDOW_CAPACITY {
            self.vwap_window.pop_front();
        }
        self.vwap_window.push_back(*bar);
        let (vwap, vwap_slope) = self.vwap_and_slope();

        // Step 4: price vs VWAP with the wider hysteresis band.
        let price = bar.close;
        let price_vs_vwap = match vwap {
            Some(vwap) if vwap > 0.0 => {
                let dev = (price - vwap) / vwap;
                if dev > PRICE_VWAP_HYSTERESIS_PCT {
                    "above"
                } else if dev < -PRICE_VWAP_HYSTERESIS_PCT {
                    "below"
                } else {
                    "at"
                }
            }
            _ => "at",
        };

        // Step 5: volatility level.
        let volatility = if atr_ratio >= 1.8 || vix.level == "extreme" {
            VolatilityLevel::Extreme
        } else if atr_ratio >= 1.3 || vix.level == "elevated" {
            VolatilityLevel::High
        } else if atr_ratio >= 0.8 && matches!(vix.level, "normal" | "low") {
            VolatilityLevel::Normal
        } else {
            VolatilityLevel::Low
        };

        // Step 6: trend vote.
        let mut bullish_votes = 0u8;
        let mut bearish_votes = 0u8;
        if let Some(vwap) = vwap {
            if vwap > 0.0 {
                let dev = (price - vwap) / vwap;
                if dev > TREND_VOTE_VWAP_BAND_PCT {
                    bullish_votes += 1;
                } else if dev < -TREND_VOTE_VWAP_BAND_PCT {
                    bearish_votes += 1;
                }
            }
        }
        if vwap_slope.abs() > TREND_VOTE_SLOPE_THRESHOLD {
            if vwap_slope > 0.0 {
                bullish_votes += 1;
            } else {
                bearish_votes += 1;
            }
        }
        let or_position = self.opening_range.map(|or| or.position(price));
        match or_position {
            Some("above") => bullish_votes += 1,
            Some("below") => bearish_votes += 1,
            _ => {}
        }
        let trend_direction = if bullish_votes >= 2 {
            TrendDirection::Up
        } else if bearish_votes >= 2 {
            TrendDirection::Down
        } else {
            TrendDirection::Sideways
        };

        // Step 7: regime classification, first matching rule wins.
        let or = self.opening_range;
        let mut regime_reasons = Vec::new();
        let regime = if in_opening_range_period {
            regime_reasons.push("Inside opening-range window".to_string());
            RegimeType::OpeningRange
        } else if volatility == VolatilityLevel::Extreme {
            regime_reasons.push("Extreme volatility".to_string());
            RegimeType::Volatile
        } else if or.is_some_and(|or| or.captured && or.is_breakout_up(price)) && trend_direction == TrendDirection::Up
        {
            regime_reasons.push("Opening-range breakout up with bullish trend vote".to_string());
            RegimeType::TrendingBullish
        } else if or.is_some_and(|or| or.captured && or.is_breakout_down(price)) && trend_direction == TrendDirection::Down
        {
            regime_reasons.push("Opening-range breakdown with bearish trend vote".to_string());
            RegimeType::TrendingBearish
        } else if vwap_slope.abs() > STEEP_SLOPE_THRESHOLD {
            if vwap_slope > 0.0 {
                regime_reasons.push("VWAP slope steeply positive".to_string());
                RegimeType::TrendingBullish
            } else {
                regime_reasons.push("VWAP slope steeply negative".to_string());
                RegimeType::TrendingBearish
            }
        } else if near_opening_range_edge(or, price) && volatility == VolatilityLevel::Low {
            regime_reasons.push("Coiling near opening-range edge in a quiet tape".to_string());
            RegimeType::PreBreakout
        } else if volatility == VolatilityLevel::High {
            regime_reasons.push("Elevated volatility without a clear trend".to_string());
            RegimeType::Volatile
        } else {
            regime_reasons.push("No trend or volatility edge".to_string());
            RegimeType::RangeBound
        };

        // Step 8: allowed setups.
        let allowed_setups = allowed_setups_for(regime, volatility);

        // Step 9: trade-allowed suppression, first match short-circuits.
        let mut trade_allowed = true;
        let mut trade_rejection_reasons = Vec::new();
        if in_opening_range_period {
            trade_allowed = false;
            trade_rejection_reasons.push("Inside opening-range window".to_string());
        } else if volatility == VolatilityLevel::Extreme {
            trade_allowed = false;
            trade_rejection_reasons.push("Extreme volatility".to_string());
        } else if regime == RegimeType::Volatile {
            trade_allowed = false;
            trade_rejection_reasons.push("Regime classified as volatile".to_string());
        } else if vix.change_pct > 10.0 {
            trade_allowed = false;
            trade_rejection_reasons.push("VIX rising more than 10%".to_string());
        } else if local_time >= self.config.new_entries_cutoff {
            trade_allowed = false;
            trade_rejection_reasons.push("Past the new-entries cutoff".to_string());
        }

        MarketRegime {
            regime,
            volatility,
            trend_direction,
            allowed_setups,
            trade_allowed,
            opening_range: or,
            atr_ratio,
            vwap_slope,
            price_vs_vwap: price_vs_vwap.to_string(),
            prev_day_high,
            prev_day_low,
            vix_direction: vix_direction_label(vix.change_pct),
            vix_level: vix.level.to_string(),
            regime_reasons,
            trade_rejection_reasons,
            timestamp: Utc::now(),
        }
    }
}

fn vix_direction_label(change_pct: f64) -> String {
    if change_pct > 3.0 {
        "rising".to_string()
    } else if change_pct < -3.0 {
        "falling".to_string()
    } else {
        "stable".to_string()
    }
}

fn near_opening_range_edge(or: Option<OpeningRange>, price: f64) -> bool {
    match or {
        Some(or) if or.captured && or.range() > 0.0 => {
            let proximity = PRE_BREAKOUT_OR_PROXIMITY_PCT * or.range();
            (price - or.high).abs() < proximity || (price - or.low).abs() < proximity
        }
        _ => false,
    }
}

fn allowed_setups_for(regime: RegimeType, volatility: VolatilityLevel) -> Vec<String> {
    let mut setups: Vec<String> = match regime {
        RegimeType::TrendingBullish => {
            vec!["pullback_to_ema9".into(), "pullback_to_vwap".into(), "breakout_continuation".into()]
        }
        RegimeType::TrendingBearish => {
            vec!["pullback_to_ema9".into(), "pullback_to_vwap".into(), "breakdown_continuation".into()]
        }
        RegimeType::RangeBound => {
            vec!["range_reversal_long".into(), "range_reversal_short".into(), "mean_reversion".into()]
        }
        RegimeType::PreBreakout => vec!["breakout_anticipation".into(), "wait_for_confirmation".into()],
        RegimeType::OpeningRange => {
            vec!["or_breakout_long".into(), "or_breakout_short".into(), "or_failure_reversal".into()]
        }
        RegimeType::Volatile => vec!["wait_for_clarity".into()],
        RegimeType::NoTrade => vec![],
    };
    if matches!(regime, RegimeType::TrendingBullish | RegimeType::TrendingBearish)
        && volatility == VolatilityLevel::Low
    {
        setups.push("momentum_entry".into());
    }
    setups
}
