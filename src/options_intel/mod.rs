// =============================================================================
// Options Intelligence — PCR, straddle, IV regime, ΔOI buildup, walls,
// max pain, and the hard-coded conflict-detection safety gate
// =============================================================================
//
// Carries state across calls: the previous chain reference, previous PCR
// and straddle premium (for change tracking), and a bounded IV history used
// for percentile ranking. `reset_day()` clears the chain/PCR/straddle
// fields but deliberately retains the IV history so the percentile stays
// meaningful across sessions.

use std::collections::VecDeque;

use chrono::Utc;

use crate::models::signal::{OptionsIntelligence, SignalDirection};
use crate::models::OptionsChain;

const IV_HISTORY_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Buildup {
    LongBuildup,
    ShortBuildup,
    ShortCovering,
    LongUnwinding,
    Neutral,
}

impl Buildup {
    fn label(self) -> &'static str {
        match self {
            Buildup::LongBuildup => "long_buildup",
            Buildup::ShortBuildup => "short_buildup",
            Buildup::ShortCovering => "short_covering",
            Buildup::LongUnwinding => "long_unwinding",
            Buildup::Neutral => "neutral",
        }
    }

    fn vote(self) -> SignalDirection {
        match self {
            Buildup::LongBuildup | Buildup::ShortCovering => SignalDirection::Bullish,
            Buildup::ShortBuildup | Buildup::LongUnwinding => SignalDirection::Bearish,
            Buildup::Neutral => SignalDirection::Neutral,
        }
    }
}

/// Stateful options-chain analysis engine. One instance per symbol.
pub struct OptionsIntelEngine {
    prev_chain: Option<OptionsChain>,
    prev_pcr: f64,
    prev_straddle: f64,
    iv_history: VecDeque<f64>,
}

impl Default for OptionsIntelEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionsIntelEngine {
    pub fn new() -> Self {
        Self {
            prev_chain: None,
            prev_pcr: 0.0,
            prev_straddle: 0.0,
            iv_history: VecDeque::with_capacity(IV_HISTORY_LEN),
        }
    }

    /// Clears chain/PCR/straddle state for a new trading day; IV history is
    /// retained so the percentile remains meaningful across sessions.
    pub fn reset_day(&mut self) {
        self.prev_chain = None;
        self.prev_pcr = 0.0;
        self.prev_straddle = 0.0;
    }

    pub fn analyze(&mut self, chain: &OptionsChain) -> OptionsIntelligence {
        let pcr = chain.pcr();
        let pcr_interpretation = if pcr > 1.2 {
            SignalDirection::Bullish
        } else if pcr < 0.8 {
            SignalDirection::Bearish
        } else {
            SignalDirection::Neutral
        };

        let straddle = chain.atm_straddle_premium();

        let atm_iv = match (chain.atm_call(), chain.atm_put()) {
            (Some(c), Some(p)) => (c.greeks.iv + p.greeks.iv) / 2.0,
            (Some(c), None) => c.greeks.iv,
            (None, Some(p)) => p.greeks.iv,
            (None, None) => 0.0,
        };
        self.iv_history.push_back(atm_iv);
        while self.iv_history.len() > IV_HISTORY_LEN {
            self.iv_history.pop_front();
        }

        let iv_percentile = iv_percentile_rank(&self.iv_history, atm_iv);
        let iv_status = iv_status_label(iv_percentile);
        let iv_trend = iv_trend_label(&self.iv_history);

        let call_delta_oi: i64 = chain.calls.iter().map(|c| c.oi_change).sum();
        let put_delta_oi: i64 = chain.puts.iter().map(|p| p.oi_change).sum();
        let buildup = classify_buildup(call_delta_oi, put_delta_oi);

        let (call_wall, put_wall) = chain.top_oi_walls();
        let call_wall_strike = call_wall.filter(|w| w.strike > 0.0).map(|w| w.strike);
        let put_wall_strike = put_wall.filter(|w| w.strike > 0.0).map(|w| w.strike);
        let wall_hint = wall_directional_hint(chain.spot_price, call_wall_strike, put_wall_strike);

        let max_pain_strike = chain.max_pain_strike();

        let votes = [buildup.vote(), pcr_interpretation, wall_hint];
        let bullish_votes = votes.iter().filter(|v| **v == SignalDirection::Bullish).count();
        let bearish_votes = votes.iter().filter(|v| **v == SignalDirection::Bearish).count();

        let aggregate_direction = if bullish_votes > bearish_votes {
            SignalDirection::Bullish
        } else if bearish_votes > bullish_votes {
            SignalDirection::Bearish
        } else {
            SignalDirection::Neutral
        };

        let buildup_bullish = matches!(buildup, Buildup::LongBuildup | Buildup::ShortCovering);
        let buildup_bearish = matches!(buildup, Buildup::ShortBuildup | Buildup::LongUnwinding);

        let distinct_non_neutral = bullish_votes > 0 && bearish_votes > 0;

        let mut conflict_reasons: Vec<String> = Vec::new();
        if bullish_votes > 0 && bearish_votes > 0 {
            conflict_reasons.push("Options signal bag has both long and short votes".to_string());
        }
        if (buildup_bullish && pcr_interpretation == SignalDirection::Bearish)
            || (buildup_bearish && pcr_interpretation == SignalDirection::Bullish)
        {
            conflict_reasons.push(format!(
                "OI buildup ({}) disagrees with PCR interpretation",
                buildup.label()
            ));
        }
        if iv_trend == "expanding" && distinct_non_neutral {
            conflict_reasons.push("IV expanding while signals disagree".to_string());
        }

        let has_conflict = !conflict_reasons.is_empty();

        let (direction, confidence) = if has_conflict {
            (SignalDirection::Neutral, 0.0)
        } else {
            let dominant_count = match aggregate_direction {
                SignalDirection::Bullish => bullish_votes,
                SignalDirection::Bearish => bearish_votes,
                SignalDirection::Neutral => 0,
            };
            if dominant_count == 0 {
                (aggregate_direction, 0.0)
            } else {
                let multiplier = iv_multiplier(iv_status);
                let raw = (dominant_count as f64 / votes.len() as f64) * multiplier;
                (aggregate_direction, raw.min(1.0))
            }
        };

        self.prev_pcr = pcr;
        self.prev_straddle = straddle;
        self.prev_chain = Some(chain.clone());

        OptionsIntelligence {
            pcr,
            max_pain_strike,
            call_oi_wall: call_wall_strike,
            put_oi_wall: put_wall_strike,
            iv_status: iv_status.to_string(),
            iv_percentile,
            iv_trend: iv_trend.to_string(),
            buildup: buildup.label().to_string(),
            direction,
            confidence,
            has_conflict,
            conflict_reason: if conflict_reasons.is_empty() {
                None
            } else {
                Some(conflict_reasons.join("; "))
            },
            timestamp: Utc::now(),
        }
    }
}

fn classify_buildup(call_delta_oi: i64, put_delta_oi: i64) -> Buildup {
    let calls_up = call_delta_oi > 0;
    let puts_up = put_delta_oi > 0;
    let calls_down = call_delta_oi < 0;
    let puts_down = put_delta_oi < 0;

    if calls_up && puts_up {
        if put_delta_oi > call_delta_oi {
            Buildup::LongBuildup
        } else {
            Buildup::ShortBuildup
        }
    } else if calls_down && puts_down {
        if call_delta_oi.abs() > put_delta_oi.abs() {
            Buildup::ShortCovering
        } else {
            Buildup::LongUnwinding
        }
    } else if puts_up && !calls_up {
        Buildup::LongBuildup
    } else if calls_up && !puts_up {
        Buildup::ShortBuildup
    } else {
        Buildup::Neutral
    }
}

fn wall_directional_hint(
    spot: f64,
    call_wall: Option<f64>,
    put_wall: Option<f64>,
) -> SignalDirection {
    match (call_wall, put_wall) {
        (Some(call), Some(put)) => {
            let call_dist = (call - spot).abs();
            let put_dist = (put - spot).abs();
            if call_dist < put_dist {
                SignalDirection::Bearish
            } else if put_dist < call_dist {
                SignalDirection::Bullish
            } else {
                SignalDirection::Neutral
            }
        }
        _ => SignalDirection::Neutral,
    }
}

fn iv_percentile_rank(history: &VecDeque<f64>, current: f64) -> f64 {
    if history.len() < 5 {
        return 50.0;
    }
    let below = history.iter().filter(|&&v| v <= current).count();
    (below as f64 / history.len() as f64) * 100.0
}

fn iv_status_label(percentile: f64) -> &'static str {
    if percentile < 20.0 {
        "low"
    } else if percentile < 50.0 {
        "normal"
    } else if percentile < 80.0 {
        "elevated"
    } else {
        "extreme"
    }
}

fn iv_multiplier(status: &str) -> f64 {
    match status {
        "low" => 0.8,
        "normal" => 1.0,
        "elevated" => 0.9,
        "extreme" => 0.7,
        _ => 1.0,
    }
}

fn iv_trend_label(history: &VecDeque<f64>) -> &'static str {
    if history.len() < 3 {
        return "stable";
    }
    let n = history.len();
    let a = history[n - 3];
    let b = history[n - 2];
    let c = history[n - 1];
    if a < b && b < c {
        "expanding"
    } else if a > b && b > c {
        "contracting"
    } else {
        "stable"
    }
}
