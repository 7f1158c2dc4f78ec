// =============================================================================
// Signal Fuser — combines regime, confluence, and options intel into a
// single auditable TradeSignal
// =============================================================================
//
// A thin combiner, not a stateful engine: every upstream verdict and reason
// list is carried straight into the fused record so a rejected signal is
// fully self-explaining, in the spirit of this crate's decision-envelope
// construction pattern.

use chrono::Utc;
use uuid::Uuid;

use crate::models::signal::{ConfluenceScore, OptionsIntelligence, SignalDirection, TradeSignal};
use crate::models::MarketRegime;

/// Combines the three upstream verdicts into a fused `TradeSignal`.
pub fn fuse(regime: &MarketRegime, confluence: &ConfluenceScore, options_intel: &OptionsIntelligence) -> TradeSignal {
    let mut rejection_reasons = Vec::new();
    if !regime.trade_allowed {
        rejection_reasons.extend(regime.trade_rejection_reasons.clone());
    }
    if !confluence.meets_threshold {
        rejection_reasons.push("Confluence score below eligibility threshold".to_string());
    }
    if options_intel.has_conflict {
        if let Some(reason) = &options_intel.conflict_reason {
            rejection_reasons.push(reason.clone());
        } else {
            rejection_reasons.push("Options intelligence signals conflict".to_string());
        }
    }

    let is_valid = regime.trade_allowed && confluence.meets_threshold && !options_intel.has_conflict;

    let direction = if !is_valid {
        SignalDirection::Neutral
    } else if confluence.direction == SignalDirection::Bullish
        && options_intel.direction == SignalDirection::Bullish
    {
        SignalDirection::Bullish
    } else if confluence.direction == SignalDirection::Bearish
        && options_intel.direction == SignalDirection::Bearish
    {
        SignalDirection::Bearish
    } else {
        SignalDirection::Neutral
    };

    let is_valid = is_valid && direction != SignalDirection::Neutral;
    if !is_valid && rejection_reasons.is_empty() {
        rejection_reasons.push("Confluence and options intelligence directions disagree".to_string());
    }

    let regime_score = if regime.trade_allowed { 2.0 } else { 0.0 };
    let confluence_score = confluence.total_score;
    let options_score = options_intel.confidence * 10.0;
    let total_score = regime_score + confluence_score + options_score;

    let reasoning = regime
        .regime_reasons
        .iter()
        .chain(confluence.indicators.iter().map(|i| &i.reasoning))
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");

    let suggested_setup = regime.allowed_setups.first().cloned();
    let suggested_instrument = if is_valid {
        Some(
            if options_intel.is_extreme_iv() || options_intel.has_conflict {
                match direction {
                    SignalDirection::Bullish => "call".to_string(),
                    SignalDirection::Bearish => "put".to_string(),
                    SignalDirection::Neutral => "futures".to_string(),
                }
            } else {
                "futures".to_string()
            },
        )
    } else {
        None
    };

    TradeSignal {
        id: Uuid::new_v4(),
        direction,
        regime_score,
        confluence_score,
        options_score,
        total_score,
        regime: regime.clone(),
        confluence: confluence.clone(),
        options_intel: options_intel.clone(),
        is_valid,
        rejection_reasons,
        reasoning,
        suggested_setup,
        suggested_instrument,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::regime::{RegimeType, TrendDirection, VolatilityLevel};
    use crate::models::signal::IndicatorSignal;

    fn sample_regime(trade_allowed: bool) -> MarketRegime {
        MarketRegime {
            regime: RegimeType::TrendingBullish,
            volatility: VolatilityLevel::Normal,
            trend_direction: TrendDirection::Up,
            allowed_setups: vec!["pullback_to_ema9".into()],
            trade_allowed,
            opening_range: None,
            atr_ratio: 1.0,
            vwap_slope: 0.2,
            price_vs_vwap: "above".into(),
            prev_day_high: 51500.0,
            prev_day_low: 50800.0,
            vix_direction: "stable".into(),
            vix_level: "normal".into(),
            regime_reasons: vec![],
            trade_rejection_reasons: if trade_allowed {
                vec![]
            } else {
                vec!["Volatile regime".into()]
            },
            timestamp: Utc::now(),
        }
    }

    fn sample_confluence(direction: SignalDirection, eligible: bool) -> ConfluenceScore {
        ConfluenceScore {
            total_score: if eligible { 8.0 } else { 3.0 },
            max_score: 10.0,
            direction,
            bullish_count: 4,
            bearish_count: 0,
            neutral_count: 1,
            indicators: vec![IndicatorSignal {
                name: "ema_9_21".into(),
                direction,
                value: 1.0,
                weight: 1.0,
                score: 2.0,
                reasoning: "Fresh bullish EMA crossover".into(),
            }],
            meets_threshold: eligible,
            timestamp: Utc::now(),
        }
    }

    fn sample_options(direction: SignalDirection, has_conflict: bool) -> OptionsIntelligence {
        OptionsIntelligence {
            pcr: 1.3,
            max_pain_strike: 51100.0,
            call_oi_wall: None,
            put_oi_wall: None,
            iv_status: "normal".into(),
            iv_percentile: 50.0,
            iv_trend: "stable".into(),
            buildup: "long_buildup".into(),
            direction,
            confidence: if has_conflict { 0.0 } else { 0.8 },
            has_conflict,
            conflict_reason: if has_conflict {
                Some("manufactured conflict".into())
            } else {
                None
            },
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn fully_aligned_bullish_signal_is_valid() {
        let signal = fuse(
            &sample_regime(true),
            &sample_confluence(SignalDirection::Bullish, true),
            &sample_options(SignalDirection::Bullish, false),
        );
        assert!(signal.is_valid);
        assert_eq!(signal.direction, SignalDirection::Bullish);
        assert!((signal.total_score - (2.0 + 8.0 + 8.0)).abs() < 1e-9);
    }

    #[test]
    fn options_conflict_forces_invalid_neutral() {
        let signal = fuse(
            &sample_regime(true),
            &sample_confluence(SignalDirection::Bullish, true),
            &sample_options(SignalDirection::Bullish, true),
        );
        assert!(!signal.is_valid);
        assert_eq!(signal.direction, SignalDirection::Neutral);
        assert!(!signal.rejection_reasons.is_empty());
    }

    #[test]
    fn regime_not_allowed_forces_invalid() {
        let signal = fuse(
            &sample_regime(false),
            &sample_confluence(SignalDirection::Bullish, true),
            &sample_options(SignalDirection::Bullish, false),
        );
        assert!(!signal.is_valid);
        assert!(signal.rejection_reasons.contains(&"Volatile regime".to_string()));
    }

    #[test]
    fn disagreeing_directions_are_neutral_and_invalid() {
        let signal = fuse(
            &sample_regime(true),
            &sample_confluence(SignalDirection::Bullish, true),
            &sample_options(SignalDirection::Bearish, false),
        );
        assert!(!signal.is_valid);
        assert_eq!(signal.direction, SignalDirection::Neutral);
    }

    #[test]
    fn ineligible_confluence_is_rejected() {
        let signal = fuse(
            &sample_regime(true),
            &sample_confluence(SignalDirection::Neutral, false),
            &sample_options(SignalDirection::Bullish, false),
        );
        assert!(!signal.is_valid);
    }
}
