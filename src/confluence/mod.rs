// =============================================================================
// Confluence Scorer — aggregates the five stateless indicators
// =============================================================================
//
// Each indicator is a tagged variant with a single compute(window) ->
// IndicatorSignal operation; no deep trait hierarchy is needed since every
// indicator shares the same signature. This module owns only the
// aggregation rule: direction is a strict supermajority vote, and each
// indicator's contribution to the total score is weighted by whether it
// agrees with the prevailing regime direction (full weight when aligned,
// half when neutral, zero when opposed).

use chrono::Utc;

use crate::indicators::{ema, price_action, rsi, volume, vwap};
use crate::models::signal::{ConfluenceScore, IndicatorSignal, SignalDirection};
use crate::models::OHLCV;

/// Five indicators, each contributing at most 2.0 points.
const MAX_CONFLUENCE_SCORE: f64 = 10.0;

/// Scores confluence across the five indicators, optionally weighting each
/// contribution by agreement with a supplied regime direction.
#[derive(Debug, Clone, Copy)]
pub struct ConfluenceScorer {
    min_score: f64,
}

impl ConfluenceScorer {
    pub fn new(min_score: f64) -> Self {
        Self { min_score }
    }

    /// Runs all five indicators against `bars` (oldest first, most recent
    /// last) and aggregates them into a `ConfluenceScore`.
    pub fn score(&self, bars: &[OHLCV], regime_direction: Option<SignalDirection>) -> ConfluenceScore {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let indicators = vec![
            vwap::vwap_signal(bars),
            ema::ema9_21_signal(&closes),
            rsi::rsi_signal(&closes),
            volume::volume_signal(bars),
            price_action::price_action_signal(bars),
        ];

        let mut bullish_count = 0u8;
        let mut bearish_count = 0u8;
        let mut neutral_count = 0u8;
        let mut total_score = 0.0;

        for indicator in &indicators {
            match indicator.direction {
                SignalDirection::Bullish => bullish_count += 1,
                SignalDirection::Bearish => bearish_count += 1,
                SignalDirection::Neutral => neutral_count += 1,
            }
            total_score += aligned_contribution(indicator, regime_direction);
        }

        let direction = ConfluenceScore::resolve_direction(bullish_count, bearish_count, neutral_count);
        let meets_threshold = total_score >= self.min_score && direction != SignalDirection::Neutral;

        ConfluenceScore {
            total_score,
            max_score: MAX_CONFLUENCE_SCORE,
            direction,
            bullish_count,
            bearish_count,
            neutral_count,
            indicators,
            meets_threshold,
            timestamp: Utc::now(),
        }
    }
}

/// Regime-aligned contribution: full when the indicator agrees with the
/// regime direction, half when the indicator is neutral, zero when it
/// opposes. With no regime direction supplied, the indicator's own score
/// counts in full.
fn aligned_contribution(indicator: &IndicatorSignal, regime_direction: Option<SignalDirection>) -> f64 {
    match regime_direction {
        None => indicator.score,
        Some(regime_dir) => {
            if indicator.direction == regime_dir {
                indicator.score
            } else if indicator.direction == SignalDirection::Neutral {
                indicator.score * 0.5
            } else {
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_bars(n: usize) -> Vec<OHLCV> {
        (0..n)
            .map(|_| OHLCV {
                open: 100.0,
                high: 100.5,
                low: 99.5,
                close: 100.0,
                volume: 1000,
            })
            .collect()
    }

    #[test]
    fn insufficient_bars_is_all_neutral_ineligible() {
        let scorer = ConfluenceScorer::new(7.0);
        let score = scorer.score(&flat_bars(3), None);
        assert_eq!(score.neutral_count, 5);
        assert!(!score.meets_threshold);
    }

    #[test]
    fn rising_series_trends_bullish() {
        let scorer = ConfluenceScorer::new(7.0);
        let bars: Vec<OHLCV> = (0..40)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                OHLCV {
                    open: base,
                    high: base + 1.0,
                    low: base - 0.5,
                    close: base + 0.8,
                    volume: 1000 + i as u64 * 10,
                }
            })
            .collect();
        let score = scorer.score(&bars, None);
        assert_eq!(score.direction, SignalDirection::Bullish);
        assert!(score.bullish_count > score.bearish_count + score.neutral_count);
    }

    #[test]
    fn opposed_regime_direction_zeroes_contribution() {
        let scorer = ConfluenceScorer::new(7.0);
        let bars: Vec<OHLCV> = (0..40)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                OHLCV {
                    open: base,
                    high: base + 1.0,
                    low: base - 0.5,
                    close: base + 0.8,
                    volume: 1000 + i as u64 * 10,
                }
            })
            .collect();
        let aligned = scorer.score(&bars, Some(SignalDirection::Bullish));
        let opposed = scorer.score(&bars, Some(SignalDirection::Bearish));
        assert!(opposed.total_score < aligned.total_score);
    }
}
