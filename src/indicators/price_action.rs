// =============================================================================
// Price Action — candlestick motif detection on the last two bars
// =============================================================================

use crate::models::signal::{IndicatorSignal, SignalDirection};
use crate::models::OHLCV;

const MIN_BARS: usize = 5;

struct Motif {
    direction: SignalDirection,
    score: f64,
    reasoning: &'static str,
}

/// Flags candlestick motifs on the last two bars and emits the
/// highest-scoring one that matches. Requires >= 5 bars, else neutral/0.
pub fn price_action_signal(bars: &[OHLCV]) -> IndicatorSignal {
    if bars.len() < MIN_BARS {
        return IndicatorSignal {
            name: "price_action".into(),
            direction: SignalDirection::Neutral,
            value: 0.0,
            weight: 1.0,
            score: 0.0,
            reasoning: "Fewer than 5 bars available".into(),
        };
    }

    let last = bars[bars.len() - 1];
    let prev = bars[bars.len() - 2];

    let mut matches: Vec<Motif> = Vec::new();

    let range = last.range();
    let body = last.body();
    let body_ratio = if range > 0.0 { body / range } else { 0.0 };

    if body_ratio > 0.7 && last.is_bullish() {
        matches.push(Motif {
            direction: SignalDirection::Bullish,
            score: 1.0,
            reasoning: "Large-body bullish candle",
        });
    }
    if body_ratio > 0.7 && last.is_bearish() {
        matches.push(Motif {
            direction: SignalDirection::Bearish,
            score: 1.0,
            reasoning: "Large-body bearish candle",
        });
    }

    let upper_wick = last.high - last.open.max(last.close);
    let lower_wick = last.open.min(last.close) - last.low;
    if lower_wick > 2.0 * body && upper_wick < 0.5 * body && body > 0.0 {
        matches.push(Motif {
            direction: SignalDirection::Bullish,
            score: 1.5,
            reasoning: "Hammer formation",
        });
    }
    if upper_wick > 2.0 * body && lower_wick < 0.5 * body && body > 0.0 {
        matches.push(Motif {
            direction: SignalDirection::Bearish,
            score: 1.5,
            reasoning: "Shooting star formation",
        });
    }

    let prev_body = prev.body();
    if body > 1.5 * prev_body && last.is_bullish() && prev.is_bearish() {
        matches.push(Motif {
            direction: SignalDirection::Bullish,
            score: 2.0,
            reasoning: "Bullish engulfing",
        });
    }
    if body > 1.5 * prev_body && last.is_bearish() && prev.is_bullish() {
        matches.push(Motif {
            direction: SignalDirection::Bearish,
            score: 2.0,
            reasoning: "Bearish engulfing",
        });
    }

    if range > 0.0 && body / range < 0.1 {
        matches.push(Motif {
            direction: SignalDirection::Neutral,
            score: 0.5,
            reasoning: "Doji - indecision",
        });
    }

    let best = matches
        .into_iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap());

    match best {
        Some(motif) => IndicatorSignal {
            name: "price_action".into(),
            direction: motif.direction,
            value: body_ratio,
            weight: 1.0,
            score: motif.score,
            reasoning: motif.reasoning.to_string(),
        },
        None => IndicatorSignal {
            name: "price_action".into(),
            direction: SignalDirection::Neutral,
            value: body_ratio,
            weight: 1.0,
            score: 0.0,
            reasoning: "No candlestick motif detected".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(n: usize) -> Vec<OHLCV> {
        (0..n)
            .map(|_| OHLCV {
                open: 100.0,
                high: 100.2,
                low: 99.8,
                close: 100.1,
                volume: 1000,
            })
            .collect()
    }

    #[test]
    fn insufficient_bars_is_neutral() {
        let bars = pad(3);
        let sig = price_action_signal(&bars);
        assert_eq!(sig.direction, SignalDirection::Neutral);
        assert_eq!(sig.score, 0.0);
    }

    #[test]
    fn large_body_bullish_candle() {
        let mut bars = pad(4);
        bars.push(OHLCV {
            open: 100.0,
            high: 110.0,
            low: 99.5,
            close: 109.0,
            volume: 1000,
        });
        let sig = price_action_signal(&bars);
        assert_eq!(sig.direction, SignalDirection::Bullish);
        assert_eq!(sig.score, 1.0);
    }

    #[test]
    fn hammer_formation_is_bullish() {
        let mut bars = pad(4);
        bars.push(OHLCV {
            open: 100.0,
            high: 100.5,
            low: 94.0,
            close: 100.2,
            volume: 1000,
        });
        let sig = price_action_signal(&bars);
        assert_eq!(sig.direction, SignalDirection::Bullish);
        assert_eq!(sig.score, 1.5);
    }

    #[test]
    fn bullish_engulfing_beats_other_motifs() {
        let mut bars = pad(3);
        bars.push(OHLCV {
            open: 105.0,
            high: 105.2,
            low: 99.0,
            close: 99.5,
            volume: 1000,
        });
        bars.push(OHLCV {
            open: 99.0,
            high: 110.0,
            low: 98.8,
            close: 109.5,
            volume: 1000,
        });
        let sig = price_action_signal(&bars);
        assert_eq!(sig.direction, SignalDirection::Bullish);
        assert_eq!(sig.score, 2.0);
    }

    #[test]
    fn doji_is_neutral_half_score() {
        let mut bars = pad(4);
        bars.push(OHLCV {
            open: 100.0,
            high: 105.0,
            low: 95.0,
            close: 100.2,
            volume: 1000,
        });
        let sig = price_action_signal(&bars);
        assert_eq!(sig.direction, SignalDirection::Neutral);
        assert_eq!(sig.score, 0.5);
    }
}
