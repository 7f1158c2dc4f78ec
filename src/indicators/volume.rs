// =============================================================================
// Volume — 20-bar relative volume signal
// =============================================================================

use crate::models::signal::{IndicatorSignal, SignalDirection};
use crate::models::OHLCV;

const LOOKBACK: usize = 20;

/// Relative-volume confluence indicator: requires >= 20 bars, else
/// neutral/0. `ratio` = current volume / 20-bar rolling mean (1.0 when the
/// mean is zero).
pub fn volume_signal(bars: &[OHLCV]) -> IndicatorSignal {
    if bars.len() < LOOKBACK {
        return IndicatorSignal {
            name: "volume_20".into(),
            direction: SignalDirection::Neutral,
            value: 0.0,
            weight: 1.0,
            score: 0.0,
            reasoning: "Fewer than 20 bars available".into(),
        };
    }

    let window = &bars[bars.len() - LOOKBACK..];
    let current = window.last().unwrap();
    let mean_volume = window.iter().map(|b| b.volume as f64).sum::<f64>() / LOOKBACK as f64;
    let ratio = if mean_volume > 0.0 {
        current.volume as f64 / mean_volume
    } else {
        1.0
    };
    let price_up = current.is_bullish();

    let (direction, score, reasoning) = if ratio > 2.0 && price_up {
        (
            SignalDirection::Bullish,
            2.0,
            format!("Volume surge {ratio:.2}x with an up bar"),
        )
    } else if ratio > 2.0 {
        (
            SignalDirection::Bearish,
            2.0,
            format!("Volume surge {ratio:.2}x with a down bar"),
        )
    } else if ratio > 1.5 && price_up {
        (
            SignalDirection::Bullish,
            1.5,
            format!("Elevated volume {ratio:.2}x on an up bar"),
        )
    } else if ratio > 1.5 {
        (
            SignalDirection::Bearish,
            1.5,
            format!("Elevated volume {ratio:.2}x on a down bar"),
        )
    } else if ratio >= 0.8 {
        (
            SignalDirection::Neutral,
            0.5,
            format!("Volume in-line with average ({ratio:.2}x)"),
        )
    } else {
        (
            SignalDirection::Neutral,
            0.0,
            format!("Volume below average ({ratio:.2}x)"),
        )
    };

    IndicatorSignal {
        name: "volume_20".into(),
        direction,
        value: ratio,
        weight: 1.0,
        score,
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_bars(n: usize, volume: u64) -> Vec<OHLCV> {
        (0..n)
            .map(|_| OHLCV {
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.5,
                volume,
            })
            .collect()
    }

    #[test]
    fn insufficient_bars_is_neutral() {
        let bars = flat_bars(10, 1000);
        let sig = volume_signal(&bars);
        assert_eq!(sig.direction, SignalDirection::Neutral);
        assert_eq!(sig.score, 0.0);
    }

    #[test]
    fn surge_with_up_bar_is_strongly_bullish() {
        let mut bars = flat_bars(19, 1000);
        bars.push(OHLCV {
            open: 100.0,
            high: 103.0,
            low: 99.5,
            close: 102.5,
            volume: 3000,
        });
        let sig = volume_signal(&bars);
        assert_eq!(sig.direction, SignalDirection::Bullish);
        assert_eq!(sig.score, 2.0);
    }

    #[test]
    fn surge_with_down_bar_is_strongly_bearish() {
        let mut bars = flat_bars(19, 1000);
        bars.push(OHLCV {
            open: 100.0,
            high: 100.5,
            low: 96.0,
            close: 97.0,
            volume: 3000,
        });
        let sig = volume_signal(&bars);
        assert_eq!(sig.direction, SignalDirection::Bearish);
        assert_eq!(sig.score, 2.0);
    }

    #[test]
    fn in_line_volume_is_neutral_half_score() {
        let bars = flat_bars(20, 1000);
        let sig = volume_signal(&bars);
        assert_eq!(sig.direction, SignalDirection::Neutral);
        assert_eq!(sig.score, 0.5);
    }
}
