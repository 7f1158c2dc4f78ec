// =============================================================================
// Volume Weighted Average Price (VWAP) — session bands and slope
// =============================================================================
//
// VWAP anchors price to where volume actually traded during the session.
// The bands are the cumulative volume-weighted standard deviation of typical
// price around that anchor; slope is a linear fit over the cumulative VWAP
// series, used by the regime classifier to vote on trend direction.

use crate::models::signal::{IndicatorSignal, SignalDirection};
use crate::models::OHLCV;

/// Session VWAP plus its +/-1 and +/-2 standard-deviation bands.
#[derive(Debug, Clone, Copy)]
pub struct VwapBands {
    pub vwap: f64,
    pub upper_1: f64,
    pub lower_1: f64,
    pub upper_2: f64,
    pub lower_2: f64,
}

fn typical_price(bar: &OHLCV) -> f64 {
    (bar.high + bar.low + bar.close) / 3.0
}

/// Cumulative VWAP after every bar, from the cumulative sum of
/// volume-weighted typical price over volume. Returns one value per input
/// bar; empty when `bars` is empty or every bar carries zero volume.
pub fn cumulative_vwap_series(bars: &[OHLCV]) -> Vec<f64> {
    let mut cum_pv = 0.0;
    let mut cum_vol = 0.0;
    let mut out = Vec::with_capacity(bars.len());
    for bar in bars {
        cum_pv += typical_price(bar) * bar.volume as f64;
        cum_vol += bar.volume as f64;
        if cum_vol > 0.0 {
            out.push(cum_pv / cum_vol);
        }
    }
    out
}

/// Coefficient of a degree-1 least-squares fit of `series` against its
/// index. Returns 0.0 when fewer than 5 points are supplied.
pub fn linear_slope(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 5 {
        return 0.0;
    }
    let n_f = n as f64;
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let mean_x = xs.iter().sum::<f64>() / n_f;
    let mean_y = series.iter().sum::<f64>() / n_f;

    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in xs.iter().zip(series.iter()) {
        num += (x - mean_x) * (y - mean_y);
        den += (x - mean_x).powi(2);
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Session VWAP and its volume-weighted +/-1, +/-2 std-dev bands.
///
/// Requires at least 5 bars and nonzero cumulative volume; returns `None`
/// otherwise.
pub fn compute_vwap_bands(bars: &[OHLCV]) -> Option<VwapBands> {
    if bars.len() < 5 {
        return None;
    }

    let total_volume: f64 = bars.iter().map(|b| b.volume as f64).sum();
    if total_volume <= 0.0 {
        return None;
    }

    let vwap = bars
        .iter()
        .map(|b| typical_price(b) * b.volume as f64)
        .sum::<f64>()
        / total_volume;

    let variance = bars
        .iter()
        .map(|b| {
            let diff = typical_price(b) - vwap;
            diff * diff * b.volume as f64
        })
        .sum::<f64>()
        / total_volume;
    let std_dev = variance.sqrt();

    Some(VwapBands {
        vwap,
        upper_1: vwap + std_dev,
        lower_1: vwap - std_dev,
        upper_2: vwap + 2.0 * std_dev,
        lower_2: vwap - 2.0 * std_dev,
    })
}

/// VWAP-bands confluence indicator. Requires >= 5 bars, else neutral/0.
pub fn vwap_signal(bars: &[OHLCV]) -> IndicatorSignal {
    let bands = match compute_vwap_bands(bars) {
        Some(b) => b,
        None => {
            return IndicatorSignal {
                name: "vwap_bands".into(),
                direction: SignalDirection::Neutral,
                value: 0.0,
                weight: 1.0,
                score: 0.0,
                reasoning: "Fewer than 5 bars available".into(),
            }
        }
    };

    let price = bars.last().unwrap().close;

    let (direction, score, reasoning) = if price > bands.upper_2 {
        (
            SignalDirection::Bullish,
            0.5,
            "Price above +2 sigma band - long but extended".to_string(),
        )
    } else if price > bands.upper_1 {
        (
            SignalDirection::Bullish,
            1.0,
            "Price above +1 sigma band".to_string(),
        )
    } else if price > bands.vwap {
        (
            SignalDirection::Bullish,
            1.5,
            "Price above VWAP".to_string(),
        )
    } else if price < bands.lower_2 {
        (
            SignalDirection::Bearish,
            0.5,
            "Price below -2 sigma band - short but extended".to_string(),
        )
    } else if price < bands.lower_1 {
        (
            SignalDirection::Bearish,
            1.0,
            "Price below -1 sigma band".to_string(),
        )
    } else if price < bands.vwap {
        (
            SignalDirection::Bearish,
            1.5,
            "Price below VWAP".to_string(),
        )
    } else {
        (SignalDirection::Neutral, 0.0, "Price at VWAP".to_string())
    };

    IndicatorSignal {
        name: "vwap_bands".into(),
        direction,
        value: price - bands.vwap,
        weight: 1.0,
        score,
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(high: f64, low: f64, close: f64, volume: u64) -> OHLCV {
        OHLCV {
            open: (high + low) / 2.0,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn bands_require_five_bars() {
        let bars = vec![bar(101.0, 99.0, 100.0, 1000); 4];
        assert!(compute_vwap_bands(&bars).is_none());
    }

    #[test]
    fn bands_zero_volume_returns_none() {
        let bars = vec![bar(101.0, 99.0, 100.0, 0); 5];
        assert!(compute_vwap_bands(&bars).is_none());
    }

    #[test]
    fn bands_flat_series_has_zero_width() {
        let bars = vec![bar(100.0, 100.0, 100.0, 1000); 6];
        let bands = compute_vwap_bands(&bars).unwrap();
        assert!((bands.vwap - 100.0).abs() < 1e-9);
        assert!((bands.upper_1 - bands.vwap).abs() < 1e-9);
        assert!((bands.lower_2 - bands.vwap).abs() < 1e-9);
    }

    #[test]
    fn slope_below_five_points_is_zero() {
        assert_eq!(linear_slope(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn slope_rising_series_positive() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert!(linear_slope(&series) > 0.0);
    }

    #[test]
    fn slope_flat_series_is_zero() {
        let series = vec![5.0; 8];
        assert!((linear_slope(&series)).abs() < 1e-9);
    }

    #[test]
    fn cumulative_series_tracks_weighted_average() {
        let bars = vec![bar(101.0, 99.0, 100.0, 100), bar(103.0, 101.0, 102.0, 300)];
        let series = cumulative_vwap_series(&bars);
        assert_eq!(series.len(), 2);
        assert!(series[1] > series[0]);
    }

    #[test]
    fn vwap_signal_above_band_is_bullish_extended() {
        let mut bars = vec![bar(100.0, 98.0, 99.0, 1000); 5];
        bars.push(bar(140.0, 138.0, 139.0, 1000));
        let sig = vwap_signal(&bars);
        assert_eq!(sig.direction, SignalDirection::Bullish);
        assert_eq!(sig.score, 0.5);
    }

    #[test]
    fn vwap_signal_insufficient_bars_is_neutral() {
        let bars = vec![bar(100.0, 98.0, 99.0, 1000); 3];
        let sig = vwap_signal(&bars);
        assert_eq!(sig.direction, SignalDirection::Neutral);
        assert_eq!(sig.score, 0.0);
    }
}
