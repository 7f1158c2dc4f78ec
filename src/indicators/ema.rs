// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The very first EMA value is seeded with the SMA of the first `period` closes.
// =============================================================================

/// Compute the EMA series for the given `closes` slice and look-back `period`.
///
/// Returns an empty `Vec` when the input is too short or the period is zero.
/// Each output element corresponds to a close starting at index `period - 1`.
///
/// # Edge cases
/// - `period == 0` => empty vec (division by zero guard)
/// - `closes.len() < period` => empty vec
/// - Non-finite intermediate values are skipped; the computation resets.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let divisor = (period + 1) as f64;
    // Guard against degenerate (should never happen with period >= 1, but be safe).
    if divisor == 0.0 {
        return Vec::new();
    }
    let multiplier = 2.0 / divisor;

    // Seed: SMA of the first `period` values.
    let sma: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    if !sma.is_finite() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(sma);

    let mut prev_ema = sma;
    for &close in &closes[period..] {
        let ema = close * multiplier + prev_ema * (1.0 - multiplier);
        if !ema.is_finite() {
            // If we hit a non-finite value, stop producing further results —
            // downstream consumers should not trust a broken series.
            break;
        }
        result.push(ema);
        prev_ema = ema;
    }

    result
}

const FAST_PERIOD: usize = 9;
const SLOW_PERIOD: usize = 21;

/// EMA 9/21 confluence indicator. Requires >= slow + 5 bars, else
/// neutral/0.
pub fn ema9_21_signal(closes: &[f64]) -> crate::models::signal::IndicatorSignal {
    use crate::models::signal::{IndicatorSignal, SignalDirection};

    if closes.len() < SLOW_PERIOD + 5 {
        return IndicatorSignal {
            name: "ema_9_21".into(),
            direction: SignalDirection::Neutral,
            value: 0.0,
            weight: 1.0,
            score: 0.0,
            reasoning: "Fewer than slow-period + 5 bars available".into(),
        };
    }

    let fast = calculate_ema(closes, FAST_PERIOD);
    let slow = calculate_ema(closes, SLOW_PERIOD);

    let fast_now = fast[fast.len() - 1];
    let slow_now = slow[slow.len() - 1];
    let fast_prev = fast[fast.len() - 2];
    let slow_prev = slow[slow.len() - 2];
    let price = *closes.last().unwrap();

    let fresh_bullish_cross = fast_prev <= slow_prev && fast_now > slow_now;
    let fresh_bearish_cross = fast_prev >= slow_prev && fast_now < slow_now;

    let (direction, score, reasoning) = if fresh_bullish_cross {
        (
            SignalDirection::Bullish,
            2.0,
            "Fresh bullish EMA 9/21 crossover".to_string(),
        )
    } else if fresh_bearish_cross {
        (
            SignalDirection::Bearish,
            2.0,
            "Fresh bearish EMA 9/21 crossover".to_string(),
        )
    } else if fast_now > slow_now && price > fast_now {
        (
            SignalDirection::Bullish,
            1.5,
            "Price above both EMAs, fast above slow".to_string(),
        )
    } else if fast_now > slow_now && price >= slow_now && price <= fast_now {
        (
            SignalDirection::Bullish,
            1.0,
            "Price between EMAs, fast above slow".to_string(),
        )
    } else if fast_now > slow_now {
        (
            SignalDirection::Neutral,
            0.5,
            "Fast above slow but price below both - potential weakening".to_string(),
        )
    } else if price < fast_now {
        (
            SignalDirection::Bearish,
            1.5,
            "Price below both EMAs, fast below slow".to_string(),
        )
    } else if price <= slow_now && price >= fast_now {
        (
            SignalDirection::Bearish,
            1.0,
            "Price between EMAs, fast below slow".to_string(),
        )
    } else {
        (
            SignalDirection::Neutral,
            0.5,
            "Fast below slow but price above both - potential reversal".to_string(),
        )
    };

    IndicatorSignal {
        name: "ema_9_21".into(),
        direction,
        value: fast_now - slow_now,
        weight: 1.0,
        score,
        reasoning,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::signal::SignalDirection;

    /// Helper: build a simple ascending price series.
    fn ascending(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    // ---- calculate_ema ---------------------------------------------------

    #[test]
    fn ema_empty_input() {
        assert!(calculate_ema(&[], 5).is_empty());
    }

    #[test]
    fn ema_period_zero() {
        assert!(calculate_ema(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn ema_insufficient_data() {
        assert!(calculate_ema(&[1.0, 2.0], 5).is_empty());
    }

    #[test]
    fn ema_period_equals_length() {
        let closes = vec![2.0, 4.0, 6.0];
        let ema = calculate_ema(&closes, 3);
        assert_eq!(ema.len(), 1);
        // Should be the SMA = (2+4+6)/3 = 4.0
        assert!((ema[0] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn ema_known_values() {
        // 5-period EMA of [1,2,3,4,5,6,7,8,9,10]
        // SMA of first 5 = 3.0, multiplier = 2/6 = 1/3
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let ema = calculate_ema(&closes, 5);
        assert_eq!(ema.len(), 6); // indices 4..9

        let mult = 2.0 / 6.0;
        let mut expected = 3.0; // SMA seed
        let mut expected_vec = vec![expected];
        for &c in &closes[5..] {
            expected = c * mult + expected * (1.0 - mult);
            expected_vec.push(expected);
        }
        for (a, b) in ema.iter().zip(expected_vec.iter()) {
            assert!((a - b).abs() < 1e-10, "got {a}, expected {b}");
        }
    }

    #[test]
    fn ema_handles_nan_in_input() {
        let closes = vec![1.0, 2.0, 3.0, f64::NAN, 5.0];
        let ema = calculate_ema(&closes, 3);
        // SMA of first 3 = 2.0, then next value is NaN => EMA becomes NaN => break
        // So the result should just be the seed.
        assert_eq!(ema.len(), 1);
    }

    // ---- ema9_21_signal ----------------------------------------------------

    #[test]
    fn ema_signal_insufficient_bars_is_neutral() {
        let closes = ascending(20); // need 21 + 5
        let sig = ema9_21_signal(&closes);
        assert_eq!(sig.direction, SignalDirection::Neutral);
        assert_eq!(sig.score, 0.0);
    }

    #[test]
    fn ema_signal_bullish_ascending_price_above_both() {
        let closes = ascending(60);
        let sig = ema9_21_signal(&closes);
        assert_eq!(sig.direction, SignalDirection::Bullish);
        assert_eq!(sig.score, 1.5);
    }

    #[test]
    fn ema_signal_bearish_descending_price_below_both() {
        let closes: Vec<f64> = (1..=60).rev().map(|x| x as f64).collect();
        let sig = ema9_21_signal(&closes);
        assert_eq!(sig.direction, SignalDirection::Bearish);
        assert_eq!(sig.score, 1.5);
    }

    #[test]
    fn ema_signal_fresh_bullish_crossover() {
        // A falling-then-sharply-rising series crosses the fast EMA above
        // the slow EMA on the final bar.
        let mut closes: Vec<f64> = (1..=40).rev().map(|x| x as f64).collect();
        closes.extend([60.0, 80.0, 100.0, 120.0, 140.0]);
        let sig = ema9_21_signal(&closes);
        assert_eq!(sig.direction, SignalDirection::Bullish);
        assert_eq!(sig.score, 2.0);
    }

    #[test]
    fn ema_signal_flat_series_is_weakening_neutral() {
        let closes = vec![100.0; 40];
        let sig = ema9_21_signal(&closes);
        assert_eq!(sig.direction, SignalDirection::Neutral);
        assert_eq!(sig.score, 0.5);
    }
}
