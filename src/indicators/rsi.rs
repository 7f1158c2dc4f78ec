// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Seed average gain / average loss with the SMA of the first `period`
//          gains / losses.
// Step 3 — Apply Wilder's exponential smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Thresholds:  RSI > 70 => OVERBOUGHT,  RSI < 30 => OVERSOLD.
// =============================================================================

/// Compute the full RSI series for the given `closes` and `period`.
///
/// The returned vector has one RSI value for each close starting at index
/// `period` (the first `period` closes are consumed to seed the averages).
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `closes.len() < period + 1` => empty vec (need at least `period` deltas)
/// - If average loss is zero (no down moves), RSI is clamped to 100.0.
/// - Non-finite results are dropped and the series is truncated.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    // --- Compute price deltas ------------------------------------------------
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    // --- Seed averages with SMA of first `period` deltas ---------------------
    let (sum_gain, sum_loss) = deltas[..period].iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
        if d > 0.0 {
            (g + d, l)
        } else {
            (g, l + d.abs())
        }
    });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    // First RSI value.
    let first_rsi = rsi_from_averages(avg_gain, avg_loss);
    if first_rsi.is_none() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(deltas.len() - period + 1);
    result.push(first_rsi.unwrap());

    // --- Wilder's smoothing for subsequent values ----------------------------
    for &delta in &deltas[period..] {
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { delta.abs() } else { 0.0 };

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        match rsi_from_averages(avg_gain, avg_loss) {
            Some(rsi) => result.push(rsi),
            None => break, // Non-finite — stop producing values.
        }
    }

    result
}

/// Convenience function: return the most recent RSI value together with a
/// human-readable label.
///
/// Returns `None` when there is insufficient data or the calculation produces
/// a non-finite result.
pub fn current_rsi(closes: &[f64], period: usize) -> Option<(f64, &'static str)> {
    let series = calculate_rsi(closes, period);
    let value = *series.last()?;

    let label = if value >= 70.0 {
        "OVERBOUGHT"
    } else if value <= 30.0 {
        "OVERSOLD"
    } else {
        "NEUTRAL"
    };

    Some((value, label))
}

const RSI_PERIOD: usize = 14;

/// RSI 14 confluence indicator. Requires >= period + 5 bars, else
/// neutral/0. Bands by the current value with a rising/falling qualifier
/// from the previous bar.
pub fn rsi_signal(closes: &[f64]) -> crate::models::signal::IndicatorSignal {
    use crate::models::signal::{IndicatorSignal, SignalDirection};

    if closes.len() < RSI_PERIOD + 5 {
        return IndicatorSignal {
            name: "rsi_14".into(),
            direction: SignalDirection::Neutral,
            value: 0.0,
            weight: 1.0,
            score: 0.0,
            reasoning: "Fewer than period + 5 bars available".into(),
        };
    }

    let series = calculate_rsi(closes, RSI_PERIOD);
    let value = *series.last().unwrap();
    let rising = series.len() >= 2 && value > series[series.len() - 2];
    let falling = series.len() >= 2 && value < series[series.len() - 2];

    let (direction, score, reasoning) = if value < 25.0 {
        (SignalDirection::Bullish, 2.0, format!("RSI {value:.1} deeply oversold"))
    } else if value < 30.0 {
        (SignalDirection::Bullish, 1.5, format!("RSI {value:.1} oversold"))
    } else if value < 40.0 {
        if rising {
            (SignalDirection::Bullish, 0.5, format!("RSI {value:.1} rising out of the lower band"))
        } else {
            (SignalDirection::Bullish, 0.0, format!("RSI {value:.1} in the lower band, not yet rising"))
        }
    } else if value < 60.0 {
        (SignalDirection::Neutral, 0.0, format!("RSI {value:.1} in the neutral band"))
    } else if value < 70.0 {
        if falling {
            (SignalDirection::Bearish, 0.5, format!("RSI {value:.1} falling out of the upper band"))
        } else {
            (SignalDirection::Bearish, 0.0, format!("RSI {value:.1} in the upper band, not yet falling"))
        }
    } else if value < 75.0 {
        (SignalDirection::Bearish, 1.5, format!("RSI {value:.1} overbought"))
    } else {
        (SignalDirection::Bearish, 2.0, format!("RSI {value:.1} deeply overbought"))
    };

    IndicatorSignal {
        name: "rsi_14".into(),
        direction,
        value,
        weight: 1.0,
        score,
        reasoning,
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// - If both averages are zero, RSI is 50.0 (no movement).
/// - If average loss is zero (only gains), RSI is 100.0.
/// - Returns `None` when the result is non-finite.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // No movement at all — neutral.
    } else if avg_loss == 0.0 {
        100.0 // All gains, no losses.
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi)
    } else {
        None
    }
}
