// =============================================================================
// Regime Models — opening range and the classified market regime
// =============================================================================

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeType {
    TrendingBullish,
    TrendingBearish,
    RangeBound,
    Volatile,
    PreBreakout,
    OpeningRange,
    NoTrade,
}

impl Default for RegimeType {
    fn default() -> Self {
        RegimeType::NoTrade
    }
}

impl std::fmt::Display for RegimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RegimeType::TrendingBullish => "trending_bullish",
            RegimeType::TrendingBearish => "trending_bearish",
            RegimeType::RangeBound => "range_bound",
            RegimeType::Volatile => "volatile",
            RegimeType::PreBreakout => "pre_breakout",
            RegimeType::OpeningRange => "opening_range",
            RegimeType::NoTrade => "no_trade",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityLevel {
    Low,
    Normal,
    High,
    Extreme,
}

impl Default for VolatilityLevel {
    fn default() -> Self {
        VolatilityLevel::Normal
    }
}

impl std::fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VolatilityLevel::Low => "low",
            VolatilityLevel::Normal => "normal",
            VolatilityLevel::High => "high",
            VolatilityLevel::Extreme => "extreme",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Sideways,
}

impl Default for TrendDirection {
    fn default() -> Self {
        TrendDirection::Sideways
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
            TrendDirection::Sideways => "sideways",
        };
        write!(f, "{s}")
    }
}

/// The first 15 minutes' high/low, captured once per session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OpeningRange {
    pub high: f64,
    pub low: f64,
    pub captured: bool,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub timestamp: DateTime<Utc>,
}

impl OpeningRange {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn is_breakout_up(&self, price: f64) -> bool {
        price > self.high
    }

    pub fn is_breakout_down(&self, price: f64) -> bool {
        price < self.low
    }

    pub fn position(&self, price: f64) -> &'static str {
        if price > self.high {
            "above"
        } else if price < self.low {
            "below"
        } else if price >= self.midpoint() {
            "upper_half"
        } else {
            "lower_half"
        }
    }
}

/// Result of classifying the current session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRegime {
    pub regime: RegimeType,
    pub volatility: VolatilityLevel,
    pub trend_direction: TrendDirection,
    pub allowed_setups: Vec<String>,
    pub trade_allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening_range: Option<OpeningRange>,
    pub atr_ratio: f64,
    pub vwap_slope: f64,
    pub price_vs_vwap: String,
    pub prev_day_high: f64,
    pub prev_day_low: f64,
    pub vix_direction: String,
    pub vix_level: String,
    pub regime_reasons: Vec<String>,
    pub trade_rejection_reasons: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl MarketRegime {
    pub fn is_trending(&self) -> bool {
        matches!(
            self.regime,
            RegimeType::TrendingBullish | RegimeType::TrendingBearish
        )
    }

    pub fn is_tradeable_volatility(&self) -> bool {
        !matches!(self.volatility, VolatilityLevel::Extreme)
    }

    pub fn to_summary(&self) -> String {
        let status = if self.trade_allowed {
            "TRADE ALLOWED"
        } else {
            "NO TRADE"
        };
        format!(
            "Regime: {} | Volatility: {} | Trend: {} | {status}",
            self.regime, self.volatility, self.trend_direction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn or_fixture() -> OpeningRange {
        OpeningRange {
            high: 51200.0,
            low: 51000.0,
            captured: true,
            start_time: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn opening_range_derived_fields() {
        let or = or_fixture();
        assert!((or.range() - 200.0).abs() < 1e-9);
        assert!((or.midpoint() - 51100.0).abs() < 1e-9);
        assert!(or.is_breakout_up(51300.0));
        assert!(!or.is_breakout_up(51100.0));
        assert!(or.is_breakout_down(50900.0));
    }

    #[test]
    fn opening_range_position_quadrants() {
        let or = or_fixture();
        assert_eq!(or.position(51300.0), "above");
        assert_eq!(or.position(50900.0), "below");
        assert_eq!(or.position(51150.0), "upper_half");
        assert_eq!(or.position(51050.0), "lower_half");
    }

    #[test]
    fn regime_helpers() {
        let regime = MarketRegime {
            regime: RegimeType::Volatile,
            volatility: VolatilityLevel::Extreme,
            trend_direction: TrendDirection::Up,
            allowed_setups: vec!["wait_for_clarity".into()],
            trade_allowed: false,
            opening_range: Some(or_fixture()),
            atr_ratio: 1.9,
            vwap_slope: 0.2,
            price_vs_vwap: "above".into(),
            prev_day_high: 51500.0,
            prev_day_low: 50800.0,
            vix_direction: "rising".into(),
            vix_level: "extreme".into(),
            regime_reasons: vec!["Extreme volatility detected".into()],
            trade_rejection_reasons: vec!["Extreme volatility".into()],
            timestamp: Utc::now(),
        };
        assert!(!regime.is_trending());
        assert!(!regime.is_tradeable_volatility());
        assert!(regime.to_summary().contains("NO TRADE"));
    }

    #[test]
    fn regime_type_display() {
        assert_eq!(RegimeType::TrendingBullish.to_string(), "trending_bullish");
        assert_eq!(VolatilityLevel::High.to_string(), "high");
        assert_eq!(TrendDirection::Sideways.to_string(), "sideways");
    }
}
