// =============================================================================
// Signal Models — indicator contributions, confluence score, options
// intelligence, and the fused trade signal
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::regime::{MarketRegime, TrendDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl Default for SignalDirection {
    fn default() -> Self {
        SignalDirection::Neutral
    }
}

impl std::fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalDirection::Bullish => "bullish",
            SignalDirection::Bearish => "bearish",
            SignalDirection::Neutral => "neutral",
        };
        write!(f, "{s}")
    }
}

/// Maps the regime's trend vote onto a signal direction so the confluence
/// scorer can weight indicator agreement against the prevailing regime.
impl From<TrendDirection> for SignalDirection {
    fn from(trend: TrendDirection) -> Self {
        match trend {
            TrendDirection::Up => SignalDirection::Bullish,
            TrendDirection::Down => SignalDirection::Bearish,
            TrendDirection::Sideways => SignalDirection::Neutral,
        }
    }
}

/// One indicator's vote, carrying its own weighted score contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSignal {
    pub name: String,
    pub direction: SignalDirection,
    pub value: f64,
    pub weight: f64,
    pub score: f64,
    pub reasoning: String,
}

/// Aggregate of the five confluence indicators, 0-10 scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfluenceScore {
    pub total_score: f64,
    pub max_score: f64,
    pub direction: SignalDirection,
    pub bullish_count: u8,
    pub bearish_count: u8,
    pub neutral_count: u8,
    pub indicators: Vec<IndicatorSignal>,
    pub meets_threshold: bool,
    pub timestamp: DateTime<Utc>,
}

impl ConfluenceScore {
    /// Strict supermajority: bullish indicators must outnumber bearish and
    /// neutral combined (and likewise for bearish). Anything short of that
    /// resolves to neutral -- there is no plurality fallback.
    pub fn resolve_direction(bullish: u8, bearish: u8, neutral: u8) -> SignalDirection {
        if bullish > bearish + neutral {
            SignalDirection::Bullish
        } else if bearish > bullish + neutral {
            SignalDirection::Bearish
        } else {
            SignalDirection::Neutral
        }
    }
}

/// Options-chain derived context: buildup, PCR, IV regime, OI walls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsIntelligence {
    pub pcr: f64,
    pub max_pain_strike: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_oi_wall: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_oi_wall: Option<f64>,
    pub iv_status: String,
    pub iv_percentile: f64,
    pub iv_trend: String,
    pub buildup: String,
    pub direction: SignalDirection,
    pub confidence: f64,
    pub has_conflict: bool,
    pub conflict_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl OptionsIntelligence {
    pub fn is_extreme_iv(&self) -> bool {
        self.iv_status == "extreme"
    }
}

/// The fully fused trading signal: regime + confluence + options intel,
/// combined into a single go/no-go decision with a supporting score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub id: Uuid,
    pub direction: SignalDirection,
    pub regime_score: f64,
    pub confluence_score: f64,
    pub options_score: f64,
    pub total_score: f64,
    pub regime: MarketRegime,
    pub confluence: ConfluenceScore,
    pub options_intel: OptionsIntelligence,
    pub is_valid: bool,
    pub rejection_reasons: Vec<String>,
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_setup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_instrument: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TradeSignal {
    pub fn confidence(&self) -> f64 {
        (self.total_score / 30.0).clamp(0.0, 1.0)
    }
}
