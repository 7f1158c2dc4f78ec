// =============================================================================
// Market Data Models — spot, futures, options chain, VIX
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OHLCV {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl OHLCV {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Bank Nifty spot index tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotData {
    #[serde(default = "default_underlying_symbol")]
    pub symbol: String,
    pub ltp: f64,
    pub ohlcv: OHLCV,
    pub prev_close: f64,
    pub timestamp: DateTime<Utc>,
}

impl SpotData {
    pub fn change(&self) -> f64 {
        self.ltp - self.prev_close
    }

    pub fn change_pct(&self) -> f64 {
        if self.prev_close > 0.0 {
            (self.change() / self.prev_close) * 100.0
        } else {
            0.0
        }
    }

    pub fn day_range_pct(&self) -> f64 {
        if self.prev_close > 0.0 {
            (self.ohlcv.range() / self.prev_close) * 100.0
        } else {
            0.0
        }
    }
}

/// Current-month Bank Nifty futures tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuturesData {
    pub symbol: String,
    pub ltp: f64,
    pub ohlcv: OHLCV,
    pub open_interest: u64,
    #[serde(default)]
    pub oi_change: i64,
    pub expiry: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

impl FuturesData {
    pub fn calculate_basis(&self, spot_ltp: f64) -> f64 {
        self.ltp - spot_ltp
    }

    pub fn calculate_basis_pct(&self, spot_ltp: f64) -> f64 {
        if spot_ltp > 0.0 {
            (self.calculate_basis(spot_ltp) / spot_ltp) * 100.0
        } else {
            0.0
        }
    }
}

/// Black-Scholes greeks for a single option contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OptionGreeks {
    #[serde(default)]
    pub delta: f64,
    #[serde(default)]
    pub gamma: f64,
    #[serde(default)]
    pub theta: f64,
    #[serde(default)]
    pub vega: f64,
    #[serde(default)]
    pub iv: f64,
}

impl Default for OptionGreeks {
    fn default() -> Self {
        Self {
            delta: 0.0,
            gamma: 0.0,
            theta: 0.0,
            vega: 0.0,
            iv: 0.0,
        }
    }
}

/// A single strike/option-type leg in the options chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionData {
    pub symbol: String,
    pub strike: f64,
    pub option_type: String,
    pub ltp: f64,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
    pub open_interest: u64,
    #[serde(default)]
    pub oi_change: i64,
    #[serde(default)]
    pub volume: u64,
    pub greeks: OptionGreeks,
    pub expiry: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

impl OptionData {
    pub fn spread(&self) -> f64 {
        if self.bid > 0.0 && self.ask > 0.0 {
            self.ask - self.bid
        } else {
            0.0
        }
    }

    pub fn spread_pct(&self) -> f64 {
        if self.ltp > 0.0 {
            (self.spread() / self.ltp) * 100.0
        } else {
            0.0
        }
    }
}

/// A full options chain snapshot (ATM +/- N strikes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsChain {
    #[serde(default = "default_underlying_symbol")]
    pub underlying: String,
    pub spot_price: f64,
    pub atm_strike: f64,
    pub expiry: DateTime<Utc>,
    pub calls: Vec<OptionData>,
    pub puts: Vec<OptionData>,
    pub timestamp: DateTime<Utc>,
}

/// Top-of-book open-interest wall on a single side.
#[derive(Debug, Clone, Copy)]
pub struct OiWall {
    pub strike: f64,
    pub open_interest: u64,
}

impl OptionsChain {
    pub fn atm_call(&self) -> Option<&OptionData> {
        self.calls.iter().find(|c| c.strike == self.atm_strike)
    }

    pub fn atm_put(&self) -> Option<&OptionData> {
        self.puts.iter().find(|p| p.strike == self.atm_strike)
    }

    pub fn atm_straddle_premium(&self) -> f64 {
        match (self.atm_call(), self.atm_put()) {
            (Some(c), Some(p)) => c.ltp + p.ltp,
            _ => 0.0,
        }
    }

    pub fn total_call_oi(&self) -> u64 {
        self.calls.iter().map(|c| c.open_interest).sum()
    }

    pub fn total_put_oi(&self) -> u64 {
        self.puts.iter().map(|p| p.open_interest).sum()
    }

    pub fn pcr(&self) -> f64 {
        let call_oi = self.total_call_oi();
        if call_oi == 0 {
            0.0
        } else {
            self.total_put_oi() as f64 / call_oi as f64
        }
    }

    /// Strike minimising aggregate option-writer pain, scanned over every
    /// distinct call strike. Falls back to `atm_strike` when either leg is
    /// empty.
    pub fn max_pain_strike(&self) -> f64 {
        if self.calls.is_empty() || self.puts.is_empty() {
            return self.atm_strike;
        }

        let mut best_strike = self.atm_strike;
        let mut best_pain = f64::INFINITY;

        for candidate in self.calls.iter().map(|c| c.strike) {
            let call_pain: f64 = self
                .calls
                .iter()
                .filter(|c| c.strike < candidate)
                .map(|c| (candidate - c.strike) * c.open_interest as f64)
                .sum();
            let put_pain: f64 = self
                .puts
                .iter()
                .filter(|p| p.strike > candidate)
                .map(|p| (p.strike - candidate) * p.open_interest as f64)
                .sum();
            let pain = call_pain + put_pain;
            if pain < best_pain {
                best_pain = pain;
                best_strike = candidate;
            }
        }

        best_strike
    }

    /// Single highest-OI strike on each side (the wall that actually gates
    /// trade construction — deeper book levels are not consumed downstream).
    pub fn top_oi_walls(&self) -> (Option<OiWall>, Option<OiWall>) {
        let call_wall = self
            .calls
            .iter()
            .max_by_key(|c| c.open_interest)
            .map(|c| OiWall {
                strike: c.strike,
                open_interest: c.open_interest,
            });
        let put_wall = self
            .puts
            .iter()
            .max_by_key(|p| p.open_interest)
            .map(|p| OiWall {
                strike: p.strike,
                open_interest: p.open_interest,
            });
        (call_wall, put_wall)
    }
}

/// India VIX tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VIXData {
    #[serde(default = "default_vix_symbol")]
    pub symbol: String,
    pub value: f64,
    #[serde(default)]
    pub prev_close: f64,
    #[serde(default)]
    pub ohlcv: Option<OHLCV>,
    pub timestamp: DateTime<Utc>,
}

impl VIXData {
    pub fn change(&self) -> f64 {
        self.value - self.prev_close
    }

    pub fn change_pct(&self) -> f64 {
        if self.prev_close > 0.0 {
            (self.change() / self.prev_close) * 100.0
        } else {
            0.0
        }
    }

    pub fn direction(&self) -> &'static str {
        let pct = self.change_pct();
        if pct > 3.0 {
            "rising"
        } else if pct < -3.0 {
            "falling"
        } else {
            "stable"
        }
    }

    pub fn level(&self) -> &'static str {
        if self.value < 12.0 {
            "low"
        } else if self.value < 18.0 {
            "normal"
        } else if self.value < 25.0 {
            "elevated"
        } else {
            "extreme"
        }
    }
}

/// A fully assembled, timestamp-aligned view of the market at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub spot: SpotData,
    pub futures: FuturesData,
    pub options_chain: OptionsChain,
    pub vix: VIXData,
    pub timestamp: DateTime<Utc>,
}

/// Maximum allowed skew between the four component timestamps, in seconds.
const SNAPSHOT_ALIGNMENT_SECONDS: i64 = 10;

impl MarketSnapshot {
    /// True if all four component timestamps are mutually within
    /// [`SNAPSHOT_ALIGNMENT_SECONDS`] of `now`.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        let stamps = [
            self.spot.timestamp,
            self.futures.timestamp,
            self.options_chain.timestamp,
            self.vix.timestamp,
        ];
        stamps
            .iter()
            .all(|ts| (now - *ts).num_seconds().abs() <= SNAPSHOT_ALIGNMENT_SECONDS)
    }

    pub fn futures_basis(&self) -> f64 {
        self.futures.calculate_basis(self.spot.ltp)
    }
}

fn default_underlying_symbol() -> String {
    "BANKNIFTY".to_string()
}

fn default_vix_symbol() -> String {
    "INDIAVIX".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_ohlcv() -> OHLCV {
        OHLCV {
            open: 51000.0,
            high: 51200.0,
            low: 50900.0,
            close: 51150.0,
            volume: 100_000,
        }
    }

    #[test]
    fn ohlcv_derived_fields() {
        let c = sample_ohlcv();
        assert!((c.range() - 300.0).abs() < 1e-9);
        assert!((c.body() - 150.0).abs() < 1e-9);
        assert!(c.is_bullish());
        assert!(!c.is_bearish());
    }

    #[test]
    fn spot_change_and_pct() {
        let spot = SpotData {
            symbol: "BANKNIFTY".into(),
            ltp: 51150.0,
            ohlcv: sample_ohlcv(),
            prev_close: 51000.0,
            timestamp: Utc::now(),
        };
        assert!((spot.change() - 150.0).abs() < 1e-9);
        assert!((spot.change_pct() - (150.0 / 51000.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn spot_change_pct_zero_prev_close() {
        let mut spot = SpotData {
            symbol: "BANKNIFTY".into(),
            ltp: 100.0,
            ohlcv: sample_ohlcv(),
            prev_close: 0.0,
            timestamp: Utc::now(),
        };
        assert_eq!(spot.change_pct(), 0.0);
        spot.prev_close = -5.0;
        assert_eq!(spot.change_pct(), 0.0);
    }

    #[test]
    fn vix_direction_and_level_bands() {
        let mk = |value: f64, prev: f64| VIXData {
            symbol: "INDIAVIX".into(),
            value,
            prev_close: prev,
            ohlcv: None,
            timestamp: Utc::now(),
        };
        assert_eq!(mk(14.0, 10.0).direction(), "rising");
        assert_eq!(mk(10.0, 14.0).direction(), "falling");
        assert_eq!(mk(14.0, 14.0).direction(), "stable");

        assert_eq!(mk(10.0, 10.0).level(), "low");
        assert_eq!(mk(15.0, 15.0).level(), "normal");
        assert_eq!(mk(20.0, 20.0).level(), "elevated");
        assert_eq!(mk(30.0, 30.0).level(), "extreme");
    }

    fn sample_option(strike: f64, oi: u64, ltp: f64, option_type: &str) -> OptionData {
        OptionData {
            symbol: format!("BANKNIFTY{strike}{option_type}"),
            strike,
            option_type: option_type.to_string(),
            ltp,
            bid: ltp - 1.0,
            ask: ltp + 1.0,
            open_interest: oi,
            oi_change: 0,
            volume: 1000,
            greeks: OptionGreeks::default(),
            expiry: Utc::now() + Duration::days(3),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn options_chain_pcr_and_atm() {
        let chain = OptionsChain {
            underlying: "BANKNIFTY".into(),
            spot_price: 51100.0,
            atm_strike: 51100.0,
            expiry: Utc::now() + Duration::days(3),
            calls: vec![
                sample_option(51000.0, 50_000, 200.0, "CE"),
                sample_option(51100.0, 80_000, 150.0, "CE"),
            ],
            puts: vec![
                sample_option(51100.0, 120_000, 140.0, "PE"),
                sample_option(51200.0, 40_000, 90.0, "PE"),
            ],
            timestamp: Utc::now(),
        };

        assert!(chain.atm_call().is_some());
        assert!(chain.atm_put().is_some());
        assert!((chain.atm_straddle_premium() - 290.0).abs() < 1e-9);
        assert_eq!(chain.total_call_oi(), 130_000);
        assert_eq!(chain.total_put_oi(), 160_000);
        assert!((chain.pcr() - (160_000.0 / 130_000.0)).abs() < 1e-9);

        let (call_wall, put_wall) = chain.top_oi_walls();
        assert_eq!(call_wall.unwrap().strike, 51100.0);
        assert_eq!(put_wall.unwrap().strike, 51100.0);
    }

    #[test]
    fn options_chain_pcr_zero_call_oi() {
        let chain = OptionsChain {
            underlying: "BANKNIFTY".into(),
            spot_price: 51100.0,
            atm_strike: 51100.0,
            expiry: Utc::now(),
            calls: vec![],
            puts: vec![sample_option(51100.0, 1000, 100.0, "PE")],
            timestamp: Utc::now(),
        };
        assert_eq!(chain.pcr(), 0.0);
    }

    #[test]
    fn max_pain_prefers_balanced_strike() {
        let chain = OptionsChain {
            underlying: "BANKNIFTY".into(),
            spot_price: 51100.0,
            atm_strike: 51100.0,
            expiry: Utc::now(),
            calls: vec![
                sample_option(51000.0, 10_000, 200.0, "CE"),
                sample_option(51100.0, 10_000, 150.0, "CE"),
                sample_option(51200.0, 200_000, 100.0, "CE"),
            ],
            puts: vec![
                sample_option(51000.0, 200_000, 80.0, "PE"),
                sample_option(51100.0, 10_000, 140.0, "PE"),
                sample_option(51200.0, 10_000, 190.0, "PE"),
            ],
            timestamp: Utc::now(),
        };
        // Heavy OI sits at 51000 puts and 51200 calls -- pain is minimised
        // near the middle strike where neither side is badly offside.
        assert_eq!(chain.max_pain_strike(), 51100.0);
    }

    #[test]
    fn snapshot_validity_window() {
        let now = Utc::now();
        let spot = SpotData {
            symbol: "BANKNIFTY".into(),
            ltp: 51100.0,
            ohlcv: sample_ohlcv(),
            prev_close: 51000.0,
            timestamp: now,
        };
        let futures = FuturesData {
            symbol: "BANKNIFTYFUT".into(),
            ltp: 51150.0,
            ohlcv: sample_ohlcv(),
            open_interest: 100_000,
            oi_change: 0,
            expiry: now + Duration::days(10),
            timestamp: now,
        };
        let chain = OptionsChain {
            underlying: "BANKNIFTY".into(),
            spot_price: 51100.0,
            atm_strike: 51100.0,
            expiry: now + Duration::days(3),
            calls: vec![],
            puts: vec![],
            timestamp: now - Duration::seconds(20),
        };
        let vix = VIXData {
            symbol: "INDIAVIX".into(),
            value: 13.5,
            prev_close: 13.2,
            ohlcv: None,
            timestamp: now,
        };

        let snapshot = MarketSnapshot {
            spot,
            futures,
            options_chain: chain,
            vix,
            timestamp: now,
        };

        // options_chain timestamp is stale by 20s -- outside the 10s window.
        assert!(!snapshot.is_valid(now));
    }
}
