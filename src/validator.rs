// =============================================================================
// Data Validator — gates every market snapshot before it reaches the buffer
// =============================================================================
//
// A snapshot must pass three independent checks before it is trusted:
// timestamp freshness, field completeness, and trading-hours membership.
// Latency is measured and reported but never fails validation on its own --
// it is purely diagnostic, matching the reference implementation.

use chrono::{DateTime, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Asia::Kolkata;
use serde::{Deserialize, Serialize};

use crate::models::MarketSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Valid,
    Stale,
    Incomplete,
    OutsideHours,
    Invalid,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::Stale => "stale",
            ValidationStatus::Incomplete => "incomplete",
            ValidationStatus::OutsideHours => "outside_hours",
            ValidationStatus::Invalid => "invalid",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub status: ValidationStatus,
    pub timestamp_valid: bool,
    pub data_complete: bool,
    pub within_trading_hours: bool,
    pub latency_ok: bool,
    pub latency_ms: f64,
    pub staleness_seconds: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Gates incoming market snapshots on freshness, completeness, and session
/// membership. Bounds are supplied by the caller (normally `config::Config`)
/// rather than hardcoded, so they can be tuned without touching this file.
#[derive(Debug, Clone)]
pub struct DataValidator {
    pub max_staleness_seconds: i64,
    pub max_latency_ms: i64,
    pub market_open: NaiveTime,
    pub market_close: NaiveTime,
    pub opening_range_end: NaiveTime,
}

impl DataValidator {
    pub fn new(
        max_staleness_seconds: i64,
        max_latency_ms: i64,
        market_open: NaiveTime,
        market_close: NaiveTime,
        opening_range_end: NaiveTime,
    ) -> Self {
        Self {
            max_staleness_seconds,
            max_latency_ms,
            market_open,
            market_close,
            opening_range_end,
        }
    }

    pub fn validate_snapshot(&self, snapshot: &MarketSnapshot, check_trading_hours: bool) -> ValidationResult {
        let now = Utc::now();
        self.validate_snapshot_at(snapshot, check_trading_hours, now)
    }

    fn validate_snapshot_at(
        &self,
        snapshot: &MarketSnapshot,
        check_trading_hours: bool,
        now: DateTime<Utc>,
    ) -> ValidationResult {
        let staleness_seconds = (now - snapshot.timestamp).num_milliseconds() as f64 / 1000.0;
        let latency_ms = staleness_seconds * 1000.0;

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let timestamp_valid = staleness_seconds <= self.max_staleness_seconds as f64;
        if !timestamp_valid {
            errors.push(format!(
                "Snapshot is stale: {:.1}s old (max {}s)",
                staleness_seconds, self.max_staleness_seconds
            ));
        }

        let latency_ok = latency_ms <= self.max_latency_ms as f64;
        if !latency_ok {
            warnings.push(format!(
                "High latency: {:.0}ms (max {}ms)",
                latency_ms, self.max_latency_ms
            ));
        }

        let data_complete = self.check_completeness(snapshot, &mut errors);

        let within_trading_hours = if check_trading_hours {
            self.is_within_trading_hours(now)
        } else {
            true
        };
        if check_trading_hours && !within_trading_hours {
            errors.push("Snapshot timestamp falls outside trading hours".to_string());
        }

        let is_valid = timestamp_valid && data_complete && (within_trading_hours || !check_trading_hours);

        let status = if check_trading_hours && !within_trading_hours {
            ValidationStatus::OutsideHours
        } else if !timestamp_valid {
            ValidationStatus::Stale
        } else if !data_complete {
            ValidationStatus::Incomplete
        } else if !is_valid {
            ValidationStatus::Invalid
        } else {
            ValidationStatus::Valid
        };

        ValidationResult {
            is_valid,
            status,
            timestamp_valid,
            data_complete,
            within_trading_hours,
            latency_ok,
            latency_ms,
            staleness_seconds,
            errors,
            warnings,
        }
    }

    fn check_completeness(&self, snapshot: &MarketSnapshot, errors: &mut Vec<String>) -> bool {
        let mut complete = true;

        if snapshot.spot.ltp <= 0.0 {
            errors.push("Spot LTP is missing or non-positive".to_string());
            complete = false;
        }
        if snapshot.futures.ltp <= 0.0 {
            errors.push("Futures LTP is missing or non-positive".to_string());
            complete = false;
        }
        if snapshot.options_chain.calls.is_empty() {
            errors.push("Options chain has no call strikes".to_string());
            complete = false;
        }
        if snapshot.options_chain.puts.is_empty() {
            errors.push("Options chain has no put strikes".to_string());
            complete = false;
        }
        if snapshot.vix.value <= 0.0 {
            errors.push("VIX value is missing or non-positive".to_string());
            complete = false;
        }
        if snapshot.spot.prev_close <= 0.0 {
            errors.push("Spot previous close is missing or non-positive".to_string());
            complete = false;
        }
        if snapshot.vix.prev_close <= 0.0 {
            errors.push("VIX previous close is missing or non-positive".to_string());
            complete = false;
        }

        complete
    }

    /// Weekends are never in-session; weekdays are gated by market open/close
    /// in IST, matching how the session clock is actually kept.
    pub fn is_within_trading_hours(&self, at: DateTime<Utc>) -> bool {
        let ist = at.with_timezone(&Kolkata);
        if matches!(ist.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let current_time = NaiveTime::from_hms_opt(ist.hour(), ist.minute(), ist.second()).unwrap();
        current_time >= self.market_open && current_time <= self.market_close
    }

    pub fn is_opening_range_period(&self, at: DateTime<Utc>) -> bool {
        let ist = at.with_timezone(&Kolkata);
        if matches!(ist.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let current_time = NaiveTime::from_hms_opt(ist.hour(), ist.minute(), ist.second()).unwrap();
        current_time >= self.market_open && current_time <= self.opening_range_end
    }

    /// Standalone pre-ingestion spot check: cheaper than a full snapshot
    /// validation, used by the broker collaborator to discard obviously
    /// broken ticks before they even reach the buffer.
    pub fn validate_spot_data(&self, ltp: f64, prev_close: f64) -> bool {
        ltp > 0.0 && prev_close > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FuturesData, OHLCV, OptionData, OptionGreeks, OptionsChain, SpotData, VIXData};
    use chrono::Duration;

    fn validator() -> DataValidator {
        DataValidator::new(
            5,
            500,
            NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        )
    }

    fn sample_option(strike: f64, option_type: &str) -> OptionData {
        OptionData {
            symbol: format!("BANKNIFTY{strike}{option_type}"),
            strike,
            option_type: option_type.into(),
            ltp: 100.0,
            bid: 99.0,
            ask: 101.0,
            open_interest: 1000,
            oi_change: 0,
            volume: 500,
            greeks: OptionGreeks::default(),
            expiry: Utc::now() + Duration::days(3),
            timestamp: Utc::now(),
        }
    }

    fn sample_snapshot(timestamp: DateTime<Utc>) -> MarketSnapshot {
        MarketSnapshot {
            spot: SpotData {
                symbol: "BANKNIFTY".into(),
                ltp: 51100.0,
                ohlcv: OHLCV {
                    open: 51000.0,
                    high: 51200.0,
                    low: 50900.0,
                    close: 51100.0,
                    volume: 100_000,
                },
                prev_close: 51000.0,
                timestamp,
            },
            futures: FuturesData {
                symbol: "BANKNIFTYFUT".into(),
                ltp: 51150.0,
                ohlcv: OHLCV {
                    open: 51050.0,
                    high: 51250.0,
                    low: 50950.0,
                    close: 51150.0,
                    volume: 50_000,
                },
                open_interest: 100_000,
                oi_change: 0,
                expiry: timestamp + Duration::days(10),
                timestamp,
            },
            options_chain: OptionsChain {
                underlying: "BANKNIFTY".into(),
                spot_price: 51100.0,
                atm_strike: 51100.0,
                expiry: timestamp + Duration::days(3),
                calls: vec![sample_option(51100.0, "CE")],
                puts: vec![sample_option(51100.0, "PE")],
                timestamp,
            },
            vix: VIXData {
                symbol: "INDIAVIX".into(),
                value: 13.5,
                prev_close: 13.2,
                ohlcv: None,
                timestamp,
            },
            timestamp,
        }
    }

    #[test]
    fn fresh_complete_snapshot_is_valid() {
        let v = validator();
        let now = Utc::now();
        let snapshot = sample_snapshot(now);
        let result = v.validate_snapshot_at(&snapshot, false, now);
        assert!(result.is_valid);
        assert_eq!(result.status, ValidationStatus::Valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn stale_snapshot_is_rejected() {
        let v = validator();
        let now = Utc::now();
        let snapshot = sample_snapshot(now - Duration::seconds(20));
        let result = v.validate_snapshot_at(&snapshot, false, now);
        assert!(!result.is_valid);
        assert_eq!(result.status, ValidationStatus::Stale);
    }

    #[test]
    fn high_latency_is_warning_only() {
        let v = validator();
        let now = Utc::now();
        let snapshot = sample_snapshot(now - Duration::milliseconds(800));
        let result = v.validate_snapshot_at(&snapshot, false, now);
        assert!(!result.latency_ok);
        assert!(!result.warnings.is_empty());
        // 800ms staleness is still under the 5s freshness ceiling.
        assert!(result.is_valid);
    }

    #[test]
    fn incomplete_snapshot_flags_each_missing_field() {
        let v = validator();
        let now = Utc::now();
        let mut snapshot = sample_snapshot(now);
        snapshot.spot.ltp = 0.0;
        snapshot.options_chain.puts.clear();
        let result = v.validate_snapshot_at(&snapshot, false, now);
        assert!(!result.is_valid);
        assert_eq!(result.status, ValidationStatus::Incomplete);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn outside_hours_takes_priority_over_incomplete() {
        let v = validator();
        // A Saturday, which also happens to have a broken snapshot.
        let saturday = DateTime::parse_from_rfc3339("2026-08-01T06:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut snapshot = sample_snapshot(saturday);
        snapshot.spot.ltp = 0.0;
        let result = v.validate_snapshot_at(&snapshot, true, saturday);
        assert_eq!(result.status, ValidationStatus::OutsideHours);
    }

    #[test]
    fn opening_range_period_detection() {
        let v = validator();
        let weekday = DateTime::parse_from_rfc3339("2026-07-28T03:45:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(v.is_opening_range_period(weekday));
        let later = DateTime::parse_from_rfc3339("2026-07-28T05:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(!v.is_opening_range_period(later));
        assert!(v.is_within_trading_hours(later));
    }

    #[test]
    fn validate_spot_data_requires_positive_values() {
        let v = validator();
        assert!(v.validate_spot_data(100.0, 95.0));
        assert!(!v.validate_spot_data(0.0, 95.0));
        assert!(!v.validate_spot_data(100.0, 0.0));
    }
}
