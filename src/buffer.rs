// =============================================================================
// Market Data Buffer — rolling window gating the NO-TRADE / READY transition
// =============================================================================
//
// Wraps two fixed-capacity ring buffers (full snapshots, and spot ticks
// alone for cheap price-series reads) behind a read-write lock. Nothing may
// trade until the buffer has filled past `min_fill_pct`; after that it is
// READY until updates stop arriving for too long, at which point it goes
// STALE and trading pauses again without anyone touching risk state.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::models::{MarketSnapshot, OHLCV};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferStatus {
    Empty,
    Filling,
    Ready,
    Stale,
}

impl std::fmt::Display for BufferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BufferStatus::Empty => "empty",
            BufferStatus::Filling => "filling",
            BufferStatus::Ready => "ready",
            BufferStatus::Stale => "stale",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferMetrics {
    pub current_size: usize,
    pub max_size: usize,
    pub fill_percentage: f64,
    pub status: BufferStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_timestamp: Option<DateTime<Utc>>,
    pub updates_per_second: f64,
}

struct Inner {
    snapshots: VecDeque<MarketSnapshot>,
    update_count: u64,
    first_update_at: Option<Instant>,
    last_update_at: Option<Instant>,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Rolling window of recent market snapshots with fill/staleness tracking.
pub struct MarketDataBuffer {
    max_size: usize,
    min_fill_count: usize,
    max_staleness: Duration,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for MarketDataBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataBuffer")
            .field("max_size", &self.max_size)
            .field("min_fill_count", &self.min_fill_count)
            .finish()
    }
}

impl MarketDataBuffer {
    pub fn new(max_size: usize, min_fill_pct: f64, max_staleness_seconds: u64) -> Self {
        let min_fill_count = ((max_size as f64) * (min_fill_pct / 100.0)) as usize;
        Self {
            max_size,
            min_fill_count,
            max_staleness: Duration::from_secs(max_staleness_seconds),
            inner: RwLock::new(Inner {
                snapshots: VecDeque::with_capacity(max_size),
                update_count: 0,
                first_update_at: None,
                last_update_at: None,
                last_timestamp: None,
            }),
        }
    }

    pub fn add_snapshot(&self, snapshot: MarketSnapshot) {
        let mut inner = self.inner.write();
        let now = Instant::now();
        if inner.first_update_at.is_none() {
            inner.first_update_at = Some(now);
        }
        inner.last_update_at = Some(now);
        inner.last_timestamp = Some(snapshot.timestamp);
        inner.update_count += 1;

        inner.snapshots.push_back(snapshot);
        while inner.snapshots.len() > self.max_size {
            inner.snapshots.pop_front();
        }
    }

    pub fn size(&self) -> usize {
        self.inner.read().snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.size() >= self.max_size
    }

    pub fn fill_percentage(&self) -> f64 {
        (self.size() as f64 / self.max_size as f64) * 100.0
    }

    /// The literal NO-TRADE gate: not enough history to classify a regime
    /// or score confluence reliably yet.
    pub fn is_ready(&self) -> bool {
        self.size() >= self.min_fill_count
    }

    pub fn status(&self) -> BufferStatus {
        let inner = self.inner.read();
        if inner.snapshots.is_empty() {
            return BufferStatus::Empty;
        }
        if inner.snapshots.len() < self.min_fill_count {
            return BufferStatus::Filling;
        }
        match inner.last_update_at {
            Some(last) if last.elapsed() > self.max_staleness * 2 => BufferStatus::Stale,
            _ => BufferStatus::Ready,
        }
    }

    pub fn trade_allowed(&self) -> bool {
        self.status() == BufferStatus::Ready
    }

    pub fn get_no_trade_reason(&self) -> Option<String> {
        match self.status() {
            BufferStatus::Empty => Some("Buffer is empty - waiting for initial data".to_string()),
            BufferStatus::Filling => {
                let size = self.size();
                let needed = self.min_fill_count.saturating_sub(size);
                Some(format!(
                    "Buffer filling - need {} more data points ({:.0}% full)",
                    needed,
                    self.fill_percentage()
                ))
            }
            BufferStatus::Stale => Some("Buffer data is stale - no recent updates".to_string()),
            BufferStatus::Ready => None,
        }
    }

    pub fn get_spot_prices(&self, n: usize) -> Vec<f64> {
        let inner = self.inner.read();
        inner
            .snapshots
            .iter()
            .rev()
            .take(n)
            .map(|s| s.spot.ltp)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }

    pub fn get_spot_ohlcv(&self, n: usize) -> Vec<OHLCV> {
        let inner = self.inner.read();
        inner
            .snapshots
            .iter()
            .rev()
            .take(n)
            .map(|s| s.spot.ohlcv)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }

    pub fn latest(&self) -> Option<MarketSnapshot> {
        self.inner.read().snapshots.back().cloned()
    }

    pub fn get_metrics(&self) -> BufferMetrics {
        let inner = self.inner.read();
        let updates_per_second = match (inner.first_update_at, inner.last_update_at) {
            (Some(first), Some(last)) if last > first => {
                inner.update_count as f64 / (last - first).as_secs_f64()
            }
            _ => 0.0,
        };

        BufferMetrics {
            current_size: inner.snapshots.len(),
            max_size: self.max_size,
            fill_percentage: self.fill_percentage(),
            status: self.status(),
            oldest_timestamp: inner.snapshots.front().map(|s| s.timestamp),
            newest_timestamp: inner.snapshots.back().map(|s| s.timestamp),
            updates_per_second,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FuturesData, OptionsChain, SpotData, VIXData};
    use chrono::Duration as ChronoDuration;

    fn sample_snapshot(ltp: f64) -> MarketSnapshot {
        let now = Utc::now();
        MarketSnapshot {
            spot: SpotData {
                symbol: "BANKNIFTY".into(),
                ltp,
                ohlcv: OHLCV {
                    open: ltp - 50.0,
                    high: ltp + 50.0,
                    low: ltp - 100.0,
                    close: ltp,
                    volume: 10_000,
                },
                prev_close: ltp - 20.0,
                timestamp: now,
            },
            futures: FuturesData {
                symbol: "BANKNIFTYFUT".into(),
                ltp: ltp + 40.0,
                ohlcv: OHLCV {
                    open: ltp,
                    high: ltp + 60.0,
                    low: ltp - 40.0,
                    close: ltp + 40.0,
                    volume: 5_000,
                },
                open_interest: 100_000,
                oi_change: 0,
                expiry: now + ChronoDuration::days(10),
                timestamp: now,
            },
            options_chain: OptionsChain {
                underlying: "BANKNIFTY".into(),
                spot_price: ltp,
                atm_strike: (ltp / 100.0).round() * 100.0,
                expiry: now + ChronoDuration::days(3),
                calls: vec![],
                puts: vec![],
                timestamp: now,
            },
            vix: VIXData {
                symbol: "INDIAVIX".into(),
                value: 13.5,
                prev_close: 13.2,
                ohlcv: None,
                timestamp: now,
            },
            timestamp: now,
        }
    }

    #[test]
    fn empty_buffer_reports_empty_status() {
        let buf = MarketDataBuffer::new(10, 80.0, 5);
        assert_eq!(buf.status(), BufferStatus::Empty);
        assert!(!buf.is_ready());
        assert_eq!(
            buf.get_no_trade_reason(),
            Some("Buffer is empty - waiting for initial data".to_string())
        );
    }

    #[test]
    fn fills_to_ready_at_min_fill_count() {
        let buf = MarketDataBuffer::new(10, 80.0, 5);
        for i in 0..7 {
            buf.add_snapshot(sample_snapshot(51000.0 + i as f64));
            assert_eq!(buf.status(), BufferStatus::Filling);
        }
        buf.add_snapshot(sample_snapshot(51100.0));
        assert!(buf.is_ready());
        assert_eq!(buf.status(), BufferStatus::Ready);
        assert!(buf.get_no_trade_reason().is_none());
    }

    #[test]
    fn truncates_at_max_size() {
        let buf = MarketDataBuffer::new(5, 80.0, 5);
        for i in 0..10 {
            buf.add_snapshot(sample_snapshot(51000.0 + i as f64));
        }
        assert_eq!(buf.size(), 5);
        assert!(buf.is_full());
    }

    #[test]
    fn spot_prices_are_oldest_first() {
        let buf = MarketDataBuffer::new(5, 0.0, 5);
        for i in 0..3 {
            buf.add_snapshot(sample_snapshot(51000.0 + i as f64));
        }
        let prices = buf.get_spot_prices(10);
        assert_eq!(prices, vec![51000.0, 51001.0, 51002.0]);
    }

    #[test]
    fn stale_after_no_updates_past_twice_max_staleness() {
        let buf = MarketDataBuffer::new(5, 0.0, 0);
        buf.add_snapshot(sample_snapshot(51000.0));
        // max_staleness is 0s, so elapsed time immediately exceeds 2x it.
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(buf.status(), BufferStatus::Stale);
        assert!(!buf.trade_allowed());
    }
}
