// =============================================================================
// Broker — synthetic Bank Nifty market-data source
// =============================================================================
//
// Pull interface the core pipeline depends on: connect/disconnect/is_connected
// plus per-instrument getters, each returning an absence sentinel rather than
// throwing when data isn't available. This stub synthesises a plausible
// session from a small internal random walk so the pipeline has something to
// run against without a live feed; a real deployment swaps this module for
// one backed by an exchange feed without the core noticing.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::models::market_data::{
    FuturesData, OHLCV, OptionData, OptionGreeks, OptionsChain, SpotData, VIXData,
};
use crate::models::MarketSnapshot;

const BANKNIFTY_OPENING_LEVEL: f64 = 51_000.0;
const SPOT_TICK_STDDEV: f64 = 25.0;
const FUTURES_BASIS_POINTS: f64 = 35.0;
const STRIKE_STEP: f64 = 100.0;
const VIX_OPENING_LEVEL: f64 = 13.5;
const VIX_TICK_STDDEV: f64 = 0.15;

struct WalkState {
    spot_ltp: f64,
    spot_open: f64,
    spot_high: f64,
    spot_low: f64,
    prev_close: f64,
    futures_oi: u64,
    vix_value: f64,
    vix_prev_close: f64,
}

impl WalkState {
    fn fresh() -> Self {
        Self {
            spot_ltp: BANKNIFTY_OPENING_LEVEL,
            spot_open: BANKNIFTY_OPENING_LEVEL,
            spot_high: BANKNIFTY_OPENING_LEVEL,
            spot_low: BANKNIFTY_OPENING_LEVEL,
            prev_close: BANKNIFTY_OPENING_LEVEL,
            futures_oi: 9_500_000,
            vix_value: VIX_OPENING_LEVEL,
            vix_prev_close: VIX_OPENING_LEVEL,
        }
    }

    fn step(&mut self) {
        let mut rng = rand::thread_rng();
        let spot_delta: f64 = rng.gen_range(-SPOT_TICK_STDDEV..=SPOT_TICK_STDDEV);
        self.spot_ltp = (self.spot_ltp + spot_delta).max(1.0);
        self.spot_high = self.spot_high.max(self.spot_ltp);
        self.spot_low = self.spot_low.min(self.spot_ltp);

        let oi_delta: i64 = rng.gen_range(-50_000..=50_000);
        self.futures_oi = (self.futures_oi as i64 + oi_delta).max(0) as u64;

        let vix_delta: f64 = rng.gen_range(-VIX_TICK_STDDEV..=VIX_TICK_STDDEV);
        self.vix_value = (self.vix_value + vix_delta).max(5.0);
    }

    /// Begins a new session: rolls today's close into `prev_close`, resets
    /// the intraday high/low anchors, leaves `spot_ltp` where the walk left
    /// it (the open price of the new session).
    fn roll_day(&mut self) {
        self.prev_close = self.spot_ltp;
        self.spot_open = self.spot_ltp;
        self.spot_high = self.spot_ltp;
        self.spot_low = self.spot_ltp;
        self.vix_prev_close = self.vix_value;
    }
}

/// Synthetic Bank Nifty broker connection.
pub struct Broker {
    connected: AtomicBool,
    state: RwLock<WalkState>,
    expiry_days: i64,
}

impl Broker {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            state: RwLock::new(WalkState::fresh()),
            expiry_days: 3,
        }
    }

    pub fn connect(&self) -> bool {
        self.connected.store(true, Ordering::SeqCst);
        info!("broker connected (synthetic feed)");
        true
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        info!("broker disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Starts a fresh session: resets the day's high/low anchors and rolls
    /// today's level into `prev_close` for the next session's change%.
    pub fn roll_day(&self) {
        self.state.write().roll_day();
        debug!("broker rolled to a new session");
    }

    pub fn get_spot(&self) -> Option<SpotData> {
        if !self.is_connected() {
            warn!("get_spot called while disconnected");
            return None;
        }
        let mut state = self.state.write();
        state.step();
        let now = Utc::now();
        Some(SpotData {
            symbol: "BANKNIFTY".to_string(),
            ltp: state.spot_ltp,
            ohlcv: OHLCV {
                open: state.spot_open,
                high: state.spot_high,
                low: state.spot_low,
                close: state.spot_ltp,
                volume: 0,
            },
            prev_close: state.prev_close,
            timestamp: now,
        })
    }

    pub fn get_futures(&self) -> Option<FuturesData> {
        if !self.is_connected() {
            warn!("get_futures called while disconnected");
            return None;
        }
        let state = self.state.read();
        let now = Utc::now();
        let ltp = state.spot_ltp + FUTURES_BASIS_POINTS;
        Some(FuturesData {
            symbol: "BANKNIFTYFUT".to_string(),
            ltp,
            ohlcv: OHLCV {
                open: state.spot_open + FUTURES_BASIS_POINTS,
                high: state.spot_high + FUTURES_BASIS_POINTS,
                low: state.spot_low + FUTURES_BASIS_POINTS,
                close: ltp,
                volume: 0,
            },
            open_interest: state.futures_oi,
            oi_change: 0,
            expiry: now + Duration::days(self.expiry_days),
            timestamp: now,
        })
    }

    pub fn get_options_chain(&self, strikes_around_atm: usize) -> Option<OptionsChain> {
        if !self.is_connected() {
            warn!("get_options_chain called while disconnected");
            return None;
        }
        let state = self.state.read();
        let now = Utc::now();
        let spot = state.spot_ltp;
        let atm_strike = (spot / STRIKE_STEP).round() * STRIKE_STEP;
        let expiry = now + Duration::days(self.expiry_days);

        let mut rng = rand::thread_rng();
        let mut calls = Vec::with_capacity(2 * strikes_around_atm + 1);
        let mut puts = Vec::with_capacity(2 * strikes_around_atm + 1);

        for i in -(strikes_around_atm as i64)..=(strikes_around_atm as i64) {
            let strike = atm_strike + (i as f64) * STRIKE_STEP;
            let distance = (strike - spot).abs();

            let call_ltp = (spot - strike + 150.0 - distance * 0.1).max(0.5);
            let put_ltp = (strike - spot + 150.0 - distance * 0.1).max(0.5);
            let oi_scale = 1.0 / (1.0 + distance / 300.0);
            let call_oi = (rng.gen_range(20_000..80_000) as f64 * oi_scale) as u64;
            let put_oi = (rng.gen_range(20_000..80_000) as f64 * oi_scale) as u64;

            calls.push(OptionData {
                symbol: format!("BANKNIFTY{:.0}CE", strike),
                strike,
                option_type: "CE".to_string(),
                ltp: call_ltp,
                bid: (call_ltp - 0.5).max(0.0),
                ask: call_ltp + 0.5,
                open_interest: call_oi,
                oi_change: rng.gen_range(-2_000..2_000),
                volume: rng.gen_range(1_000..20_000),
                greeks: OptionGreeks::default(),
                expiry,
                timestamp: now,
            });
            puts.push(OptionData {
                symbol: format!("BANKNIFTY{:.0}PE", strike),
                strike,
                option_type: "PE".to_string(),
                ltp: put_ltp,
                bid: (put_ltp - 0.5).max(0.0),
                ask: put_ltp + 0.5,
                open_interest: put_oi,
                oi_change: rng.gen_range(-2_000..2_000),
                volume: rng.gen_range(1_000..20_000),
                greeks: OptionGreeks::default(),
                expiry,
                timestamp: now,
            });
        }

        Some(OptionsChain {
            underlying: "BANKNIFTY".to_string(),
            spot_price: spot,
            atm_strike,
            expiry,
            calls,
            puts,
            timestamp: now,
        })
    }

    pub fn get_vix(&self) -> Option<VIXData> {
        if !self.is_connected() {
            warn!("get_vix called while disconnected");
            return None;
        }
        let state = self.state.read();
        Some(VIXData {
            symbol: "INDIAVIX".to_string(),
            value: state.vix_value,
            prev_close: state.vix_prev_close,
            ohlcv: None,
            timestamp: Utc::now(),
        })
    }

    /// Assembles spot, futures, options chain, and VIX into one
    /// timestamp-aligned snapshot. `None` if disconnected or any component
    /// is unavailable.
    pub fn get_market_snapshot(&self, strikes_around_atm: usize) -> Option<MarketSnapshot> {
        let spot = self.get_spot()?;
        let futures = self.get_futures()?;
        let options_chain = self.get_options_chain(strikes_around_atm)?;
        let vix = self.get_vix()?;
        let timestamp = Utc::now();
        Some(MarketSnapshot {
            spot,
            futures,
            options_chain,
            vix,
            timestamp,
        })
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}
