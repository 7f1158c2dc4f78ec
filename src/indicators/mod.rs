// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the five confluence indicators
// plus the EMA/RSI primitives they build on. Every `*_signal` function
// returns an `IndicatorSignal` so the confluence scorer can aggregate them
// uniformly regardless of which indicator produced it.

pub mod ema;
pub mod price_action;
pub mod rsi;
pub mod volume;
pub mod vwap;
