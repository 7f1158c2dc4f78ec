// =============================================================================
// Bank Nifty Decision-Support Engine — Main Entry Point
// =============================================================================
//
// Wires the broker, ring buffer, regime/confluence/options engines, signal
// fuser, trade builder, and risk governor into `AppState`, then drives them
// with a small set of periodic activities: a ~1 Hz fetch loop, a ~0.2 Hz
// signal-generation loop, a ~0.033 Hz risk-state heartbeat, and two
// weekday-only daily triggers (day-start, end-of-day). The process never
// executes trades — it produces recommendations a human acts on.
// =============================================================================

mod api;
mod app_state;
mod broker;
mod buffer;
mod confluence;
mod indicators;
mod models;
mod options_intel;
mod persistence;
mod regime;
mod risk_governor;
mod runtime_config;
mod signal_fuser;
mod trade_builder;
mod validator;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Datelike, Duration as ChronoDuration, NaiveTime, Utc, Weekday};
use chrono_tz::Asia::Kolkata;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::runtime_config::RuntimeConfig;

const CONFIG_PATH: &str = "runtime_config.json";

const FETCH_INTERVAL: StdDuration = StdDuration::from_secs(1);
const SIGNAL_INTERVAL: StdDuration = StdDuration::from_secs(5);
const RISK_HEARTBEAT_INTERVAL: StdDuration = StdDuration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Bank Nifty decision-support engine starting up");

    let config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load runtime config, using defaults");
        RuntimeConfig::default()
    });

    info!(
        capital = config.trading_capital,
        max_trades_per_day = config.max_trades_per_day,
        lot_size = config.lot_size,
        "runtime configuration loaded"
    );

    let state = Arc::new(AppState::new(config));
    state.broker.connect();

    // ── Fetch activity (~1 Hz) ───────────────────────────────────────────
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(FETCH_INTERVAL);
            loop {
                interval.tick().await;
                state.fetch_tick();
            }
        });
    }

    // ── Signal-generation activity (~0.2 Hz) ─────────────────────────────
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SIGNAL_INTERVAL);
            loop {
                interval.tick().await;
                match state.run_pipeline() {
                    Some(outcome) => {
                        info!(
                            signal_id = %outcome.signal.id,
                            valid = outcome.signal.is_valid,
                            direction = %outcome.signal.direction,
                            plan_accepted = outcome.plan_accepted,
                            "signal pipeline pass complete"
                        );
                    }
                    None => {
                        if let Some(reason) = state.buffer.get_no_trade_reason() {
                            tracing::debug!(reason = %reason, "signal pipeline skipped");
                        }
                    }
                }
            }
        });
    }

    // ── Risk-state heartbeat (~0.033 Hz) ─────────────────────────────────
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RISK_HEARTBEAT_INTERVAL);
            loop {
                interval.tick().await;
                if let Some(risk_state) = state.risk_governor.current_state() {
                    state.risk_states.upsert(risk_state.clone());
                    info!(
                        date = %risk_state.date,
                        status = %risk_state.status,
                        trades_taken = risk_state.trades_taken,
                        total_pnl = risk_state.total_pnl,
                        "risk state heartbeat"
                    );
                }
            }
        });
    }

    // ── Day-start cron (09:10 local, weekdays) ───────────────────────────
    {
        let state = state.clone();
        let target = NaiveTime::from_hms_opt(9, 10, 0).unwrap();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(duration_until_next_weekday_trigger(target)).await;
                let date = Utc::now().with_timezone(&Kolkata).date_naive();
                state.start_trading_day(date);
            }
        });
    }

    // ── End-of-day cron (15:35 local, weekdays) ──────────────────────────
    {
        let state = state.clone();
        let target = NaiveTime::from_hms_opt(15, 35, 0).unwrap();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(duration_until_next_weekday_trigger(target)).await;
                state.finalize_trading_day();
            }
        });
    }

    // Seed the risk governor immediately so the engine can be used right
    // after startup instead of waiting for the first 09:10 trigger.
    let today = Utc::now().with_timezone(&Kolkata).date_naive();
    if state.risk_governor.current_state().is_none() && is_weekday(today) {
        state.start_trading_day(today);
    }

    // ── API server ────────────────────────────────────────────────────────
    let bind_addr = std::env::var("BANKNIFTY_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let api_state = state.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "API server listening");
    let server = tokio::spawn(async move {
        let app = api::rest::router(api_state);
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "API server terminated");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received, stopping gracefully");

    state.finalize_trading_day();
    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        warn!(error = %e, "failed to save runtime config on shutdown");
    }

    server.abort();
    info!("engine shut down complete");
    Ok(())
}

fn is_weekday(date: chrono::NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Computes how long to sleep until the next occurrence of `target` local
/// time on a weekday (Mon–Fri). Used for the two daily cron-like activities
/// in place of a cron crate — the interval is recomputed after every fire so
/// drift never accumulates.
fn duration_until_next_weekday_trigger(target: NaiveTime) -> StdDuration {
    let now = Utc::now().with_timezone(&Kolkata);
    let mut candidate = now.date_naive().and_time(target);
    if candidate <= now.naive_local() {
        candidate += ChronoDuration::days(1);
    }
    while !is_weekday(candidate.date()) {
        candidate += ChronoDuration::days(1);
    }
    (candidate - now.naive_local())
        .to_std()
        .unwrap_or(StdDuration::from_secs(60))
}
