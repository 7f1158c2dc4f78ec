// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. `/health` requires no authentication.
// Every other endpoint requires a valid Bearer token checked via the
// `AuthBearer` extractor. The API never places an order — it only reads the
// pipeline's state and lets an operator pause/resume/record trade exits.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::models::trade::ExecutedTrade;

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        // ── Authenticated reads ─────────────────────────────────────
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/risk", get(risk_state))
        .route("/api/v1/signals", get(recent_signals))
        .route("/api/v1/plans", get(recent_plans))
        .route("/api/v1/plans/:id", get(plan_by_id))
        .route("/api/v1/trades", get(recent_trades))
        // ── Authenticated writes (no order placement; record-only) ──
        .route("/api/v1/trades/:id/exit", post(record_trade_exit))
        .route("/api/v1/control/config", get(get_config))
        .route("/api/v1/control/config", post(set_config))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Full state snapshot
// =============================================================================

async fn full_state(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

// =============================================================================
// Risk state
// =============================================================================

async fn risk_state(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.risk_governor.current_state() {
        Some(risk) => Json(risk).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "risk day not initialised" })),
        )
            .into_response(),
    }
}

// =============================================================================
// Signals / plans / trades (recent, bounded by `?limit=`)
// =============================================================================

#[derive(Deserialize)]
struct LimitQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

async fn recent_signals(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Query(q): Query<LimitQuery>,
) -> impl IntoResponse {
    Json(state.signals.recent(q.limit))
}

async fn recent_plans(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Query(q): Query<LimitQuery>,
) -> impl IntoResponse {
    Json(state.trade_plans.recent(q.limit))
}

async fn plan_by_id(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.trade_plans.get(id) {
        Some(plan) => Json(plan).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "plan not found" })),
        )
            .into_response(),
    }
}

async fn recent_trades(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Query(q): Query<LimitQuery>,
) -> impl IntoResponse {
    Json(state.executed_trades.recent(q.limit))
}

// =============================================================================
// Record a trade exit (the human operator reports fills; we never place
// orders ourselves)
// =============================================================================

async fn record_trade_exit(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(trade): Json<ExecutedTrade>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if trade.id != id {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "path id does not match body id" })),
        ));
    }
    info!(id = %trade.id, pnl = ?trade.pnl_amount, "recording trade exit");
    state.record_trade_exit(trade);
    Ok(StatusCode::ACCEPTED)
}

// =============================================================================
// Runtime config (read + narrow operator controls)
// =============================================================================

async fn get_config(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.runtime_config.read().clone())
}

#[derive(Deserialize)]
struct ConfigUpdate {
    #[serde(default)]
    min_confluence_score: Option<f64>,
    #[serde(default)]
    min_risk_reward: Option<f64>,
}

async fn set_config(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(update): Json<ConfigUpdate>,
) -> impl IntoResponse {
    let mut config = state.runtime_config.write();
    let mut changed = false;

    if let Some(v) = update.min_confluence_score {
        config.min_confluence_score = v;
        changed = true;
    }
    if let Some(v) = update.min_risk_reward {
        config.min_risk_reward = v;
        changed = true;
    }

    if changed {
        config.recompute_derived();
        let snapshot = config.clone();
        drop(config);
        if let Err(e) = snapshot.save("runtime_config.json") {
            warn!(error = %e, "failed to save runtime config");
        }
        state.increment_version();
        Json(snapshot).into_response()
    } else {
        Json(config.clone()).into_response()
    }
}
