use crate::config::Config;
use crate::errors::AppError;
use crate::health::HealthSnapshot;
use crate::models::*;
use crate::services::ScoreService;
use crate::verida_token;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use utoipa::OpenApi;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Score orchestration over the fallback-aware store.
    pub scores: Arc<ScoreService>,
}

#[derive(OpenApi)]
#[openapi(
    info(title = "FomoScore API", description = "Composite engagement score service"),
    paths(
        health,
        compute_score,
        get_total_score,
        get_breakdown,
        update_fomo_score,
        list_users,
        verida_score,
        verida_token,
        reconnect
    ),
    components(schemas(
        AggregationMode,
        ComputeScoreRequest,
        HealthResponse,
        HealthSnapshot,
        ReconnectResponse,
        ScoreBreakdown,
        ScoreResponse,
        TotalScoreResponse,
        UpdateFomoScoreRequest,
        UpdateFomoScoreResponse,
        VeridaScoreRequest,
        VeridaTokenResponse
    )),
    tags(
        (name = "score", description = "Score computation and lookup"),
        (name = "verida", description = "Verida vault integration"),
        (name = "ops", description = "Health and maintenance")
    )
)]
pub struct ApiDoc;

/// Routes subject to rate limiting. `/health` is mounted separately.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/score/compute", post(compute_score))
        .route("/api/score/total-score/:privy_id", get(get_total_score))
        .route("/api/score/breakdown/:privy_id", get(get_breakdown))
        .route("/api/score/update-fomo-score", post(update_fomo_score))
        .route("/api/score/users", get(list_users))
        .route("/api/verida/score", post(verida_score))
        .route("/api/verida/token", post(verida_token))
        .route("/api/admin/reconnect", post(reconnect))
}

/// Health check endpoint.
///
/// Reports the service status and the state of the durable backend. Always
/// 200: running from memory is degraded, not down.
#[utoipa::path(
    get,
    path = "/health",
    tag = "ops",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = state.scores.store();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: store.active_backend().to_string(),
        durable: store.health().snapshot(),
    })
}

/// POST /api/score/compute
///
/// Scores the supplied Twitter, wallet and Verida payloads (or connection
/// flags) and persists the aggregate.
#[utoipa::path(
    post,
    path = "/api/score/compute",
    tag = "score",
    request_body = ComputeScoreRequest,
    responses(
        (status = 200, description = "Aggregate score", body = ScoreResponse),
        (status = 400, description = "Missing Privy ID")
    )
)]
pub async fn compute_score(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ComputeScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    tracing::info!(
        "POST /api/score/compute - privy_id: {:?}, twitter: {}, wallet: {}, verida: {}",
        request.privy_id,
        request.twitter_data.is_some(),
        request.wallet_data.is_some(),
        request.verida_data.is_some()
    );

    let response = state.scores.compute_and_persist(&request).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/score/total-score/{privy_id}",
    tag = "score",
    params(("privy_id" = String, Path, description = "External user id")),
    responses((status = 200, description = "Total score, 0 when unknown", body = TotalScoreResponse))
)]
pub async fn get_total_score(
    State(state): State<Arc<AppState>>,
    Path(privy_id): Path<String>,
) -> Result<Json<TotalScoreResponse>, AppError> {
    let total_score = state.scores.get_total_score(&privy_id).await?;
    Ok(Json(TotalScoreResponse {
        privy_id,
        total_score,
    }))
}

#[utoipa::path(
    get,
    path = "/api/score/breakdown/{privy_id}",
    tag = "score",
    params(("privy_id" = String, Path, description = "External user id")),
    responses((status = 200, description = "Per-source sub-scores", body = ScoreBreakdown))
)]
pub async fn get_breakdown(
    State(state): State<Arc<AppState>>,
    Path(privy_id): Path<String>,
) -> Result<Json<ScoreBreakdown>, AppError> {
    let breakdown = state.scores.get_breakdown(&privy_id).await?;
    Ok(Json(breakdown))
}

#[utoipa::path(
    post,
    path = "/api/score/update-fomo-score",
    tag = "score",
    request_body = UpdateFomoScoreRequest,
    responses(
        (status = 200, description = "Updated scores", body = UpdateFomoScoreResponse),
        (status = 400, description = "Missing Privy ID or score")
    )
)]
pub async fn update_fomo_score(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateFomoScoreRequest>,
) -> Result<Json<UpdateFomoScoreResponse>, AppError> {
    let response = state
        .scores
        .update_fomo_score(request.privy_id.as_deref(), request.fomo_score)
        .await?;
    Ok(Json(response))
}

/// GET /api/score/users
///
/// Debug listing of every stored record on the active backend.
#[utoipa::path(
    get,
    path = "/api/score/users",
    tag = "score",
    responses((status = 200, description = "All stored user records"))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let users = state.scores.list_users().await?;
    Ok(Json(json!({
        "backend": state.scores.store().active_backend(),
        "count": users.len(),
        "users": users,
    })))
}

/// POST /api/verida/score
///
/// Pulls Telegram activity from the caller's Verida vault and stores it as
/// the user's FOMO score. Vault outages yield a zero contribution, not an error.
#[utoipa::path(
    post,
    path = "/api/verida/score",
    tag = "verida",
    request_body = VeridaScoreRequest,
    responses(
        (status = 200, description = "Aggregate score", body = ScoreResponse),
        (status = 400, description = "Missing Privy ID or unusable token")
    )
)]
pub async fn verida_score(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VeridaScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    tracing::info!("POST /api/verida/score - privy_id: {:?}", request.privy_id);
    let response = state.scores.score_verida(&request).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/verida/token",
    tag = "verida",
    request_body = VeridaScoreRequest,
    responses(
        (status = 200, description = "Parsed token", body = VeridaTokenResponse),
        (status = 400, description = "Unusable token")
    )
)]
pub async fn verida_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VeridaScoreRequest>,
) -> Result<Json<VeridaTokenResponse>, AppError> {
    let info = request
        .token
        .as_deref()
        .and_then(verida_token::parse_token)
        .ok_or_else(|| AppError::BadRequest("Invalid token format from Verida".to_string()))?;

    let did = request
        .did
        .filter(|d| !d.trim().is_empty())
        .or(info.did)
        .or_else(|| state.config.default_did.clone());

    Ok(Json(VeridaTokenResponse {
        did,
        auth_token: info.token,
    }))
}

/// POST /api/admin/reconnect
///
/// Explicit reconnect attempt against the durable backend.
#[utoipa::path(
    post,
    path = "/api/admin/reconnect",
    tag = "ops",
    responses((status = 200, description = "Reconnect outcome", body = ReconnectResponse))
)]
pub async fn reconnect(State(state): State<Arc<AppState>>) -> Json<ReconnectResponse> {
    let store = state.scores.store();
    let reconnected = store.reconnect().await;
    Json(ReconnectResponse {
        reconnected,
        backend: store.active_backend().to_string(),
    })
}
