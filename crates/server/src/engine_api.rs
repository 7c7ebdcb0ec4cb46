//! JSON API for the tariff engine.
//!
//! Endpoints:
//! - `POST /api/tarifa-engine/calculate`   — run one calculation
//! - `POST /api/tarifa-engine/simulate`    — run a batch of scenarios
//! - `GET  /api/tarifa-engine/audit`       — query the audit log
//! - `GET  /api/tarifa-engine/cache/stats` — cache counters
//! - `POST /api/tarifa-engine/clear-cache` — flush the cache (admin)

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use tarifario_core::domain::audit::{AuditGroupBy, AuditQuery};
use tarifario_core::domain::calculation::CalculationResult;
use tarifario_core::domain::context::CalculationRequest;
use tarifario_core::domain::tariff::ClientId;
use tarifario_core::engine::cache::{CacheStats, ClearOutcome};
use tarifario_core::engine::simulation::{SimulationReport, SimulationRequest};
use tarifario_core::engine::{AuditReport, TariffEngine};
use tarifario_core::errors::EngineError;

use crate::auth::{AuthRejection, AuthTokens};

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<TariffEngine>,
    pub auth: AuthTokens,
}

impl ApiState {
    pub fn new(engine: Arc<TariffEngine>, auth: AuthTokens) -> Self {
        Self { engine, auth }
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::validation(message).into()
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        let status = match &error {
            EngineError::Validation { .. }
            | EngineError::EmptyScenarioSet
            | EngineError::TooManyScenarios { .. } => StatusCode::BAD_REQUEST,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::AmbiguousTariff { .. } => StatusCode::CONFLICT,
            EngineError::MissingDistance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Permission { .. } => StatusCode::FORBIDDEN,
            EngineError::Store(_) | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!(event_name = "api.error.internal", error = %error, "internal engine error");
        }

        let received = match &error {
            EngineError::Validation { received, .. } => received.clone(),
            _ => None,
        };

        Self {
            status,
            body: ErrorBody {
                error: error.code().to_string(),
                message: error.user_safe_message(),
                received,
            },
        }
    }
}

impl From<AuthRejection> for ApiError {
    fn from(rejection: AuthRejection) -> Self {
        let (status, code, message) = match rejection {
            AuthRejection::MissingToken => {
                (StatusCode::UNAUTHORIZED, "missing_token", "A bearer token is required.")
            }
            AuthRejection::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "invalid_token", "The bearer token is not valid.")
            }
            AuthRejection::AdminRequired => (
                StatusCode::FORBIDDEN,
                "permission_denied",
                "This operation requires the admin token.",
            ),
        };
        Self {
            status,
            body: ErrorBody { error: code.to_string(), message: message.to_string(), received: None },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/tarifa-engine/calculate", post(calculate))
        .route("/api/tarifa-engine/simulate", post(simulate))
        .route("/api/tarifa-engine/audit", get(query_audit))
        .route("/api/tarifa-engine/cache/stats", get(cache_stats))
        .route("/api/tarifa-engine/clear-cache", post(clear_cache))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn calculate(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<CalculationRequest>,
) -> Result<Json<CalculationResult>, ApiError> {
    state.auth.authorize(&headers, false)?;
    let result = state.engine.calculate(&request).await?;
    Ok(Json(result))
}

async fn simulate(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<SimulationRequest>,
) -> Result<Json<SimulationReport>, ApiError> {
    state.auth.authorize(&headers, false)?;
    let report = state.engine.simulate(&request).await?;
    Ok(Json(report))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditParams {
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
    #[serde(rename = "clienteId")]
    pub cliente_id: Option<String>,
    #[serde(rename = "conErrores", default)]
    pub con_errores: bool,
    #[serde(default)]
    pub limite: u32,
    #[serde(rename = "incluirContexto", default)]
    pub incluir_contexto: bool,
    #[serde(rename = "agruparPor")]
    pub agrupar_por: Option<String>,
}

async fn query_audit(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(params): Query<AuditParams>,
) -> Result<Json<AuditReport>, ApiError> {
    state.auth.authorize(&headers, false)?;

    let group_by = match params.agrupar_por.as_deref() {
        None => None,
        Some(raw) => Some(AuditGroupBy::parse(raw).ok_or_else(|| {
            ApiError::validation(format!(
                "unsupported agruparPor `{raw}` (expected cliente|metodo|fecha|hora)"
            ))
        })?),
    };

    let query = AuditQuery {
        desde: params.desde,
        hasta: params.hasta,
        client: params.cliente_id.map(ClientId),
        only_failed: params.con_errores,
        limite: params.limite,
        include_context: params.incluir_contexto,
    };

    let report = state.engine.query_audit(query, group_by).await?;
    Ok(Json(report))
}

async fn cache_stats(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<CacheStats>, ApiError> {
    state.auth.authorize(&headers, false)?;
    Ok(Json(state.engine.cache_stats()))
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub operacion: &'static str,
    pub timestamp: DateTime<Utc>,
    pub usuario: &'static str,
    pub estadisticas: ClearOutcome,
    pub impacto: String,
    pub recomendaciones: Vec<&'static str>,
}

async fn clear_cache(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<ClearCacheResponse>, ApiError> {
    let tier = state.auth.authorize(&headers, true)?;
    let outcome = state.engine.clear_cache();

    tracing::info!(
        event_name = "api.cache.cleared",
        usuario = tier.label(),
        antes = outcome.before,
        despues = outcome.after,
        "calculation cache cleared"
    );

    Ok(Json(ClearCacheResponse {
        operacion: "clear-cache",
        timestamp: Utc::now(),
        usuario: tier.label(),
        estadisticas: outcome,
        impacto: format!("{} cached results invalidated", outcome.before),
        recomendaciones: vec!["subsequent identical requests will recalculate from the database"],
    }))
}
