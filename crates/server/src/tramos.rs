//! Conflict endpoints over the tramo catalog.
//!
//! Endpoints:
//! - `GET  /api/tramos/conflictos`          — detect route-kind conflicts
//! - `POST /api/tramos/conflictos/corregir` — bulk-correct kinds (admin)

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use tarifario_core::domain::tariff::{
    CalculationMethod, ClientId, RouteKind, SiteId, TariffRecordId,
};
use tarifario_core::engine::conflict::{ConflictFilter, ConflictReport, CorrectionReport};

use crate::engine_api::{ApiError, ApiState};

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/tramos/conflictos", get(detect))
        .route("/api/tramos/conflictos/corregir", post(correct))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct ConflictParams {
    #[serde(rename = "clienteId")]
    pub cliente_id: Option<String>,
    #[serde(rename = "origenId")]
    pub origen_id: Option<String>,
    #[serde(rename = "destinoId")]
    pub destino_id: Option<String>,
    pub metodo: Option<String>,
}

async fn detect(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(params): Query<ConflictParams>,
) -> Result<Json<ConflictReport>, ApiError> {
    state.auth.authorize(&headers, false)?;

    let client = params
        .cliente_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::validation("clienteId is required"))?;

    let method = match params.metodo.as_deref() {
        None => None,
        Some(raw) => Some(CalculationMethod::parse(raw).ok_or_else(|| {
            ApiError::validation(format!(
                "unsupported metodo `{raw}` (expected KILOMETRO|PALLET|FIJO)"
            ))
        })?),
    };

    let filter = ConflictFilter {
        client: ClientId(client.to_owned()),
        origin: params.origen_id.map(SiteId),
        destination: params.destino_id.map(SiteId),
        method,
    };

    let report = state.engine.detect_conflicts(&filter).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct CorrectRequest {
    #[serde(rename = "tramoIds")]
    pub tramo_ids: Vec<String>,
    #[serde(rename = "tipoDestino")]
    pub tipo_destino: String,
}

async fn correct(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<CorrectRequest>,
) -> Result<Json<CorrectionReport>, ApiError> {
    state.auth.authorize(&headers, true)?;

    let target_kind = RouteKind::normalize(&body.tipo_destino).ok_or_else(|| {
        ApiError::validation(format!(
            "unsupported tipoDestino `{}` (expected TRMC|TRMI)",
            body.tipo_destino
        ))
    })?;

    let ids: Vec<TariffRecordId> = body.tramo_ids.into_iter().map(TariffRecordId).collect();
    let report = state.engine.correct_conflicts(&ids, target_kind).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::auth::AuthTokens;
    use crate::engine_api::tests::{body_json, engine, record};
    use crate::engine_api::ApiState;
    use crate::tramos::router;

    fn conflicted_app(auth: AuthTokens) -> Router {
        router(ApiState::new(
            engine(vec![record("t-1", "TRMC"), record("t-2", "TRMI"), record("t-3", "TRM?")]),
            auth,
        ))
    }

    #[tokio::test]
    async fn detect_requires_a_client_filter() {
        let response = conflicted_app(AuthTokens::default())
            .oneshot(
                Request::builder()
                    .uri("/api/tramos/conflictos")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn detect_reports_groups_and_unnormalized_records() {
        let response = conflicted_app(AuthTokens::default())
            .oneshot(
                Request::builder()
                    .uri("/api/tramos/conflictos?clienteId=c-1")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["totalTramos"], 3);
        assert_eq!(body["conflictos"].as_array().expect("conflictos").len(), 1);
        assert_eq!(body["sinNormalizar"][0]["id"], "t-3");
    }

    #[tokio::test]
    async fn correct_normalizes_kinds_and_reports_missing_ids() {
        let response = conflicted_app(AuthTokens::default())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tramos/conflictos/corregir")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "tramoIds": ["t-2", "t-9"], "tipoDestino": "trmc" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["tipoDestino"], "TRMC");
        assert_eq!(body["corregidos"], 1);
        assert_eq!(body["resultados"][0]["estado"], "corrected");
        assert_eq!(body["resultados"][1]["estado"], "not_found");
    }

    #[tokio::test]
    async fn correct_rejects_unknown_target_kind() {
        let response = conflicted_app(AuthTokens::default())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tramos/conflictos/corregir")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "tramoIds": ["t-2"], "tipoDestino": "TRMX" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn correct_requires_admin_when_tokens_are_configured() {
        let response = conflicted_app(AuthTokens::with_tokens(Some("api"), Some("admin")))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tramos/conflictos/corregir")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, "Bearer api")
                    .body(Body::from(
                        json!({ "tramoIds": ["t-2"], "tipoDestino": "TRMC" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
