//! HTTP adapter for the resolution service
//!
//! Thin handlers only: parse the id, call the service, map the result onto
//! the response contract.

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::models::parse_native_id;
use crate::quota::{QuotaEvent, QuotaMonitor};
use crate::service::{ResolutionService, ResolveResponse};

/// Shared application state
#[derive(Clone)]
struct AppState {
    service: Arc<ResolutionService>,
    monitor: Option<Arc<QuotaMonitor>>,
}

/// Resolve query parameters
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveParams {
    #[serde(default)]
    refresh: bool,
    /// Partition key of the card, enables the store lookup
    #[serde(default)]
    set_id: Option<i64>,
}

/// Quota endpoint response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn respond(response: ResolveResponse) -> (StatusCode, Json<ResolveResponse>) {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response))
}

/// GET /api/cards/{id}?refresh={bool}&setId={setId}
async fn card_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ResolveParams>,
) -> (StatusCode, Json<ResolveResponse>) {
    let native_id = match parse_native_id(&id) {
        Ok(native_id) => native_id,
        Err(e) => return respond(ResolveResponse::failure(&e)),
    };

    let response = state
        .service
        .resolve_card_response(native_id, params.set_id, params.refresh)
        .await;
    if response.status >= 500 {
        log::error!("Resolve card {} failed: {:?}", id, response.error);
    }
    respond(response)
}

/// GET /api/sets/{id}?refresh={bool}
async fn set_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ResolveParams>,
) -> (StatusCode, Json<ResolveResponse>) {
    let native_id = match parse_native_id(&id) {
        Ok(native_id) => native_id,
        Err(e) => return respond(ResolveResponse::failure(&e)),
    };

    let response = state
        .service
        .resolve_set_response(native_id, params.refresh)
        .await;
    if response.status >= 500 {
        log::error!("Resolve set {} failed: {:?}", id, response.error);
    }
    respond(response)
}

/// GET /api/quota
/// Latest monitor event; checks now if the monitor hasn't run yet
async fn quota_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<QuotaEvent>>) {
    let Some(monitor) = state.monitor else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse {
                success: false,
                data: None,
                error: Some("Quota monitor disabled".to_string()),
            }),
        );
    };

    let event = match monitor.latest().await {
        Some(event) => Some(event),
        None => {
            if let Err(e) = monitor.sample().await {
                log::warn!("On-demand quota check failed: {}", e);
            }
            monitor.latest().await
        }
    };

    match event {
        Some(event) => {
            let success = matches!(event, QuotaEvent::Checked(_));
            (
                StatusCode::OK,
                Json(ApiResponse {
                    success,
                    data: Some(event),
                    error: None,
                }),
            )
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse {
                success: false,
                data: None,
                error: Some("No quota data yet".to_string()),
            }),
        ),
    }
}

/// Build the web server router
pub fn create_router(
    service: Arc<ResolutionService>,
    monitor: Option<Arc<QuotaMonitor>>,
) -> Router {
    let state = AppState { service, monitor };
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/api/cards/{id}", get(card_handler))
        .route("/api/sets/{id}", get(set_handler))
        .route("/api/quota", get(quota_handler))
        .layer(cors)
        .with_state(state)
}

/// Serve the resolve API on every interface at `port` until the listener
/// fails.
pub async fn serve(
    service: Arc<ResolutionService>,
    monitor: Option<Arc<QuotaMonitor>>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(service, monitor);
    let addr = format!("0.0.0.0:{}", port);

    log::info!("Resolver API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
