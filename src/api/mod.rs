//! Local HTTP API: record, replay, export/import, plus inbound event
//! delivery and the replayed-event stream.

pub mod ws;

use crate::codec::Compression;
use crate::data::validation;
use crate::error::RecordReplayError;
use crate::pipeline::InboundEvent;
use crate::recording::{RecordRequest, RecordStatus};
use crate::replay::{ReplayRequest, ReplayStatus};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

pub type ApiState = Arc<AppState>;

pub const API_BASE: &str = "/api/v3";

const CONTENT_TYPE_JSON: &str = "application/json";

type ApiError = (StatusCode, String);

fn bad_request(context: &str, e: impl Display) -> ApiError {
    (StatusCode::BAD_REQUEST, format!("{}: {}", context, e))
}

fn internal(context: &str, e: impl Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{}: {}", context, e))
}

/// API key authentication middleware.
/// Skips authentication for the ping route so probes work without a key.
async fn api_key_auth(
    State(expected_key): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if request.uri().path() == format!("{}/ping", API_BASE) {
        return Ok(next.run(request).await);
    }
    let provided = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok());
    match provided {
        Some(k) if k == expected_key => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Logs every API call with timing and outcome.
async fn request_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis();
    if status.is_server_error() {
        tracing::warn!("{} {} -> {} ({}ms)", method, path, status.as_u16(), elapsed_ms);
    } else {
        tracing::debug!("{} {} -> {} ({}ms)", method, path, status.as_u16(), elapsed_ms);
    }
    response
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: ApiState) -> Router {
    let import_limit = state.config.service.import_body_limit_bytes;
    Router::new()
        .route(
            &format!("{}/record", API_BASE),
            get(recording_status)
                .post(start_recording)
                .delete(cancel_recording),
        )
        .route(
            &format!("{}/replay", API_BASE),
            get(replay_status).post(start_replay).delete(cancel_replay),
        )
        .route(
            &format!("{}/data", API_BASE),
            get(export_recorded_data)
                .post(import_recorded_data)
                .layer(DefaultBodyLimit::max(import_limit)),
        )
        // Pipeline bridge
        .route(
            &format!("{}/events", API_BASE),
            axum::routing::post(deliver_events),
        )
        .route(&format!("{}/events/ws", API_BASE), get(ws::ws_handler))
        // Utility
        .route(&format!("{}/session", API_BASE), get(session))
        .route(&format!("{}/ping", API_BASE), get(ping))
        .with_state(state)
}

/// Router with auth, logging, concurrency and CORS layers applied.
/// Used by run_server and by integration tests.
pub fn app(state: ApiState) -> Router {
    use tower::limit::ConcurrencyLimitLayer;
    let api_key = state.config.service.api_key.clone();
    let max_concurrent = state.config.service.max_concurrent_requests;
    let base_router = router(state);
    let routes = if let Some(key) = api_key {
        base_router.route_layer(middleware::from_fn_with_state(key, api_key_auth))
    } else {
        base_router
    };
    routes
        .layer(middleware::from_fn(request_log))
        .layer(ConcurrencyLimitLayer::new(max_concurrent))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::CONTENT_ENCODING,
                    axum::http::HeaderName::from_static("x-api-key"),
                ]),
        )
}

pub async fn run_server(state: ApiState) -> Result<(), String> {
    let addr = format!("{}:{}", state.config.service.host, state.config.service.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind API address {}: {}", addr, e))?;
    let app = app(state);
    tracing::info!("Record & Replay API listening on http://{}", addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

async fn ping() -> &'static str {
    "pong"
}

async fn session(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.data_manager.session_snapshot())
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

async fn start_recording(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: RecordRequest = serde_json::from_slice(&body)
        .map_err(|e| bad_request("Unable to process request JSON", e))?;
    let limits = validation::validate_record_request(&request)
        .map_err(|e| bad_request("Record request failed validation", e))?;

    state
        .data_manager
        .start_recording(limits)
        .map_err(|e| match e {
            RecordReplayError::Validation(_) => bad_request("Record request failed validation", e),
            other => internal("Recording failed", other),
        })?;
    Ok(StatusCode::ACCEPTED)
}

async fn recording_status(State(state): State<ApiState>) -> Json<RecordStatus> {
    Json(state.data_manager.recording_status())
}

async fn cancel_recording(State(state): State<ApiState>) -> Result<StatusCode, ApiError> {
    state
        .data_manager
        .cancel_recording()
        .map_err(|e| internal("failed to cancel recording", e))?;
    Ok(StatusCode::ACCEPTED)
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

async fn start_replay(State(state): State<ApiState>, body: Bytes) -> Result<StatusCode, ApiError> {
    let request: ReplayRequest = serde_json::from_slice(&body)
        .map_err(|e| bad_request("Unable to process request JSON", e))?;
    let settings = validation::validate_replay_request(&request)
        .map_err(|e| bad_request("Replay request failed validation", e))?;

    state
        .data_manager
        .start_replay(settings)
        .map_err(|e| internal("Replay failed", e))?;
    Ok(StatusCode::ACCEPTED)
}

async fn replay_status(State(state): State<ApiState>) -> Json<ReplayStatus> {
    Json(state.data_manager.replay_status())
}

async fn cancel_replay(State(state): State<ApiState>) -> Result<StatusCode, ApiError> {
    state
        .data_manager
        .cancel_replay()
        .map_err(|e| internal("failed to cancel replay", e))?;
    Ok(StatusCode::ACCEPTED)
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExportParams {
    #[serde(default)]
    compression: Option<String>,
}

async fn export_recorded_data(
    State(state): State<ApiState>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let data_manager = &state.data_manager;
    data_manager
        .export_recorded_data()
        .map_err(|e| internal("failed to export recorded data", e))?;

    let token = params.compression.unwrap_or_default();
    let compression = Compression::from_export_token(&token)
        .map_err(|_| internal("compression format not available", &token))?;

    let body = data_manager.export_encoded(compression).map_err(|e| match e {
        RecordReplayError::CompressionFailed(_) => internal(
            &format!("failed to compress recorded data of type {}", token),
            e,
        ),
        other => internal("failed to export recorded data", other),
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
    if let Some(encoding) = compression.export_content_encoding() {
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(encoding));
    }
    Ok((StatusCode::OK, headers, body).into_response())
}

#[derive(Debug, Deserialize)]
struct ImportParams {
    #[serde(default)]
    overwrite: Option<String>,
}

async fn import_recorded_data(
    State(state): State<ApiState>,
    Query(params): Query<ImportParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let content_type = header_str(&headers, header::CONTENT_TYPE);
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    if media_type != CONTENT_TYPE_JSON {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Invalid content type '{}'. Must be application/json", content_type),
        ));
    }

    let overwrite = match params.overwrite.as_deref() {
        None | Some("") => true,
        Some(raw) => parse_bool(raw)
            .ok_or_else(|| bad_request("failed to parse overwrite parameter", raw))?,
    };

    let encoding = header_str(&headers, header::CONTENT_ENCODING);
    let compression = Compression::from_content_encoding(encoding).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("compression format {} not supported", encoding),
        )
    })?;

    let data = state
        .data_manager
        .decode_import(&body, compression)
        .map_err(|e| match e {
            RecordReplayError::DecompressionFailed(_) => bad_request("failed to uncompress data", e),
            other => bad_request("Unable to process request JSON", other),
        })?;
    validation::validate_import(&data).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    state
        .data_manager
        .import_recorded_data(data, overwrite)
        .map_err(|e| internal("Import data failed", e))?;
    Ok(StatusCode::ACCEPTED)
}

// ---------------------------------------------------------------------------
// Pipeline bridge
// ---------------------------------------------------------------------------

/// Inbound delivery of one batch. Waits while the capture queue is full.
async fn deliver_events(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let batch: Vec<InboundEvent> = serde_json::from_slice(&body)
        .map_err(|e| bad_request("Unable to process request JSON", e))?;
    let size = batch.len();
    if !state.data_manager.deliver(batch).await {
        tracing::trace!("No recording active, {} events not captured", size);
    }
    Ok(StatusCode::ACCEPTED)
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Boolean parsing with the spellings accepted by edge-platform clients.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        for raw in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(raw), Some(true), "{}", raw);
        }
        for raw in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(raw), Some(false), "{}", raw);
        }
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool("tRuE"), None);
    }
}
