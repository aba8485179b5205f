use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use server_api::{refresh_token, withdrawal_total, RelayContext, RelayOutcome};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{AUTH_REFRESH_ROUTE, DEGRADED_HEADER, WITHDRAWAL_TOTAL_ROUTE},
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

const API_PREFIX: &str = "/api";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let relay = RelayContext::new(
        &settings.backend_url,
        Duration::from_secs(settings.upstream_timeout_seconds),
    )?;
    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, backend = %relay.backend_url(), "relay listening");
    let app = build_router(Arc::new(AppState { relay }), settings.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            &format!("{API_PREFIX}{WITHDRAWAL_TOTAL_ROUTE}"),
            get(http_withdrawal_total),
        )
        .route(
            &format!("{API_PREFIX}{AUTH_REFRESH_ROUTE}"),
            post(http_refresh_token),
        )
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_withdrawal_total(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let outcome = withdrawal_total(&state.relay, authorization(&headers)).await;
    relay_response(outcome)
}

async fn http_refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    let body: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiError::new(
                    ErrorCode::Validation,
                    format!("refresh body is not valid JSON: {e}"),
                )),
            )
        })?
    };
    let outcome = refresh_token(&state.relay, authorization(&headers), &body).await;
    Ok(relay_response(outcome))
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// Always 200; fallbacks are marked with the degraded header.
fn relay_response<T: Serialize>(outcome: RelayOutcome<T>) -> Response {
    let degraded = outcome.is_degraded();
    let mut response = (StatusCode::OK, Json(outcome.into_inner())).into_response();
    if degraded {
        response.headers_mut().insert(
            HeaderName::from_static(DEGRADED_HEADER),
            HeaderValue::from_static("true"),
        );
    }
    response
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
