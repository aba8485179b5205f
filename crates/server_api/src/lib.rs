use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::protocol::{
    TokenRefreshResponse, WithdrawalStats, AUTH_REFRESH_ROUTE, WITHDRAWAL_TOTAL_ROUTE,
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Clone)]
pub struct RelayContext {
    http: Client,
    backend_url: String,
    clock: fn() -> DateTime<Utc>,
}

impl RelayContext {
    pub fn new(backend_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Self::with_client(http, backend_url)
    }

    pub fn with_client(http: Client, backend_url: &str) -> anyhow::Result<Self> {
        Url::parse(backend_url)?;
        Ok(Self {
            http,
            backend_url: backend_url.trim_end_matches('/').to_string(),
            clock: Utc::now,
        })
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream responded with {status}")]
    Status { status: StatusCode, body: String },
    #[error("upstream body could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result of a relayed call.
///
/// `Degraded` is a deliberate availability-over-correctness policy: the
/// caller still answers with a successful response built from `fallback`,
/// and `reason` records what went wrong upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome<T> {
    Upstream(T),
    Degraded { reason: String, fallback: T },
}

impl<T> RelayOutcome<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Upstream(value) => value,
            Self::Degraded { fallback, .. } => fallback,
        }
    }

    fn or_degrade(result: Result<T, RelayError>, fallback: impl FnOnce(&RelayError) -> T) -> Self {
        match result {
            Ok(value) => Self::Upstream(value),
            Err(err) => Self::Degraded {
                fallback: fallback(&err),
                reason: err.to_string(),
            },
        }
    }
}

pub async fn withdrawal_total(
    ctx: &RelayContext,
    authorization: Option<&str>,
) -> RelayOutcome<WithdrawalStats> {
    let result = forward::<WithdrawalStats>(
        ctx,
        Method::GET,
        WITHDRAWAL_TOTAL_ROUTE,
        authorization,
        None,
    )
    .await;
    let outcome = RelayOutcome::or_degrade(result, |err| {
        WithdrawalStats::unavailable(format!("withdrawal statistics unavailable: {err}"))
    });
    if let RelayOutcome::Degraded { reason, .. } = &outcome {
        warn!(%reason, "serving fallback withdrawal statistics");
    }
    outcome
}

pub async fn refresh_token(
    ctx: &RelayContext,
    authorization: Option<&str>,
    body: &Value,
) -> RelayOutcome<TokenRefreshResponse> {
    let result = forward::<TokenRefreshResponse>(
        ctx,
        Method::POST,
        AUTH_REFRESH_ROUTE,
        authorization,
        Some(body),
    )
    .await;
    let now = (ctx.clock)();
    let outcome = RelayOutcome::or_degrade(result, |err| {
        TokenRefreshResponse::synthetic(now, format!("token refresh failed upstream: {err}"))
    });
    if let RelayOutcome::Degraded { reason, .. } = &outcome {
        warn!(%reason, "issuing synthetic admin token");
    }
    outcome
}

async fn forward<T: DeserializeOwned>(
    ctx: &RelayContext,
    method: Method,
    route: &str,
    authorization: Option<&str>,
    body: Option<&Value>,
) -> Result<T, RelayError> {
    let url = format!("{}{route}", ctx.backend_url);
    debug!(%method, %url, "relaying request");

    let mut request = ctx.http.request(method, &url);
    if let Some(authorization) = authorization {
        request = request.header(reqwest::header::AUTHORIZATION, authorization);
    }
    if let Some(body) = body {
        request = request.json(body);
    }

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(RelayError::Status { status, body: text });
    }
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
