use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use shared::protocol::{BatchStatusUpdate, BATCH_STATUS_ROUTE, MATCHING_RUN_ROUTE};
use tracing::debug;
use url::Url;

use crate::error::BackendError;

#[async_trait]
pub trait BatchStatusApi: Send + Sync {
    /// Current batch-enabled flag; `None` when the backend has no value.
    async fn fetch_batch_status(&self) -> Result<Option<bool>>;
    async fn set_batch_status(&self, status: bool) -> Result<()>;
}

#[async_trait]
pub trait MatchingApi: Send + Sync {
    /// Runs one matching pass. The response body is opaque.
    async fn run_matching(&self) -> Result<Value>;
}

#[async_trait]
impl<T: BatchStatusApi + ?Sized> BatchStatusApi for Arc<T> {
    async fn fetch_batch_status(&self) -> Result<Option<bool>> {
        (**self).fetch_batch_status().await
    }

    async fn set_batch_status(&self, status: bool) -> Result<()> {
        (**self).set_batch_status(status).await
    }
}

#[async_trait]
impl<T: MatchingApi + ?Sized> MatchingApi for Arc<T> {
    async fn run_matching(&self) -> Result<Value> {
        (**self).run_matching().await
    }
}

/// Upper bound on a single backend call when no timeout is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Admin client for the matching backend.
#[derive(Debug, Clone)]
pub struct HttpAdminApi {
    http: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpAdminApi {
    /// Every request gives up after `timeout`, so a silent backend surfaces as a
    /// transport error instead of a call that never returns.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http = Client::builder().timeout(timeout).build()?;
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Result<Self, BackendError> {
        let base_url = base_url.into();
        Url::parse(&base_url)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: None,
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, route: &str) -> Result<Url, BackendError> {
        Ok(Url::parse(&format!("{}{route}", self.base_url))?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, BackendError> {
        let request = match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Status { status, body });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|err| BackendError::Decode(err.to_string()))
    }
}

fn batch_status_from_body(body: &Value) -> Result<Option<bool>, BackendError> {
    match body {
        Value::Bool(status) => Ok(Some(*status)),
        Value::Null => Ok(None),
        Value::Object(map) => match map.get("status") {
            Some(inner) => batch_status_from_body(inner),
            None => Err(BackendError::Decode(format!(
                "batch status object without `status`: {body}"
            ))),
        },
        other => Err(BackendError::Decode(format!(
            "batch status is not a boolean: {other}"
        ))),
    }
}

#[async_trait]
impl BatchStatusApi for HttpAdminApi {
    async fn fetch_batch_status(&self) -> Result<Option<bool>> {
        let url = self.endpoint(BATCH_STATUS_ROUTE)?;
        debug!(%url, "fetching batch status");
        let body = self.send(self.http.get(url)).await?;
        Ok(batch_status_from_body(&body)?)
    }

    async fn set_batch_status(&self, status: bool) -> Result<()> {
        let url = self.endpoint(BATCH_STATUS_ROUTE)?;
        debug!(%url, status, "updating batch status");
        self.send(self.http.post(url).json(&BatchStatusUpdate { status }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MatchingApi for HttpAdminApi {
    async fn run_matching(&self) -> Result<Value> {
        let url = self.endpoint(MATCHING_RUN_ROUTE)?;
        debug!(%url, "requesting matching run");
        Ok(self.send(self.http.post(url)).await?)
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
