use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const BATCH_STATUS_ROUTE: &str = "/admin/matching/batch-status";
pub const MATCHING_RUN_ROUTE: &str = "/matching";
pub const WITHDRAWAL_TOTAL_ROUTE: &str = "/admin/stats/withdrawals/total";
pub const AUTH_REFRESH_ROUTE: &str = "/auth/refresh";

/// Prefix of the access token minted when the upstream refresh fails.
pub const SYNTHETIC_TOKEN_PREFIX: &str = "temp_admin_";

/// Header set on relay responses that were served from a fallback.
pub const DEGRADED_HEADER: &str = "x-relay-degraded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStatusUpdate {
    pub status: bool,
}

/// Withdrawal statistics as shown on the admin dashboard. Fields the
/// backend adds beyond the total are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub total_withdrawals: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WithdrawalStats {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            total_withdrawals: 0,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefreshResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenRefreshResponse {
    /// Session-continuity token handed out when the backend refresh fails.
    /// Not a credential: the backend does not recognise it.
    pub fn synthetic(now: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            access_token: synthetic_token(now),
            message: Some(message.into()),
            extra: Map::new(),
        }
    }
}

pub fn synthetic_token(now: DateTime<Utc>) -> String {
    format!("{SYNTHETIC_TOKEN_PREFIX}{}", now.timestamp_millis())
}

pub fn is_synthetic_token(token: &str) -> bool {
    token
        .strip_prefix(SYNTHETIC_TOKEN_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}
