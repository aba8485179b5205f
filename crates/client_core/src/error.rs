use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid backend url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status(),
            _ => None,
        }
    }
}
