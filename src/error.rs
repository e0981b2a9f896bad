use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced to the reader. None of them are retried; the user
/// re-triggers the action.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required field is missing or malformed, locally or per the backend.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    Conflict(String),
    /// Backend 5xx, unexpected status, or the request never completed.
    #[error("{0}")]
    Server(String),
    /// No stored session; the caller sends the user back to the login screen.
    #[error("No active session")]
    NoSession,
    #[error("Session storage failed: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl ClientError {
    /// Maps a non-success backend status, keeping the backend's message when it sent one.
    pub fn from_status(status: StatusCode, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::Validation(message)
            }
            StatusCode::UNAUTHORIZED => ClientError::InvalidCredentials,
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::CONFLICT => ClientError::Conflict(message),
            _ => ClientError::Server(message),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Server(err.to_string())
    }
}
