use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_FAILURE_MESSAGE: &str = "API error occurred";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The endpoint answered with `success: false`.
    Rejected,
    Unauthorized,
    NotFound,
    Validation,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            400 | 409 | 422 => Self::Validation,
            429 => Self::RateLimited,
            _ => Self::Internal,
        }
    }
}

/// Failure reported by the remote service, either through the HTTP status or the
/// `success`/`error` envelope every endpoint wraps its payload in.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

fn default_success() -> bool {
    true
}

/// The envelope fields shared by every response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiStatus {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for ApiStatus {
    fn default() -> Self {
        Self {
            success: true,
            error: None,
        }
    }
}

impl ApiStatus {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.success {
            return Ok(());
        }
        let message = self
            .error
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
        Err(ApiError::new(ErrorCode::Rejected, message))
    }
}
