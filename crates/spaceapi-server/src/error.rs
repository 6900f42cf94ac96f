//! HTTP error mapping
//!
//! Every failure leaves the server as a JSON body `{"error": "..."}` with a
//! status code chosen by the surface the request came in on.

use serde_json::json;
use spaceapi_core::{StatusError, ValidationError};
use warp::http::StatusCode;
use warp::reply::{Reply, Response};

/// Request surface, decides how validation failures are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// JSON `update_*` endpoints
    Update,
    /// Key/value `change` and `get` endpoints
    Change,
}

impl Surface {
    fn status(self) -> StatusCode {
        match self {
            Self::Update => StatusCode::BAD_REQUEST,
            Self::Change => StatusCode::NOT_ACCEPTABLE,
        }
    }
}

/// Errors returned to API clients
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Token missing or wrong
    #[error("Unauthorized")]
    Unauthorized,

    /// Malformed or mistyped request body
    #[error("{0}")]
    BadRequest(String),

    /// Unknown key, missing parameter or value not coercible for the key
    #[error("{0}")]
    NotAcceptable(String),

    /// Declared body length above the accepted limit
    #[error("request body too large")]
    PayloadTooLarge,

    /// Store or document failure; message never carries filesystem paths
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Create bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Required request field absent
    #[must_use]
    pub fn missing(field: &'static str, surface: Surface) -> Self {
        Self::from_validation(ValidationError::MissingField(field), surface)
    }

    /// Map a core error for the given surface
    #[must_use]
    pub fn from_status(err: StatusError, surface: Surface) -> Self {
        match err {
            StatusError::Validation(ValidationError::InvalidDocument(message)) => {
                Self::Internal(format!("invalid status document: {message}"))
            }
            StatusError::Validation(e) => match surface {
                Surface::Update => Self::BadRequest(e.to_string()),
                Surface::Change => Self::NotAcceptable(e.to_string()),
            },
            StatusError::Store(e) => {
                tracing::error!(error = %e, "status store failure");
                Self::Internal(e.public_message().to_string())
            }
            StatusError::MissingPath(path) => {
                Self::Internal(format!("Failed to read status: missing {path}"))
            }
        }
    }

    /// Map a validation error for the given surface
    #[must_use]
    pub fn from_validation(err: ValidationError, surface: Surface) -> Self {
        Self::from_status(err.into(), surface)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => Surface::Update.status(),
            Self::NotAcceptable(_) => Surface::Change.status(),
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the JSON error response
    #[must_use]
    pub fn to_response(&self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        error_reply(status, &self.to_string())
    }
}

impl warp::reject::Reject for ApiError {}

/// `{"error": message}` with `status`
pub fn error_reply(status: StatusCode, message: &str) -> Response {
    warp::reply::with_status(warp::reply::json(&json!({ "error": message })), status)
        .into_response()
}

/// Result type alias for request handling
pub type ApiResult<T> = Result<T, ApiError>;
