//! Error types for agentdoor.

use thiserror::Error;

/// Result type alias for agentdoor.
pub type Result<T> = std::result::Result<T, Error>;

/// agentdoor errors.
///
/// Variants map onto the taxonomy of the error handling design: gate-side
/// variants carry the HTTP status they must surface, client-side variants
/// propagate to the caller unchanged.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed request body, unknown scope name, or challenge mismatch. 400.
    #[error("{0}")]
    InvalidRequest(String),

    /// Unknown agent, bad `api_key`, bad signature, stale timestamp, or
    /// missing/expired bearer token. 401.
    #[error("{0}")]
    Unauthorized(String),

    /// Token lacks a required scope. 403.
    #[error("{0}")]
    Forbidden(String),

    /// Unknown pending registration id. 404.
    #[error("{0}")]
    NotFound(String),

    /// Network failure or non-2xx response on the client side.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Client-side construction-time misuse (`connect` not called, etc).
    #[error("{0}")]
    Config(String),

    /// Credential store I/O failure.
    #[error("credential store error: {0}")]
    Io(#[from] std::io::Error),

    /// Credential store (de)serialization failure.
    #[error("credential serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The HTTP status this error maps to when returned from a gate handler.
    #[must_use]
    pub fn status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Transport(_) | Error::Config(_) | Error::Io(_) | Error::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use serde_json::json;

        let status = self.status();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
