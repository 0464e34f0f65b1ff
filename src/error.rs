//! Library error type and its HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Errors surfaced by chains, the LLM client and the response layer
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LLM backend returned status {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("failed to parse LLM response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing chain input: {0}")]
    MissingInput(String),

    #[error("token stream error: {0}")]
    Stream(String),

    #[error("chain execution failed: {0}")]
    Chain(String),
}

impl Error {
    /// HTTP status this error maps to when it occurs before a stream starts
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Http(_) | Error::Api { .. } => StatusCode::BAD_GATEWAY,
            Error::Io(_) | Error::Parse(_) | Error::Stream(_) | Error::Chain(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal failures are logged in full but reach the client as a
        // generic detail string.
        let detail = match &self {
            Error::MissingInput(_) | Error::Api { .. } => self.to_string(),
            other => {
                tracing::error!(error = %other, "request failed");
                "Internal Server Error".to_string()
            }
        };

        (
            status,
            Json(json!({
                "status_code": status.as_u16(),
                "detail": detail,
            })),
        )
            .into_response()
    }
}
