use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Body of every failed response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Errors surfaced by handlers.
///
/// Upstream failures keep their source for the log line but only a fixed
/// message reaches the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("asset store error: {0:#}")]
    AssetStore(anyhow::Error),
    #[error("database error: {0:#}")]
    Database(anyhow::Error),
    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>) -> Self {
        Self::BadRequest(code.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AssetStore(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::BadRequest(code) => code.clone(),
            ApiError::Unauthorized => "Unauthorized".into(),
            ApiError::Forbidden => "Unauthorized Action".into(),
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::AssetStore(_) => "Asset store unavailable".into(),
            ApiError::Database(_) | ApiError::Internal(_) => "Internal server error".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::AssetStore(_) | ApiError::Database(_) | ApiError::Internal(_) = &self {
            error!(error = %self, "request failed");
        }
        let status = self.status();
        (status, Json(ErrorBody { detail: self.detail() })).into_response()
    }
}
