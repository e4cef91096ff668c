use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ledgerline_import::{ofx::ERROR_ENTITY, ImportError};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Upload exceeds the configured size limit")]
    PayloadTooLarge,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Import(_) | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ApiError::Import(e) => e.category(),
            ApiError::InvalidBody(_) => "invalidrequest",
            ApiError::PayloadTooLarge => "payloadtoolarge",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::InvalidBody(rejection.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "import request failed");
        }

        let body = Json(json!({
            "error": {
                "category": self.category(),
                "message": self.to_string(),
                "entity": ERROR_ENTITY,
            }
        }));

        (status, body).into_response()
    }
}
