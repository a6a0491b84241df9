use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::classifier::ClassifierError;
use crate::input::IngestError;
use crate::output::OutputError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing multipart field 'file'")]
    MissingFile,

    #[error("Invalid multipart request: {0}")]
    Multipart(String),

    #[error("Upload exceeds the size limit")]
    PayloadTooLarge,

    #[error("Could not read uploaded table: {0}")]
    Ingest(#[from] IngestError),

    #[error("Classification failed: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Export failed: {0}")]
    Export(#[from] OutputError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFile | ApiError::Multipart(_) | ApiError::Ingest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Classifier(_) | ApiError::Export(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::Multipart(err.body_text())
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Multipart(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            log::error!("{}", self);
            match self {
                ApiError::Classifier(_) => "Classification failed".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            log::warn!("Rejected request: {}", self);
            self.to_string()
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
