//! Application error type and its HTTP mapping

use crate::models::ApiResponse;
use crate::store::StoreError;
use crate::validation::ValidationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("A user with this {field} already exists")]
    Duplicate { field: String },

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Store(StoreError),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Request body too large")]
    TooLarge,
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field } => AppError::Duplicate { field },
            other => AppError::Store(other),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Duplicate { .. } => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Store(_) | AppError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Attach the response policy; internal details are only exposed outside production.
    pub fn expose(self, expose_internal: bool) -> ApiError {
        ApiError {
            inner: self,
            expose_internal,
        }
    }
}

/// An [`AppError`] ready to be rendered as the response envelope.
#[derive(Debug)]
pub struct ApiError {
    inner: AppError,
    expose_internal: bool,
}

impl From<AppError> for ApiError {
    fn from(inner: AppError) -> Self {
        inner.expose(false)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.inner.status();
        let expose = self.expose_internal;
        let mut body = ApiResponse::<()>::error(match &self.inner {
            AppError::Validation(_) => "Validation error".to_string(),
            AppError::Store(_) => "Database error".to_string(),
            AppError::Upload(_) => "Failed to store upload".to_string(),
            other => other.to_string(),
        });

        match self.inner {
            AppError::Validation(e) => body.error = Some(e.to_string()),
            AppError::Duplicate { field } => body.field = Some(field),
            AppError::Store(e) => {
                tracing::error!(error = %e, "Store operation failed");
                if expose {
                    body.error = Some(e.to_string());
                }
            }
            AppError::Upload(e) => {
                tracing::error!(error = %e, "Upload failed");
                if expose {
                    body.error = Some(e);
                }
            }
            AppError::NotFound(_) | AppError::Forbidden(_) | AppError::TooLarge => {}
        }

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;
