use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use impo_catalog::ProductError;
use impo_promo::PromotionError;
use impo_request::{ProformaError, RequestError, SessionError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    ConflictError(String),
    /// The store rejected a write; local state was rolled back
    #[error("{0}")]
    StorageError(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::StorageError(msg) => {
                tracing::warn!("Storage write failed: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            ProductError::InvalidField { .. } => AppError::ValidationError(err.to_string()),
        }
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            RequestError::InvalidTransition { .. } | RequestError::Locked(_) => AppError::ConflictError(err.to_string()),
            RequestError::Validation(_) => AppError::ValidationError(err.to_string()),
            RequestError::Product(e) => e.into(),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Request(e) => e.into(),
            SessionError::Sync(e) => AppError::StorageError(format!("{}; changes were rolled back", e)),
            SessionError::Closed => AppError::Anyhow(anyhow::anyhow!(err)),
        }
    }
}

impl From<PromotionError> for AppError {
    fn from(err: PromotionError) -> Self {
        match err {
            PromotionError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            PromotionError::ActiveLimitReached { .. } | PromotionError::Expired(_) => {
                AppError::ConflictError(err.to_string())
            }
            PromotionError::Validation(_) => AppError::ValidationError(err.to_string()),
            PromotionError::Repository(e) => AppError::StorageError(format!("{}; board was restored", e)),
        }
    }
}

impl From<ProformaError> for AppError {
    fn from(err: ProformaError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}
