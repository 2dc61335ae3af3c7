use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::{password::HashError, repo::StoreError};
use crate::payments::gateway::PaymentError;

/// Every failure a request can end in. Domain variants carry only input-safe
/// detail; the rest are logged and answered generically.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("email already registered")]
    DuplicateEmail,
    #[error("invalid credentials")]
    AuthenticationFailed,
    #[error("user not found")]
    NotFound,
    #[error("storage failure: {0}")]
    Storage(#[source] sqlx::Error),
    #[error("payment failure: {0}")]
    Payment(#[from] PaymentError),
    #[error("password hashing failure: {0}")]
    Hashing(#[from] HashError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Storage(_)
            | AppError::Payment(_)
            | AppError::Hashing(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Payment(_) => "payment failed".into(),
            AppError::Storage(_) | AppError::Hashing(_) | AppError::Internal(_) => {
                "internal server error".into()
            }
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AppError::DuplicateEmail,
            StoreError::NotFound => AppError::NotFound,
            StoreError::Storage(e) => AppError::Storage(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = ?self, %status, "request failed");
        } else {
            warn!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}
