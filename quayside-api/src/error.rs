use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use quayside_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    Authentication(String),
    BadRequest(String),
    Core(CoreError),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Authentication(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Core(err) => {
                let status = match &err {
                    CoreError::NotFound(_) | CoreError::InvalidCredential => {
                        StatusCode::NOT_FOUND
                    }
                    CoreError::Unauthorized => StatusCode::FORBIDDEN,
                    CoreError::CapacityExceeded => StatusCode::CONFLICT,
                    CoreError::ArrivedTooEarly { .. }
                    | CoreError::InvalidState { .. }
                    | CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                    CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Internal Server Error: {}", err);
                    (status, "Internal Server Error".to_string())
                } else {
                    (status, err.to_string())
                }
            }
            AppError::Internal(err) => {
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

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}
