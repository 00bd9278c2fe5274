// Application error type and its mapping to HTTP responses

use crate::{backend::BackendError, query::ValidationErrors, storage::StorageError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Bad user input; the search was never dispatched
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    // Network or backend failure; the user has to resubmit
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    InternalServerError(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(errors) => {
                tracing::info!(%errors, "Rejected invalid search input");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "error": "Invalid search input", "fields": errors.errors() }),
                )
            }
            AppError::Backend(e) => {
                tracing::error!("Backend error: {:?}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "The vehicle search service is unavailable. Please try again." }),
                )
            }
            AppError::NotFound(message) => {
                (StatusCode::NOT_FOUND, json!({ "error": message }))
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
            AppError::InternalServerError(e) => {
                // Log the detailed error here, don't expose it to the client
                tracing::error!("Internal server error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
