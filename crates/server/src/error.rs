use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::reminder_recipient::ReminderRecipientError;
use serde_json::json;
use services::services::{config::ConfigError, reminder_job::ReminderJobError};
use thiserror::Error;
use utils::response::ApiResponse;
use uuid::Uuid;

/// Errors from the operator routes, rendered as an `ApiResponse` envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    ReminderRecipient(#[from] ReminderRecipientError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Config(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ReminderRecipient(ReminderRecipientError::Duplicate { .. }) => {
                StatusCode::CONFLICT
            }
            ApiError::ReminderRecipient(ReminderRecipientError::InvalidEmail(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::ReminderRecipient(ReminderRecipientError::Database(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let response = ApiResponse::<()>::error(&self.to_string());
        (status, Json(response)).into_response()
    }
}

/// Errors from the reminder function endpoints, rendered as `{error, message}`.
#[derive(Debug, Error)]
pub enum FunctionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Job(#[from] ReminderJobError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("student not found: {0}")]
    StudentNotFound(Uuid),
}

impl FunctionError {
    pub fn code(&self) -> &'static str {
        match self {
            FunctionError::Config(e) => e.code(),
            FunctionError::Job(ReminderJobError::Template(_)) => "template_error",
            FunctionError::Job(_) => "query_error",
            FunctionError::InvalidRequest(_) => "invalid_request",
            FunctionError::StudentNotFound(_) => "student_not_found",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            FunctionError::Config(_) | FunctionError::Job(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FunctionError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            FunctionError::StudentNotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for FunctionError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Reminder function failed");
        }

        let body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
