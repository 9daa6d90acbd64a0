use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::subscriber::SubscriberError;
use crate::topic::TopicError;
use crate::workflow::WorkflowError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Subscriber registration failed: {0}")]
    SubscriberRegistration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TopicError> for AppError {
    fn from(err: TopicError) -> Self {
        match err {
            TopicError::NotFound(key) => AppError::TopicNotFound(key),
            TopicError::AlreadyExists(key) => AppError::Conflict(format!("topic {key} already exists")),
            TopicError::InvalidKey(msg) => AppError::Validation(msg),
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotFound(id) => AppError::WorkflowNotFound(id),
            WorkflowError::AlreadyExists(id) => {
                AppError::Conflict(format!("workflow {id} already exists"))
            }
            WorkflowError::InvalidId(msg) | WorkflowError::InvalidWorkflow(msg) => {
                AppError::Validation(msg)
            }
            WorkflowError::SubstitutionFailed(msg) => AppError::Internal(msg),
        }
    }
}

impl From<SubscriberError> for AppError {
    fn from(err: SubscriberError) -> Self {
        match err {
            SubscriberError::InvalidDefinition(msg) => AppError::SubscriberRegistration(msg),
            SubscriberError::AlreadyExists(id) => {
                AppError::Conflict(format!("subscriber {id} already exists"))
            }
            SubscriberError::NotFound(id) => AppError::NotFound(format!("subscriber {id}")),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, client_message, log_message) = match &self {
            AppError::Config(e) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Configuration error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", client_msg, log_msg)
            }
            AppError::InvalidRecipient(msg) => (
                StatusCode::BAD_REQUEST,
                "INVALID_RECIPIENT",
                msg.clone(),
                msg.clone(),
            ),
            AppError::TopicNotFound(key) => (
                StatusCode::NOT_FOUND,
                "TOPIC_NOT_FOUND",
                key.clone(),
                key.clone(),
            ),
            AppError::WorkflowNotFound(id) => (
                StatusCode::NOT_FOUND,
                "WORKFLOW_NOT_FOUND",
                id.clone(),
                id.clone(),
            ),
            AppError::SubscriberRegistration(msg) => (
                StatusCode::BAD_REQUEST,
                "SUBSCRIBER_REGISTRATION_FAILED",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Internal(e) => {
                let log_msg = e.clone();
                let client_msg = if is_production() {
                    "Internal server error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", client_msg, log_msg)
            }
        };

        // Always log the detailed error server-side
        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
