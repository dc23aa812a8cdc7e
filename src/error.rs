use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::models::job::JobStatus;
use crate::services::job_store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot {action} a job in status {from}")]
    InvalidStateTransition { from: JobStatus, action: String },

    #[error("No approvers available: name approvers or set a hiring manager or recruiter")]
    NoApproversAvailable,

    #[error("No pending approval found for this user")]
    NoPendingApprovalForUser,

    #[error("Job must be approved before publishing (current status {status})")]
    JobNotApproved { status: JobStatus },

    #[error("Could not allocate a unique job code after {attempts} attempts")]
    CodeAllocationExhausted { attempts: u32 },

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Error::BadRequest(_)
            | Error::Validation(_)
            | Error::Json(_)
            | Error::NoApproversAvailable
            | Error::NoPendingApprovalForUser => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidStateTransition { .. } | Error::JobNotApproved { .. } => {
                StatusCode::CONFLICT
            }
            Error::CodeAllocationExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_) | Error::Database(_) | Error::Migrate(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let error_message = match &self {
            Error::Database(_) | Error::Migrate(_) => {
                tracing::error!(error = %self, "storage failure");
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Error::NotFound("Job not found".to_string()),
            StoreError::NoPendingApproval => Error::NoPendingApprovalForUser,
            StoreError::Transition(rejected) => Error::InvalidStateTransition {
                from: rejected.from,
                action: rejected.event.to_string(),
            },
            StoreError::Conflict => Error::Internal("unexpected job code conflict".to_string()),
            StoreError::Database(err) => Error::from(err),
            StoreError::Corrupt(msg) => Error::Internal(msg),
        }
    }
}
