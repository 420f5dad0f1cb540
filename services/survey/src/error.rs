use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};
use catalog::CatalogError;
use csvdb::StorageError;
use ratings::{RatingsError, ValidationError};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

pub type ApiError = (StatusCode, Json<Value>);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Ratings(#[from] RatingsError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("unknown session: {0}")]
    UnknownSession(Uuid),

    #[error("the session has no current item to rate")]
    NoCurrentItem,

    #[error("query parameter `rater` is required for per-rater datasets")]
    MissingRater,

    #[error("no ratings recorded yet for {0}")]
    NoDataset(String),

    #[error("request body rejected: {message}")]
    MalformedBody { status: StatusCode, message: String },

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<JsonRejection> for SessionError {
    fn from(e: JsonRejection) -> Self {
        SessionError::MalformedBody { status: e.status(), message: e.body_text() }
    }
}

impl From<ValidationError> for SessionError {
    fn from(e: ValidationError) -> Self {
        SessionError::Ratings(RatingsError::Validation(e))
    }
}

impl From<StorageError> for SessionError {
    fn from(e: StorageError) -> Self {
        SessionError::Ratings(RatingsError::Storage(e))
    }
}

impl SessionError {
    pub fn status(&self) -> StatusCode {
        match self {
            SessionError::Ratings(RatingsError::Validation(_)) | SessionError::MissingRater => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SessionError::Ratings(RatingsError::Storage(_) | RatingsError::Codec(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            SessionError::Ratings(RatingsError::NotFound(_))
            | SessionError::Catalog(CatalogError::UnknownModality(_))
            | SessionError::UnknownSession(_)
            | SessionError::NoDataset(_) => StatusCode::NOT_FOUND,
            SessionError::Catalog(_) => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::NoCurrentItem => StatusCode::CONFLICT,
            SessionError::MalformedBody { status, .. } => *status,
            SessionError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Form field the error refers to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            SessionError::Ratings(RatingsError::Validation(e)) => Some(e.field()),
            SessionError::MissingRater => Some("rater"),
            _ => None,
        }
    }
}

impl From<SessionError> for (StatusCode, Json<Value>) {
    fn from(e: SessionError) -> Self {
        let status = e.status();
        if status.is_server_error() {
            tracing::error!(error = %e, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %e, status = status.as_u16(), "request rejected");
        }

        let mut body = json!({ "error": e.to_string() });
        if let Some(field) = e.field() {
            body["field"] = json!(field);
        }
        (status, Json(body))
    }
}
