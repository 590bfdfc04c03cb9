//! Error types shared by the content client, page builders and server

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure or non-success answer from the content repository
    #[error("content repository unavailable: {0}")]
    RepositoryUnavailable(String),

    /// No document matches the requested identifier
    #[error("post not found: {0}")]
    NotFound(String),

    /// A fetched document is missing a field the pages rely on
    #[error("malformed document {id}: {reason}")]
    MalformedContent { id: String, reason: String },

    /// A continuation cursor that does not belong to the configured repository
    #[error("invalid continuation cursor: {0}")]
    InvalidCursor(String),

    /// Missing or unusable configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Template(#[from] tera::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedContent {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidCursor(_) => StatusCode::BAD_REQUEST,
            Error::RepositoryUnavailable(_) | Error::MalformedContent { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Error::Config(_) | Error::Template(_) | Error::Json(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::RepositoryUnavailable(e.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Error::NotFound(_) => (status, "Not Found").into_response(),
            Error::InvalidCursor(reason) => (status, reason.clone()).into_response(),
            Error::RepositoryUnavailable(e) => {
                tracing::error!(%e, "content repository error");
                (status, "Bad Gateway").into_response()
            }
            Error::MalformedContent { id, reason } => {
                tracing::error!(%id, %reason, "malformed document");
                (status, "Bad Gateway").into_response()
            }
            e => {
                tracing::error!(%e, "internal error");
                (status, "Internal Server Error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::InvalidCursor("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::malformed("doc", "missing title").status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
