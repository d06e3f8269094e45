use crate::db::errors::DbError;
use crate::db::models::forms::ValidationError;
use crate::uploads::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// A required field was missing or blank
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request body was not valid multipart data
    #[error("Malformed multipart body: {message}")]
    Multipart { message: String },

    /// The uploaded image exceeded the configured size
    #[error("Uploaded file exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// Writing the uploaded image failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Document store operation error
    #[error(transparent)]
    Database(#[from] DbError),
}

/// The API operation an error happened during. Each has one fixed failure body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SubmitForm,
    FetchForms,
}

impl Operation {
    /// Plain-text body returned to the client when the operation fails
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::SubmitForm => "Error submitting form",
            Operation::FetchForms => "Error fetching forms",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::SubmitForm => write!(f, "submit form"),
            Operation::FetchForms => write!(f, "fetch forms"),
        }
    }
}

/// An [`Error`] tagged with the operation it interrupted.
///
/// Every failure becomes a 500 carrying the operation's fixed message. Details are only logged.
#[derive(ThisError, Debug)]
#[error("Failed to {operation}: {source}")]
pub struct HandlerError {
    pub operation: Operation,
    #[source]
    pub source: Error,
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match &self.source {
            Error::Validation(_) | Error::Database(DbError::Validation(_)) => {
                tracing::warn!("Rejected submission: {}", self);
            }
            Error::Multipart { .. } | Error::PayloadTooLarge { .. } => {
                tracing::warn!("Client error: {}", self);
            }
            Error::Database(db_err) if db_err.is_connectivity() => {
                tracing::error!("Document store unavailable: {}", self);
            }
            Error::Storage(_) | Error::Database(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
        }

        (StatusCode::INTERNAL_SERVER_ERROR, self.operation.failure_message()).into_response()
    }
}

/// Attach an [`Operation`] to anything convertible into an API [`Error`]
pub trait ResultExt<T> {
    fn during(self, operation: Operation) -> Result<T, HandlerError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<Error>,
{
    fn during(self, operation: Operation) -> Result<T, HandlerError> {
        self.map_err(|e| HandlerError {
            operation,
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: HandlerError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_every_error_is_a_fixed_500() {
        let cases = [
            (Error::from(ValidationError::missing("image")), Operation::SubmitForm, "Error submitting form"),
            (
                Error::Multipart {
                    message: "boundary missing".to_string(),
                },
                Operation::SubmitForm,
                "Error submitting form",
            ),
            (Error::PayloadTooLarge { limit: 10 }, Operation::SubmitForm, "Error submitting form"),
            (
                Error::from(DbError::Connectivity(sqlx::Error::PoolTimedOut)),
                Operation::FetchForms,
                "Error fetching forms",
            ),
        ];

        for (source, operation, expected) in cases {
            let (status, body) = body_of(HandlerError { operation, source }).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, expected);
        }
    }

    #[tokio::test]
    async fn test_details_are_not_leaked() {
        let source = Error::from(DbError::Other(anyhow::anyhow!("relation \"forms\" does not exist")));
        let (_, body) = body_of(HandlerError {
            operation: Operation::FetchForms,
            source,
        })
        .await;
        assert!(!body.contains("relation"));
    }

    #[test_log::test(tokio::test)]
    async fn test_unavailable_store_and_failed_upload_are_fixed_500() {
        let cases = [
            Error::from(DbError::from(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))),
            Error::from(DbError::Other(anyhow::anyhow!("row decode failed"))),
            Error::from(StorageError::Stream {
                written: 3,
                source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away"),
            }),
        ];

        for source in cases {
            let (status, body) = body_of(HandlerError {
                operation: Operation::SubmitForm,
                source,
            })
            .await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, "Error submitting form");
        }
    }

    #[test]
    fn test_during_tags_operation() {
        let result: Result<(), ValidationError> = Err(ValidationError::missing("name"));
        let err = result.during(Operation::SubmitForm).unwrap_err();
        assert_eq!(err.operation, Operation::SubmitForm);
        assert_eq!(err.to_string(), "Failed to submit form: name is required");
    }
}
