use crate::db::models::forms::ValidationError;
use thiserror::Error;

/// Unified error type for document store operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// A required field was missing or blank
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The store could not be reached
    #[error("Document store unreachable: {0}")]
    Connectivity(#[source] sqlx::Error),

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DbError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, DbError::Connectivity(_))
    }
}

/// Convert from sqlx::Error using sqlx's error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DbError::Connectivity(err),
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                match db_err.constraint().and_then(ValidationError::from_constraint) {
                    Some(validation) => DbError::Validation(validation),
                    None => DbError::Other(anyhow::Error::from(err)),
                }
            }
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_connectivity() {
        assert!(DbError::from(sqlx::Error::PoolTimedOut).is_connectivity());
        assert!(DbError::from(sqlx::Error::PoolClosed).is_connectivity());

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(DbError::from(sqlx::Error::Io(io)).is_connectivity());
    }

    #[test]
    fn test_other_errors_are_not_connectivity() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Other(_)));
    }
}
