use vinspect_core::error::CoreError;

/// Errors returned by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or failed transiently.
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    /// A record with the same key already exists.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// A stored record could not be decoded into the domain model.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// The caller supplied an unusable key or path.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // PostgreSQL unique constraint violation: error code 23505
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Duplicate(db_err.message().to_string())
            }
            sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => {
                StoreError::Corrupt(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => CoreError::StorageUnavailable(msg),
            StoreError::Duplicate(msg) => CoreError::Validation(msg),
            StoreError::InvalidKey(msg) => CoreError::Validation(msg),
            StoreError::Corrupt(msg) => CoreError::Internal(msg),
        }
    }
}
