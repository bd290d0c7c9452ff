use keygate_core::AppError;

/// Maps a driver error, classifying connectivity failures as retryable.
pub(crate) fn storage_error(action: &str, error: sqlx::Error) -> AppError {
    match &error {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => {
            AppError::StorageUnavailable(format!("failed to {action}: {error}"))
        }
        _ => AppError::Internal(format!("failed to {action}: {error}")),
    }
}

/// Returns whether the error is a unique constraint violation.
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(database_error) if database_error.code().as_deref() == Some("23505")
    )
}
