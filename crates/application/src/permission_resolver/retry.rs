use std::future::Future;

use keygate_core::AppResult;

use super::PermissionResolver;

impl PermissionResolver {
    /// Runs a read, retrying transient storage failures per configuration.
    ///
    /// Once retries are exhausted the `StorageUnavailable` error is returned
    /// so callers fail closed.
    pub(super) async fn with_read_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut read: F,
    ) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match read().await {
                Err(error) if error.is_retryable() && attempt < self.config.read_retry_attempts => {
                    attempt += 1;
                    tracing::warn!(operation, attempt, error = %error, "storage read failed, retrying");
                    tokio::time::sleep(self.config.read_retry_backoff).await;
                }
                Err(error) => {
                    if error.is_retryable() {
                        tracing::error!(operation, error = %error, "storage unavailable, failing closed");
                    }
                    return Err(error);
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}
