use std::time::Duration;

use keygate_core::{AppError, AppResult};

/// Read-path tuning for the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionConfig {
    /// Retries after a `StorageUnavailable` failure before failing closed.
    pub read_retry_attempts: u32,
    /// Pause before each retry.
    pub read_retry_backoff: Duration,
}

impl ResolutionConfig {
    /// Creates a resolver configuration.
    #[must_use]
    pub fn new(read_retry_attempts: u32, read_retry_backoff: Duration) -> Self {
        Self {
            read_retry_attempts,
            read_retry_backoff,
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self::new(1, Duration::from_millis(25))
    }
}

/// Page size bounds for administrative listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingConfig {
    default_page_size: usize,
    max_page_size: usize,
}

impl PagingConfig {
    /// Creates validated paging bounds.
    pub fn new(default_page_size: usize, max_page_size: usize) -> AppResult<Self> {
        if default_page_size == 0 {
            return Err(AppError::Validation(
                "default page size must be greater than zero".to_owned(),
            ));
        }

        if max_page_size < default_page_size {
            return Err(AppError::Validation(format!(
                "max page size {max_page_size} must not be below default page size {default_page_size}"
            )));
        }

        Ok(Self {
            default_page_size,
            max_page_size,
        })
    }

    /// Returns the page size used when callers do not pass one.
    #[must_use]
    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    /// Returns the largest page size honored.
    #[must_use]
    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    /// Resolves a requested page size against the bounds.
    pub fn page_size(&self, requested: Option<usize>) -> AppResult<usize> {
        match requested {
            None => Ok(self.default_page_size),
            Some(0) => Err(AppError::Validation(
                "page size must be greater than zero".to_owned(),
            )),
            Some(size) => Ok(size.min(self.max_page_size)),
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 500,
        }
    }
}
