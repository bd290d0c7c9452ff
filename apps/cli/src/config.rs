use std::env;
use std::time::Duration;

use keygate_application::{PagingConfig, ResolutionConfig};
use keygate_core::{AppError, AppResult};

/// Runtime configuration read from the process environment.
#[derive(Debug, Clone)]
pub(crate) struct CliConfig {
    pub(crate) database_url: String,
    pub(crate) max_connections: u32,
    pub(crate) acquire_timeout: Duration,
    pub(crate) resolution: ResolutionConfig,
    pub(crate) paging: PagingConfig,
}

impl CliConfig {
    pub(crate) fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let database_url = lookup("DATABASE_URL")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5_u32)?;
        let acquire_timeout_ms = parse_or(&lookup, "DATABASE_ACQUIRE_TIMEOUT_MS", 2000_u64)?;
        let retry_backoff_ms = parse_or(&lookup, "KEYGATE_READ_RETRY_BACKOFF_MS", 25_u64)?;
        let retry_attempts = parse_or(&lookup, "KEYGATE_READ_RETRY_ATTEMPTS", 1_u32)?;
        let default_page_size = parse_or(&lookup, "KEYGATE_DEFAULT_PAGE_SIZE", 50_usize)?;
        let max_page_size = parse_or(&lookup, "KEYGATE_MAX_PAGE_SIZE", 500_usize)?;

        if max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        if acquire_timeout_ms == 0 {
            return Err(AppError::Validation(
                "DATABASE_ACQUIRE_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_millis(acquire_timeout_ms),
            resolution: ResolutionConfig::new(
                retry_attempts,
                Duration::from_millis(retry_backoff_ms),
            ),
            paging: PagingConfig::new(default_page_size, max_page_size)?,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
