use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::MIGRATOR;

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

pub(crate) async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres permission tests: {error}");
    }

    Some(pool)
}

/// Positive id unlikely to collide with rows from earlier runs.
pub(crate) fn unique_id() -> i64 {
    let micros = Utc::now().timestamp_micros() % 1_000_000_000_000;
    micros * 100 + i64::from(SEQUENCE.fetch_add(1, Ordering::SeqCst) % 100)
}
