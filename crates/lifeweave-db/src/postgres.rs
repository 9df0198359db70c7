//! The shared `PostgreSQL` pool behind every Lifeweave store.
//!
//! The pool is sized from the scheduler: a turn keeps at most
//! `max_concurrent_entities` entities in flight, each holding one connection
//! for its needs and goal writes, plus one for the tick's `save_batch`.

use std::time::Duration;

use lifeweave_core::{LifeweaveConfig, SchedulerConfig};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::error::DbError;

/// Upper bound on pool size whatever the scheduler asks for.
const MAX_POOL_SIZE: u32 = 64;

/// How long a store call waits for a free connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Reported as `application_name` in `pg_stat_activity`.
const APPLICATION_NAME: &str = "lifeweave";

/// Pool size for a scheduler running `max_concurrent_entities` entities.
pub fn pool_size(max_concurrent_entities: usize) -> u32 {
    u32::try_from(max_concurrent_entities)
        .unwrap_or(MAX_POOL_SIZE)
        .saturating_add(1)
        .clamp(2, MAX_POOL_SIZE)
}

/// Connection pool handle. Clones share one pool.
#[derive(Debug, Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Connect to `infrastructure.postgres_url`, sized for the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed, or
    /// [`DbError::Postgres`] if the connection fails.
    pub async fn connect(config: &LifeweaveConfig) -> Result<Self, DbError> {
        Self::open(
            &config.infrastructure.postgres_url,
            pool_size(config.scheduler.max_concurrent_entities),
        )
        .await
    }

    /// Connect to `url` with a pool sized for the default scheduler.
    ///
    /// # Errors
    ///
    /// Same as [`PostgresPool::connect`].
    pub async fn connect_url(url: &str) -> Result<Self, DbError> {
        let entities = SchedulerConfig::default().max_concurrent_entities;
        Self::open(url, pool_size(entities)).await
    }

    async fn open(url: &str, max_connections: u32) -> Result<Self, DbError> {
        let options: PgConnectOptions = url
            .parse::<PgConnectOptions>()
            .map_err(|e| DbError::Config(format!("invalid postgres url: {e}")))?
            .application_name(APPLICATION_NAME);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;
        tracing::info!(max_connections, "connected to goal database");
        Ok(Self { pool })
    }

    /// Create or upgrade the goal, needs and report tables.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if any migration fails.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("goal schema up to date");
        Ok(())
    }

    /// The underlying [`PgPool`].
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}
