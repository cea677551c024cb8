//! Postgres connection pool setup.
//!
//! The database may come up after the propagator (same deploy, restarted
//! container), so connecting retries for a bounded window before giving up.
//! A malformed URI is never retried.

use std::str::FromStr;
use std::time::{Duration, Instant};

use reqwest::Url;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("invalid database uri: {0}")]
    InvalidUri(String),

    #[error("could not connect to database after {attempts} attempts: {last_error}")]
    Unreachable { attempts: u32, last_error: String },
}

/// Pool and retry settings.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Total time spent retrying before giving up.
    pub retry_for: Duration,
    pub retry_delay: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            retry_for: Duration::from_secs(60),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Connect and ping (`SELECT 1`).
#[instrument(
    skip(uri, options),
    fields(retry_for_ms = options.retry_for.as_millis() as u64),
    err
)]
pub async fn connect(uri: &str, options: &ConnectOptions) -> Result<PgPool, DbError> {
    let connect_options = parse_uri(uri)?;

    let deadline = Instant::now() + options.retry_for;
    let mut attempts = 0;

    loop {
        attempts += 1;
        match try_connect(connect_options.clone(), options).await {
            Ok(pool) => {
                info!(attempts, "connected to database");
                return Ok(pool);
            }
            Err(e) if Instant::now() + options.retry_delay < deadline => {
                warn!(attempts, error = %e, "database not reachable yet, retrying");
                tokio::time::sleep(options.retry_delay).await;
            }
            Err(e) => {
                return Err(DbError::Unreachable {
                    attempts,
                    last_error: e.to_string(),
                });
            }
        }
    }
}

/// Only `postgres://` and `postgresql://` URIs are accepted; sqlx alone
/// ignores the scheme.
fn parse_uri(uri: &str) -> Result<PgConnectOptions, DbError> {
    let url = Url::parse(uri).map_err(|e| DbError::InvalidUri(e.to_string()))?;
    if !matches!(url.scheme(), "postgres" | "postgresql") {
        return Err(DbError::InvalidUri(format!(
            "unsupported scheme `{}`",
            url.scheme()
        )));
    }
    PgConnectOptions::from_str(uri).map_err(|e| DbError::InvalidUri(e.to_string()))
}

async fn try_connect(
    connect_options: PgConnectOptions,
    options: &ConnectOptions,
) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(options.max_connections)
        .acquire_timeout(options.acquire_timeout)
        .connect_with(connect_options)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    Ok(pool)
}
