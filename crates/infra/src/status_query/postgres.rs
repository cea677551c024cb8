//! Postgres-backed candidate query.
//!
//! ## Error Mapping
//!
//! | SQLx Error | QueryError | Scenario |
//! |------------|------------|----------|
//! | PoolTimedOut / PoolClosed / Io / Tls | `Unavailable` | store unreachable |
//! | Database / Protocol / other | `Query` | query could not execute |
//! | (row fails `ExternalId` validation) | `Malformed` | bad data in `external_id` |
//!
//! ## Thread Safety
//!
//! `PostgresStatusQuery` is `Send + Sync` and cheap to clone; the SQLx pool is
//! shared by every clone and handles concurrent connection checkout.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{Span, instrument};

use propagator_core::{ExternalId, RetryCeiling};

use super::r#trait::{QueryError, StatusQuery};

/// Distinct jobs with at least one unacknowledged status under the ceiling.
pub const UNPROPAGATED_SQL: &str = r#"
SELECT DISTINCT external_id
  FROM job_status_updates
 WHERE propagated = false
   AND propagation_attempts < $1
"#;

/// Reads candidates from the `job_status_updates` table.
#[derive(Debug, Clone)]
pub struct PostgresStatusQuery {
    pool: Arc<PgPool>,
}

impl PostgresStatusQuery {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl StatusQuery for PostgresStatusQuery {
    #[instrument(
        skip(self, cancel),
        fields(ceiling = %ceiling, candidate_count = tracing::field::Empty),
        err
    )]
    async fn unpropagated(
        &self,
        ceiling: RetryCeiling,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExternalId>, QueryError> {
        let query = sqlx::query_scalar::<_, String>(UNPROPAGATED_SQL)
            .bind(i64::from(ceiling.get()))
            .fetch_all(&*self.pool);

        let rows = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(QueryError::Cancelled),
            rows = query => rows.map_err(map_sqlx_error)?,
        };

        let candidates = parse_rows(rows)?;
        Span::current().record("candidate_count", candidates.len());
        Ok(candidates)
    }
}

fn parse_rows(rows: Vec<String>) -> Result<Vec<ExternalId>, QueryError> {
    rows.into_iter()
        .map(|raw| {
            ExternalId::new(raw.clone())
                .map_err(|e| QueryError::Malformed(format!("external_id {raw:?}: {e}")))
        })
        .collect()
}

fn map_sqlx_error(err: sqlx::Error) -> QueryError {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => QueryError::Unavailable(err.to_string()),
        other => QueryError::Query(other.to_string()),
    }
}
