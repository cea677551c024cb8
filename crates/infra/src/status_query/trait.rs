use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use propagator_core::{ExternalId, RetryCeiling};

/// Candidate discovery failed.
///
/// Any variant is fatal to the running worker: without a candidate list there
/// is nothing meaningful left to do in the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The store could not be reached (pool closed/timed out, network, TLS).
    #[error("status store unavailable: {0}")]
    Unavailable(String),

    /// The store was reached but the candidate query failed.
    #[error("candidate query failed: {0}")]
    Query(String),

    /// A row came back that cannot be turned into a candidate.
    #[error("malformed status row: {0}")]
    Malformed(String),

    /// The cycle was cancelled while the query was in flight.
    #[error("candidate query cancelled")]
    Cancelled,
}

/// Read side of the status-update collection.
///
/// Implementations return every **distinct** `external_id` that has at least
/// one record with `propagated = false` and `propagation_attempts < ceiling`.
/// Ordering is unspecified and may differ between calls.
///
/// ## Contract
///
/// - Read-only: implementations must not mark records as propagated or count
///   attempts. Those writes are owned by the acknowledging side.
/// - Single atomic read at the store's default isolation level; no
///   transaction spans multiple calls.
/// - Must return [`QueryError::Cancelled`] promptly once `cancel` fires.
#[async_trait]
pub trait StatusQuery: Send + Sync {
    async fn unpropagated(
        &self,
        ceiling: RetryCeiling,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExternalId>, QueryError>;
}

#[async_trait]
impl<S> StatusQuery for Arc<S>
where
    S: StatusQuery + ?Sized,
{
    async fn unpropagated(
        &self,
        ceiling: RetryCeiling,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExternalId>, QueryError> {
        (**self).unpropagated(ceiling, cancel).await
    }
}
