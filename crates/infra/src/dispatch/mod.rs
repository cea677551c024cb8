//! Delivery of one candidate's notification (Dispatcher).
//!
//! A dispatch is a single attempt: build the payload, send it, classify the
//! response. Retrying is not the dispatcher's job; a failed candidate stays
//! eligible in the store and is picked up again by a later cycle.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use propagator_core::ExternalId;

pub use http::{HttpDispatcher, build_http_client};

/// Successful delivery.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub status: u16,
}

/// Why one candidate's dispatch failed.
///
/// Every variant is local to that candidate; none of them stops the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The payload could not be encoded.
    #[error("failed to encode payload: {0}")]
    Serialization(String),

    /// The request could not be sent or no response arrived.
    #[error("request failed: {0}")]
    Transport(String),

    /// A response arrived with a status outside 200..=299.
    #[error("downstream responded with status {status}")]
    Delivery { status: u16 },

    /// The cycle was cancelled while the request was in flight.
    #[error("dispatch cancelled")]
    Cancelled,
}

/// Success is exactly the 2xx range.
pub fn classify_status(status: u16) -> Result<Delivered, DispatchError> {
    if (200..=299).contains(&status) {
        Ok(Delivered { status })
    } else {
        Err(DispatchError::Delivery { status })
    }
}

/// Sends one notification per call.
///
/// Implementations must be safe to call concurrently from many tasks and must
/// not touch the status store.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(
        &self,
        id: &ExternalId,
        cancel: &CancellationToken,
    ) -> Result<Delivered, DispatchError>;
}

#[async_trait]
impl<D> Dispatcher for Arc<D>
where
    D: Dispatcher + ?Sized,
{
    async fn dispatch(
        &self,
        id: &ExternalId,
        cancel: &CancellationToken,
    ) -> Result<Delivered, DispatchError> {
        (**self).dispatch(id, cancel).await
    }
}
