//! Tracing and logging (shared setup).
//!
//! The subscriber is process-global by nature; everything else is passed
//! explicitly. Components receive a parent [`::tracing::Span`] (normally the one
//! returned by [`service_span`]) and open their own spans beneath it.

use thiserror::Error;

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::{LogConfig, LogFormat, init};

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("unknown log format: {0}")]
    UnknownFormat(String),

    #[error("invalid log filter: {0}")]
    Filter(String),
}

/// Root span for one service process.
///
/// Every log line emitted beneath it carries `service = <name>`.
pub fn service_span(name: &'static str) -> ::tracing::Span {
    ::tracing::info_span!("service", service = name)
}
