//! `propagator-core`: domain building blocks for job status propagation.
//!
//! This crate contains **pure domain** primitives (no IO, no async). Store
//! access, HTTP delivery and the poll loop live in `propagator-infra`.

pub mod batch;
pub mod error;
pub mod id;
pub mod payload;
pub mod status;
pub mod value_object;

pub use batch::partition;
pub use error::{DomainError, DomainResult};
pub use id::ExternalId;
pub use payload::NotificationPayload;
pub use status::StatusRecord;
pub use value_object::{BatchSize, RetryCeiling, ValueObject};
