//! Candidate discovery (StatusQuery).
//!
//! This module defines the read-only boundary to the status-update store and
//! two implementations: Postgres for production and an in-memory store for
//! tests and local runs.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStatusStore;
pub use postgres::PostgresStatusQuery;
pub use r#trait::{QueryError, StatusQuery};
