//! Infrastructure layer: Postgres, downstream HTTP, config, workers.

/// Configuration loading and representation.
pub mod config;

/// Database connection pool setup.
pub mod db;

/// Delivery of one notification to the downstream endpoint.
pub mod dispatch;

/// Candidate selection from the job status table.
pub mod status_query;

/// Background workers.
pub mod workers;

#[cfg(test)]
mod test_support;
