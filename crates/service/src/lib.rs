//! Job status propagator service: CLI, diagnostics endpoint and process wiring.

pub mod app;
pub mod cli;
pub mod signal;
