//! Background workers.

pub mod propagation_worker;
pub mod stats;

pub use propagation_worker::{
    CycleReport, PropagationWorker, PropagationWorkerConfig, PropagationWorkerHandle, WorkerError,
};
pub use stats::{StatsHandle, WorkerStats};
