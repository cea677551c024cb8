//! Propagation worker: the poll loop that pushes job status changes downstream.
//!
//! One cycle is:
//!
//! ```text
//! StatusQuery (distinct unpropagated ids under the retry ceiling)
//!   ↓
//! partition into batches of at most `batch_size`
//!   ↓
//! for each batch: spawn one dispatch task per id, wait for all of them
//!   ↓
//! pause `poll_interval`, start over
//! ```
//!
//! The wait at the end of each batch is the only concurrency throttle and the
//! only ordering guarantee between batches. A failing candidate never stops
//! its siblings or the cycle; a failing candidate query stops the worker.
//!
//! ## Tracing vs. cancellation
//!
//! Every cycle gets its own span (child of the injected parent span) and its
//! own cancellation token (child of the shutdown token). Each dispatch task
//! gets a fresh child token, but its span parent is set explicitly to the
//! cycle span, so span ancestry does not depend on which task polls it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, info_span};

use propagator_core::{BatchSize, ExternalId, RetryCeiling, partition};

use super::stats::{StatsHandle, WorkerStats};
use crate::dispatch::{DispatchError, Dispatcher};
use crate::status_query::{QueryError, StatusQuery};

/// Propagation worker configuration.
#[derive(Debug, Clone)]
pub struct PropagationWorkerConfig {
    /// Candidates with this many recorded attempts are skipped
    pub retry_ceiling: RetryCeiling,
    /// Maximum concurrent dispatches
    pub batch_size: BatchSize,
    /// Pause between cycles; zero runs cycles back to back
    pub poll_interval: Duration,
    /// Name for logging
    pub name: String,
}

impl Default for PropagationWorkerConfig {
    fn default() -> Self {
        Self {
            retry_ceiling: RetryCeiling::default(),
            batch_size: BatchSize::default(),
            poll_interval: Duration::ZERO,
            name: "propagation-worker".to_string(),
        }
    }
}

impl PropagationWorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_retry_ceiling(mut self, ceiling: RetryCeiling) -> Self {
        self.retry_ceiling = ceiling;
        self
    }

    pub fn with_batch_size(mut self, size: BatchSize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// What happened in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub candidates: usize,
    /// Batches whose barrier was passed.
    pub batches: usize,
    pub delivered: Vec<ExternalId>,
    pub failed: Vec<ExternalId>,
    /// Dispatches aborted (or never started) because the cycle was cancelled.
    pub cancelled: usize,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("propagation worker task failed: {0}")]
    Join(String),
}

/// Handle to observe and stop a spawned worker.
#[derive(Debug)]
pub struct PropagationWorkerHandle {
    shutdown: CancellationToken,
    join: JoinHandle<Result<(), WorkerError>>,
    stats: StatsHandle,
}

impl PropagationWorkerHandle {
    /// Get current worker statistics.
    pub fn stats(&self) -> WorkerStats {
        self.stats.snapshot()
    }

    pub fn stats_handle(&self) -> StatsHandle {
        self.stats.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the worker to exit on its own (fatal query error).
    ///
    /// Must not be awaited again once it has returned.
    pub async fn join(&mut self) -> Result<(), WorkerError> {
        match (&mut self.join).await {
            Ok(result) => result,
            Err(e) => Err(WorkerError::Join(e.to_string())),
        }
    }

    /// Request shutdown, cancelling in-flight work, and wait for the worker.
    pub async fn shutdown(mut self) -> Result<(), WorkerError> {
        self.shutdown.cancel();
        self.join().await
    }
}

/// Drives propagation cycles against a status query and a dispatcher.
pub struct PropagationWorker<Q, D> {
    query: Q,
    dispatcher: Arc<D>,
    config: PropagationWorkerConfig,
    parent: Span,
    stats: StatsHandle,
}

impl<Q, D> PropagationWorker<Q, D>
where
    Q: StatusQuery + 'static,
    D: Dispatcher + 'static,
{
    pub fn new(query: Q, dispatcher: Arc<D>, config: PropagationWorkerConfig) -> Self {
        Self {
            query,
            dispatcher,
            config,
            parent: Span::none(),
            stats: StatsHandle::new(),
        }
    }

    /// Span under which every cycle span is opened.
    pub fn with_parent_span(mut self, parent: Span) -> Self {
        self.parent = parent;
        self
    }

    pub fn config(&self) -> &PropagationWorkerConfig {
        &self.config
    }

    pub fn stats_handle(&self) -> StatsHandle {
        self.stats.clone()
    }

    /// Run one full cycle: query, batch, dispatch every batch behind a barrier.
    ///
    /// Per-candidate failures end up in the report; only a failed candidate
    /// query is returned as an error.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, QueryError> {
        let mut cycle = 0;
        self.stats.update(|s| {
            s.cycles += 1;
            cycle = s.cycles;
        });

        let span = info_span!(
            parent: &self.parent,
            "propagation_cycle",
            worker = %self.config.name,
            cycle,
            candidates = tracing::field::Empty,
        );
        self.cycle(cancel, &span).instrument(span.clone()).await
    }

    async fn cycle(
        &self,
        cancel: &CancellationToken,
        span: &Span,
    ) -> Result<CycleReport, QueryError> {
        let candidates = self
            .query
            .unpropagated(self.config.retry_ceiling, cancel)
            .await?;

        let count = candidates.len();
        span.record("candidates", count);
        self.stats.update(|s| {
            s.candidates_seen += count as u64;
            s.last_cycle_candidates = count;
        });

        let mut report = CycleReport {
            candidates: count,
            ..CycleReport::default()
        };

        for batch in partition(candidates, self.config.batch_size) {
            if cancel.is_cancelled() {
                report.cancelled += batch.len();
                self.stats.update(|s| s.cancelled += batch.len() as u64);
                continue;
            }
            self.dispatch_batch(batch, cancel, span, &mut report).await;
            report.batches += 1;
        }

        self.stats.update(|s| s.last_cycle_finished_at = Some(Utc::now()));
        debug!(
            batches = report.batches,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "propagation cycle finished"
        );
        Ok(report)
    }

    /// Dispatch every member concurrently and return once all have finished.
    async fn dispatch_batch(
        &self,
        batch: Vec<ExternalId>,
        cancel: &CancellationToken,
        cycle_span: &Span,
        report: &mut CycleReport,
    ) {
        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::with_capacity(batch.len());

        for id in batch {
            let dispatcher = self.dispatcher.clone();
            let token = cancel.child_token();
            let span = info_span!(parent: cycle_span, "dispatch", external_id = %id);
            let task_id = id.clone();

            let handle = tasks.spawn(
                async move {
                    let outcome = dispatcher.dispatch(&task_id, &token).await;
                    (task_id, outcome)
                }
                .instrument(span),
            );
            spawned.insert(handle.id(), id);
        }

        let in_flight = spawned.len();
        self.stats.update(|s| s.current_in_flight = in_flight);

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(_))) => {
                    report.delivered.push(id);
                    self.stats.update(|s| s.delivered += 1);
                }
                Ok((_, Err(DispatchError::Cancelled))) => {
                    report.cancelled += 1;
                    self.stats.update(|s| s.cancelled += 1);
                }
                Ok((id, Err(err))) => {
                    debug!(external_id = %id, error = %err, "candidate left for a later cycle");
                    report.failed.push(id);
                    self.stats.update(|s| s.failed += 1);
                }
                Err(join_err) => {
                    let id = spawned.remove(&join_err.id());
                    error!(
                        external_id = id.as_ref().map(ExternalId::as_str).unwrap_or("unknown"),
                        error = %join_err,
                        "dispatch task panicked"
                    );
                    report.failed.extend(id);
                    self.stats.update(|s| s.failed += 1);
                }
            }
            self.stats
                .update(|s| s.current_in_flight = s.current_in_flight.saturating_sub(1));
        }
    }

    /// Run cycles until `shutdown` fires or the candidate query fails.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), WorkerError> {
        info!(
            parent: &self.parent,
            worker = %self.config.name,
            retries = %self.config.retry_ceiling,
            batch_size = %self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "propagation worker started"
        );
        self.stats.update(|s| s.started_at = Some(Utc::now()));

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let cycle_token = shutdown.child_token();
            let result = self.run_cycle(&cycle_token).await;
            cycle_token.cancel();

            match result {
                Ok(_) => {}
                Err(QueryError::Cancelled) if shutdown.is_cancelled() => break,
                Err(err) => {
                    error!(
                        parent: &self.parent,
                        worker = %self.config.name,
                        error = %err,
                        "candidate query failed, stopping propagation"
                    );
                    return Err(err.into());
                }
            }

            if self.config.poll_interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }

        info!(parent: &self.parent, worker = %self.config.name, "propagation worker stopped");
        Ok(())
    }

    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(self, shutdown: CancellationToken) -> PropagationWorkerHandle {
        let stats = self.stats.clone();
        let join = tokio::spawn(self.run(shutdown.clone()));

        PropagationWorkerHandle {
            shutdown,
            join,
            stats,
        }
    }
}
