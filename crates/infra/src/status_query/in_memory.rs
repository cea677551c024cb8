use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use propagator_core::{ExternalId, RetryCeiling, StatusRecord};

use super::r#trait::{QueryError, StatusQuery};

/// In-memory status-update store.
///
/// Intended for tests/dev. Like the real table it may hold several records
/// per job (one per status change), which is why the query de-duplicates.
///
/// Besides the read-only [`StatusQuery`] view it exposes the writes that the
/// acknowledging side performs in production (`mark_propagated`,
/// `record_attempt`), so tests can play that role explicitly.
#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    records: RwLock<Vec<StatusRecord>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn with_records(records: impl IntoIterator<Item = StatusRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().collect()),
        }
    }

    pub fn insert(&self, record: StatusRecord) {
        self.write().push(record);
    }

    /// Snapshot of every stored record, in insertion order.
    pub fn records(&self) -> Vec<StatusRecord> {
        self.read().clone()
    }

    /// Acknowledge every record of `id`. Returns how many records changed.
    pub fn mark_propagated(&self, id: &ExternalId) -> usize {
        let mut records = self.write();
        let mut changed = 0;
        for record in records.iter_mut().filter(|r| r.external_id == *id && !r.propagated) {
            record.propagated = true;
            changed += 1;
        }
        changed
    }

    /// Count one delivery attempt against every unpropagated record of `id`.
    pub fn record_attempt(&self, id: &ExternalId) -> usize {
        let mut records = self.write();
        let mut changed = 0;
        for record in records.iter_mut().filter(|r| r.external_id == *id && !r.propagated) {
            record.propagation_attempts = record.propagation_attempts.saturating_add(1);
            changed += 1;
        }
        changed
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<StatusRecord>> {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<StatusRecord>> {
        self.records.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StatusQuery for InMemoryStatusStore {
    async fn unpropagated(
        &self,
        ceiling: RetryCeiling,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExternalId>, QueryError> {
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        let records = self.read();
        let mut seen = HashSet::new();
        let candidates = records
            .iter()
            .filter(|r| r.is_eligible(ceiling))
            .filter(|r| seen.insert(r.external_id.clone()))
            .map(|r| r.external_id.clone())
            .collect();

        Ok(candidates)
    }
}
