//! Job status records as seen by the propagation engine.
//!
//! ## Ownership contract
//!
//! The engine **only reads** status records. It never sets `propagated` and
//! never increments `propagation_attempts`. Both mutations belong to whoever
//! acknowledges delivery (normally the downstream receiver, which calls back
//! into the store). If nobody records attempts, a permanently failing
//! candidate stays eligible and is re-dispatched on every cycle.

use serde::{Deserialize, Serialize};

use crate::id::ExternalId;
use crate::value_object::RetryCeiling;

/// One row of the status-update collection.
///
/// Invariants (maintained by the owner of the record, not by this crate):
/// - `propagated` transitions false → true at most once
/// - `propagation_attempts` never decreases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub external_id: ExternalId,
    pub propagated: bool,
    pub propagation_attempts: u32,
}

impl StatusRecord {
    /// A fresh, never-attempted record.
    pub fn pending(external_id: ExternalId) -> Self {
        Self {
            external_id,
            propagated: false,
            propagation_attempts: 0,
        }
    }

    /// Whether this record is a delivery candidate under `ceiling`.
    pub fn is_eligible(&self, ceiling: RetryCeiling) -> bool {
        !self.propagated && ceiling.admits(self.propagation_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(propagated: bool, attempts: u32) -> StatusRecord {
        StatusRecord {
            external_id: ExternalId::new("job-a").unwrap(),
            propagated,
            propagation_attempts: attempts,
        }
    }

    #[test]
    fn pending_record_is_eligible() {
        let r = StatusRecord::pending(ExternalId::new("job-a").unwrap());
        assert!(r.is_eligible(RetryCeiling::default()));
    }

    #[test]
    fn propagated_record_is_never_eligible() {
        assert!(!record(true, 0).is_eligible(RetryCeiling::new(10).unwrap()));
    }

    #[test]
    fn attempts_at_ceiling_are_excluded() {
        let ceiling = RetryCeiling::new(3).unwrap();
        assert!(record(false, 2).is_eligible(ceiling));
        assert!(!record(false, 3).is_eligible(ceiling));
    }
}
