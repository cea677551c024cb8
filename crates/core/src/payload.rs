//! Wire payload sent to the downstream notification endpoint.

use serde::{Deserialize, Serialize};

use crate::id::ExternalId;

/// Body of one delivery attempt: `{"uuid": "<external_id>"}`.
///
/// The receiver looks the job up by this id and reads the status history
/// itself, so nothing else is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub uuid: ExternalId,
}

impl NotificationPayload {
    pub fn new(uuid: ExternalId) -> Self {
        Self { uuid }
    }

    /// Encode the payload as a JSON byte vector.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl From<ExternalId> for NotificationPayload {
    fn from(value: ExternalId) -> Self {
        Self::new(value)
    }
}
