//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Stable identifier of a job whose status changed.
///
/// This is the store's `external_id` column, distinct from any internal row
/// key. In practice it is a job UUID rendered as text, but the engine treats
/// it as an opaque string and forwards it verbatim to the downstream service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalId(String);

impl ExternalId {
    /// Validate and wrap an identifier.
    ///
    /// Rejects empty values and values with leading/trailing whitespace.
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::invalid_id("ExternalId: empty"));
        }
        if value.trim() != value {
            return Err(DomainError::invalid_id(format!(
                "ExternalId: surrounding whitespace in {value:?}"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExternalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ExternalId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ExternalId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExternalId> for String {
    fn from(value: ExternalId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifier() {
        let id: ExternalId = "b7c1c0de-5f0e-4a4e-9d2b-2b7f2d6a9e10".parse().unwrap();
        assert_eq!(id.as_str(), "b7c1c0de-5f0e-4a4e-9d2b-2b7f2d6a9e10");
        assert_eq!(id.to_string(), id.as_str());
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            ExternalId::new(""),
            Err(DomainError::InvalidId(_))
        ));
    }

    #[test]
    fn rejects_surrounding_whitespace() {
        assert!(ExternalId::new(" job-a").is_err());
        assert!(ExternalId::new("job-a\n").is_err());
    }

    #[test]
    fn serde_is_transparent_and_validating() {
        let id = ExternalId::new("job-a").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"job-a\"");

        let back: ExternalId = serde_json::from_str("\"job-a\"").unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<ExternalId>("\"\"").is_err());
    }
}
