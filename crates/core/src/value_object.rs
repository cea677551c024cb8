//! Value objects: equality by value, not identity.
//!
//! The propagation limits are modelled as value objects so that an invalid
//! limit (zero batch size, zero retry ceiling) cannot be constructed, and every
//! consumer downstream can rely on the positivity invariant without rechecking.

use core::num::{NonZeroU32, NonZeroUsize};

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. Two
/// `BatchSize(1000)` values are interchangeable; there is no identity.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Upper bound (exclusive) on recorded delivery attempts.
///
/// A status record is a candidate only while
/// `propagation_attempts < ceiling`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RetryCeiling(NonZeroU32);

impl RetryCeiling {
    pub const DEFAULT: u32 = 3;

    pub fn new(value: u32) -> DomainResult<Self> {
        NonZeroU32::new(value)
            .map(Self)
            .ok_or_else(|| DomainError::validation("retry ceiling must be positive"))
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }

    /// Whether a record with `attempts` recorded attempts may still be delivered.
    pub fn admits(&self, attempts: u32) -> bool {
        attempts < self.get()
    }
}

impl Default for RetryCeiling {
    fn default() -> Self {
        Self(NonZeroU32::new(Self::DEFAULT).unwrap_or(NonZeroU32::MIN))
    }
}

impl TryFrom<u32> for RetryCeiling {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RetryCeiling> for u32 {
    fn from(value: RetryCeiling) -> Self {
        value.get()
    }
}

impl core::fmt::Display for RetryCeiling {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl ValueObject for RetryCeiling {}

/// Maximum number of candidates dispatched concurrently in one batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct BatchSize(NonZeroUsize);

impl BatchSize {
    pub const DEFAULT: usize = 1000;

    pub fn new(value: usize) -> DomainResult<Self> {
        NonZeroUsize::new(value)
            .map(Self)
            .ok_or_else(|| DomainError::validation("batch size must be positive"))
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self(NonZeroUsize::new(Self::DEFAULT).unwrap_or(NonZeroUsize::MIN))
    }
}

impl TryFrom<usize> for BatchSize {
    type Error = DomainError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BatchSize> for usize {
    fn from(value: BatchSize) -> Self {
        value.get()
    }
}

impl core::fmt::Display for BatchSize {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl ValueObject for BatchSize {}
