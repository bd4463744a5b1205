//! ID generation utilities.

use chrono::{DateTime, Utc};
use ulid::Ulid;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are:
    /// - Lexicographically sortable
    /// - Monotonically increasing within the same millisecond
    /// - Shorter than UUIDs when represented as strings
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a ULID whose timestamp component is `at`.
    ///
    /// Rows created through an injected clock keep ID order consistent with
    /// their `created_at` column.
    #[must_use]
    pub fn generate_at(&self, at: DateTime<Utc>) -> String {
        Ulid::from_datetime(at.into()).to_string().to_lowercase()
    }
}
