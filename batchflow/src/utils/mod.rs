//! Utility helpers for UUIDs, timestamps and run identity.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a random v4 UUID.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Returns the current time as an RFC3339 timestamp.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Identity of one cycle run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

impl RunIdentity {
    /// Creates a fresh run identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: generate_uuid(),
            started_at: Utc::now(),
        }
    }
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_is_v4() {
        assert_eq!(generate_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn test_run_identity_unique() {
        assert_ne!(RunIdentity::new().run_id, RunIdentity::new().run_id);
    }
}
