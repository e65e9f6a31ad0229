//! Security classification levels for records and artifacts.

use serde::{Deserialize, Serialize};

/// Ordered security classification.
///
/// The ordering runs from least to most restricted; a consumer cleared for
/// a given level may receive artifacts at that level or below.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// Unrestricted.
    #[default]
    Public,
    /// Internal use.
    Internal,
    /// Confidential.
    Confidential,
    /// Most restricted.
    Restricted,
}

impl SecurityLevel {
    /// Returns true if a consumer with this clearance may receive data
    /// at `classification`.
    #[must_use]
    pub fn permits(self, classification: Self) -> bool {
        classification <= self
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Confidential => "confidential",
            Self::Restricted => "restricted",
        };
        write!(f, "{name}")
    }
}
