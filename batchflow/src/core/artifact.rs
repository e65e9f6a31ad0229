//! Artifact types for the output-delivery pipeline.

use super::security::SecurityLevel;
use serde::{Deserialize, Serialize};

/// A named output registered by one handler, potentially consumed by another.
///
/// Immutable once registered into the artifact store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Store-wide identifier, scoped as `handler/descriptor-id`.
    pub id: String,

    /// Optional global alias, resolvable via `@alias` requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// The artifact's type tag (e.g. "csv", "zip", "report").
    #[serde(rename = "type")]
    pub kind: String,

    /// Reference to the artifact payload (a path, URL, or inline value).
    pub locator: serde_json::Value,

    /// The artifact's security classification.
    #[serde(default)]
    pub security: SecurityLevel,

    /// The handler that produced it.
    pub produced_by: String,

    /// When the artifact was registered (RFC3339).
    pub registered_at: String,
}

/// A handler's declaration of one artifact it produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Handler-scoped identifier.
    pub id: String,

    /// Optional global alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// The artifact's type tag.
    #[serde(rename = "type")]
    pub kind: String,

    /// Reference to the artifact payload.
    #[serde(default)]
    pub locator: serde_json::Value,

    /// The artifact's security classification.
    #[serde(default)]
    pub security: SecurityLevel,
}

impl ArtifactDescriptor {
    /// Creates a new descriptor.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            alias: None,
            kind: kind.into(),
            locator: serde_json::Value::Null,
            security: SecurityLevel::default(),
        }
    }

    /// Sets the global alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Sets the payload locator.
    #[must_use]
    pub fn with_locator(mut self, locator: serde_json::Value) -> Self {
        self.locator = locator;
        self
    }

    /// Sets the security classification.
    #[must_use]
    pub fn with_security(mut self, security: SecurityLevel) -> Self {
        self.security = security;
        self
    }

    /// Turns the declaration into a registered artifact.
    #[must_use]
    pub fn into_artifact(self, produced_by: &str) -> Artifact {
        Artifact {
            id: format!("{}/{}", produced_by, self.id),
            alias: self.alias,
            kind: self.kind,
            locator: self.locator,
            security: self.security,
            produced_by: produced_by.to_string(),
            registered_at: crate::utils::iso_timestamp(),
        }
    }
}

/// A consumption token resolved against the artifact store.
///
/// Token grammar: `@name` resolves by exact alias, `type:name` returns all
/// artifacts of that type, and a bare `name` is treated as an alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactRequest {
    /// Exact alias lookup; resolves to a single artifact.
    Alias(String),
    /// Type lookup; resolves to every artifact of that type.
    Type(String),
}

impl ArtifactRequest {
    /// Parses a consumption token.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        if let Some(alias) = token.strip_prefix('@') {
            Self::Alias(alias.to_string())
        } else if let Some(kind) = token.strip_prefix("type:") {
            Self::Type(kind.to_string())
        } else {
            Self::Alias(token.to_string())
        }
    }

    /// Renders the request back into token form.
    #[must_use]
    pub fn token(&self) -> String {
        match self {
            Self::Alias(alias) => format!("@{alias}"),
            Self::Type(kind) => format!("type:{kind}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alias() {
        assert_eq!(
            ArtifactRequest::parse("@results_csv"),
            ArtifactRequest::Alias("results_csv".to_string())
        );
    }

    #[test]
    fn test_parse_type() {
        assert_eq!(
            ArtifactRequest::parse("type:csv"),
            ArtifactRequest::Type("csv".to_string())
        );
    }

    #[test]
    fn test_parse_bare_name_is_alias() {
        assert_eq!(
            ArtifactRequest::parse("results_csv"),
            ArtifactRequest::Alias("results_csv".to_string())
        );
    }

    #[test]
    fn test_descriptor_into_artifact() {
        let artifact = ArtifactDescriptor::new("out", "csv")
            .with_alias("results_csv")
            .with_locator(serde_json::json!("out/results.csv"))
            .with_security(SecurityLevel::Internal)
            .into_artifact("csv_writer");

        assert_eq!(artifact.id, "csv_writer/out");
        assert_eq!(artifact.alias.as_deref(), Some("results_csv"));
        assert_eq!(artifact.kind, "csv");
        assert_eq!(artifact.security, SecurityLevel::Internal);
        assert_eq!(artifact.produced_by, "csv_writer");
    }

    #[test]
    fn test_artifact_serde_type_rename() {
        let artifact = ArtifactDescriptor::new("out", "csv").into_artifact("w");
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json.get("type"), Some(&serde_json::json!("csv")));
    }
}
