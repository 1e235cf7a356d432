//! Entity query: kind, project and optional namespace

use anyhow::{Result, ensure};
use kindxml_core::EntityKey;

/// Which entities to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub kind: String,
    pub project: String,
    pub namespace: Option<String>,
}

impl Query {
    /// Build a query. `kind` must be non-empty; an empty namespace means the default one.
    pub fn new(
        kind: impl Into<String>,
        project: impl Into<String>,
        namespace: Option<String>,
    ) -> Result<Self> {
        let kind = kind.into();
        ensure!(!kind.is_empty(), "kind must not be empty");
        Ok(Self {
            kind,
            project: project.into(),
            namespace: namespace.filter(|ns| !ns.is_empty()),
        })
    }

    /// Whether an entity with this key belongs to the query.
    ///
    /// Keyless records (plain JSON input) always match. The project is only
    /// compared when the key carries one.
    pub fn matches(&self, key: Option<&EntityKey>) -> bool {
        let Some(key) = key else {
            return true;
        };
        if key.kind() != Some(self.kind.as_str()) {
            return false;
        }
        if key.namespace() != self.namespace.as_deref() {
            return false;
        }
        match key.project.as_deref() {
            Some(project) if !project.is_empty() => project == self.project,
            _ => true,
        }
    }
}
