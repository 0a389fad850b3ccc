use std::collections::HashMap;

use super::builtin;
use super::spec::{ModelId, ModelSpec};
use crate::{Error, Result};

/// Read-only after construction; concurrent lookups need no synchronization.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: HashMap<ModelId, ModelSpec>,
    builtin_ids: Vec<ModelId>,
}

/// An external entry the registry refused to merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRejection {
    pub id: ModelId,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// Id collides with a built-in descriptor. Built-ins always win.
    CollidesWithBuiltin,
    /// Id appears more than once in the external set.
    DuplicateExternal,
    /// Descriptor failed structural validation.
    Invalid(String),
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::CollidesWithBuiltin => {
                write!(f, "collides with a built-in model id")
            }
            RejectionReason::DuplicateExternal => write!(f, "duplicate external model id"),
            RejectionReason::Invalid(msg) => write!(f, "invalid descriptor: {msg}"),
        }
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry.builtin_ids = registry.models.keys().cloned().collect();
        registry
    }

    pub(crate) fn register(&mut self, spec: ModelSpec) {
        self.models.insert(spec.id.clone(), spec);
    }

    /// Merge externally configured descriptors after built-ins are committed.
    ///
    /// Entries colliding with built-in ids are rejected, not overwritten, and
    /// each rejection is logged. A malformed entry never aborts the merge.
    pub fn merge_external(
        &mut self,
        entries: impl IntoIterator<Item = ModelSpec>,
    ) -> Vec<RegistryRejection> {
        let mut rejections = Vec::new();
        for spec in entries {
            let reason = if self.builtin_ids.contains(&spec.id) {
                Some(RejectionReason::CollidesWithBuiltin)
            } else if self.models.contains_key(&spec.id) {
                Some(RejectionReason::DuplicateExternal)
            } else {
                spec.validate().err().map(RejectionReason::Invalid)
            };

            match reason {
                Some(reason) => {
                    tracing::warn!(model = %spec.id, %reason, "rejecting external model entry");
                    rejections.push(RegistryRejection {
                        id: spec.id,
                        reason,
                    });
                }
                None => {
                    tracing::debug!(model = %spec.id, "registered external model");
                    self.models.insert(spec.id.clone(), spec);
                }
            }
        }
        rejections
    }

    /// Case-sensitive O(1) lookup.
    pub fn lookup(&self, id: &str) -> Result<&ModelSpec> {
        self.models
            .get(id)
            .ok_or_else(|| Error::ModelNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
