//! # Conflict Coordination
//!
//! Declares resources this operator manages to the cluster samples operator
//! so it stops managing them too.
//!
//! The samples operator reads the cluster-scoped `Config` named `cluster`.
//! Names listed under `spec.skippedImagestreams` / `spec.skippedTemplates`
//! are left alone by it. Names are only ever appended, deduplicated, in
//! the order first declared. A cluster without the samples operator has no
//! such object, which is not an error.

use crate::controller::store::{ResourceKey, ResourceKind, ResourceStore, StoreError};
use crate::observability::metrics;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Name of the samples operator's cluster-wide configuration
pub const SAMPLES_CONFIG_NAME: &str = "cluster";

/// Partition of the shared registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryCategory {
    ImageStreams,
    Templates,
}

impl RegistryCategory {
    /// Field under `spec` holding the names of this category
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            RegistryCategory::ImageStreams => "skippedImagestreams",
            RegistryCategory::Templates => "skippedTemplates",
        }
    }

    /// Category a synchronised kind is declared under, if any
    #[must_use]
    pub fn for_kind(kind: ResourceKind) -> Option<Self> {
        match kind {
            ResourceKind::ImageStream => Some(RegistryCategory::ImageStreams),
            ResourceKind::Template => Some(RegistryCategory::Templates),
            ResourceKind::ConfigMap | ResourceKind::SamplesConfig => None,
        }
    }
}

impl fmt::Display for RegistryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegistryCategory::ImageStreams => "image-streams",
            RegistryCategory::Templates => "templates",
        })
    }
}

#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("failed to read samples registry {key}: {source}")]
    Read {
        key: ResourceKey,
        #[source]
        source: StoreError,
    },
    #[error("samples registry {key} has malformed spec.{field}: {reason}")]
    Malformed {
        key: ResourceKey,
        field: &'static str,
        reason: String,
    },
    #[error("failed to declare {category} in samples registry {key}: {source}")]
    Update {
        category: RegistryCategory,
        key: ResourceKey,
        #[source]
        source: StoreError,
    },
}

pub struct ConflictCoordinator {
    store: Arc<dyn ResourceStore>,
    key: ResourceKey,
}

impl fmt::Debug for ConflictCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConflictCoordinator")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl ConflictCoordinator {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            key: ResourceKey::cluster(ResourceKind::SamplesConfig, SAMPLES_CONFIG_NAME),
        }
    }

    /// Append `names` to `category`, skipping names already present
    ///
    /// Returns how many names were appended. Issues at most one update call,
    /// and none when every name is already declared or the registry object
    /// does not exist.
    pub async fn declare_managed(
        &self,
        category: RegistryCategory,
        names: &[String],
    ) -> Result<usize, CoordinationError> {
        let Some(mut registry) =
            self.store
                .get(&self.key)
                .await
                .map_err(|source| CoordinationError::Read {
                    key: self.key.clone(),
                    source,
                })?
        else {
            debug!("{} not found, samples operator absent", self.key);
            return Ok(0);
        };

        let field = category.field();
        let mut declared = self.declared(&registry.data, field)?;
        let before = declared.len();
        for name in names {
            if !declared.contains(name) {
                declared.push(name.clone());
            }
        }
        let appended = declared.len() - before;
        if appended == 0 {
            debug!("All {} already declared in {}", category, self.key);
            return Ok(0);
        }

        let spec = registry
            .data
            .as_object_mut()
            .map(|data| data.entry("spec").or_insert_with(|| Value::Object(Default::default())));
        match spec.and_then(Value::as_object_mut) {
            Some(spec) => {
                spec.insert(
                    field.to_string(),
                    Value::Array(declared.into_iter().map(Value::String).collect()),
                );
            }
            None => {
                return Err(CoordinationError::Malformed {
                    key: self.key.clone(),
                    field,
                    reason: "spec is not an object".to_string(),
                })
            }
        }

        self.store
            .update(&self.key, &registry)
            .await
            .map_err(|source| CoordinationError::Update {
                category,
                key: self.key.clone(),
                source,
            })?;
        metrics::increment_registry_updates_total();
        info!("Declared {} new {} in {}", appended, category, self.key);
        Ok(appended)
    }

    fn declared(&self, data: &Value, field: &'static str) -> Result<Vec<String>, CoordinationError> {
        let malformed = |reason: &str| CoordinationError::Malformed {
            key: self.key.clone(),
            field,
            reason: reason.to_string(),
        };
        match data.get("spec").and_then(|spec| spec.get(field)) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| malformed("expected a list of strings"))
                })
                .collect(),
            Some(_) => Err(malformed("expected a list")),
        }
    }
}
