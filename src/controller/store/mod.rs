//! # Resource Store
//!
//! The cluster resource store seam used by every synchronisation step.
//!
//! The core needs exactly four operations keyed by `{kind, name, namespace}`
//! (`get`, `create`, `delete`, `update`) plus label-filtered listing.
//! Objects travel as [`DynamicObject`]; their kind is always one of the
//! closed [`ResourceKind`] set so nothing untyped crosses the seam.
//!
//! - `cluster.rs` - store backed by the Kubernetes API
//! - `memory.rs` - in-process store that journals mutating calls

mod cluster;
mod memory;

pub use cluster::KubeResourceStore;
pub use memory::{InMemoryResourceStore, StoreCall};

use crate::constants::{OWNERSHIP_LABEL_KEY, OWNERSHIP_LABEL_VALUE};
use kube::api::{ApiResource, DynamicObject};
use kube::core::GroupVersionKind;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Kinds of cluster resources this operator reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    /// Core `ConfigMap`, used as the artifact cache record
    ConfigMap,
    /// OpenShift `ImageStream`
    ImageStream,
    /// OpenShift `Template`
    Template,
    /// Cluster samples operator `Config`
    SamplesConfig,
}

impl ResourceKind {
    #[must_use]
    pub fn gvk(&self) -> GroupVersionKind {
        match self {
            ResourceKind::ConfigMap => GroupVersionKind::gvk("", "v1", "ConfigMap"),
            ResourceKind::ImageStream => {
                GroupVersionKind::gvk("image.openshift.io", "v1", "ImageStream")
            }
            ResourceKind::Template => {
                GroupVersionKind::gvk("template.openshift.io", "v1", "Template")
            }
            ResourceKind::SamplesConfig => {
                GroupVersionKind::gvk("samples.operator.openshift.io", "v1", "Config")
            }
        }
    }

    #[must_use]
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMap => "configmaps",
            ResourceKind::ImageStream => "imagestreams",
            ResourceKind::Template => "templates",
            ResourceKind::SamplesConfig => "configs",
        }
    }

    #[must_use]
    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(&self.gvk(), self.plural())
    }

    #[must_use]
    pub fn is_namespaced(&self) -> bool {
        !matches!(self, ResourceKind::SamplesConfig)
    }

    /// Synchronisation tier
    ///
    /// Lower tiers are referenced by name from higher tiers and must be in
    /// place before any resource of a higher tier is attempted.
    #[must_use]
    pub fn sync_tier(&self) -> u8 {
        match self {
            ResourceKind::ConfigMap | ResourceKind::SamplesConfig => 0,
            ResourceKind::ImageStream => 1,
            ResourceKind::Template => 2,
        }
    }

    /// Resolve a manifest's `apiVersion`/`kind` pair
    ///
    /// A bare `v1` apiVersion is accepted for OpenShift kinds because older
    /// templates were published against the legacy ungrouped API.
    #[must_use]
    pub fn from_type_meta(api_version: &str, kind: &str) -> Option<Self> {
        let group = api_version
            .rsplit_once('/')
            .map_or("", |(group, _version)| group);
        match (group, kind) {
            ("", "ConfigMap") => Some(ResourceKind::ConfigMap),
            ("image.openshift.io" | "", "ImageStream") => Some(ResourceKind::ImageStream),
            ("template.openshift.io" | "", "Template") => Some(ResourceKind::Template),
            ("samples.operator.openshift.io", "Config") => Some(ResourceKind::SamplesConfig),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.gvk().kind)
    }
}

/// Identity of one cluster resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub name: String,
    /// `None` for cluster-scoped kinds
    pub namespace: Option<String>,
}

impl ResourceKey {
    pub fn namespaced(kind: ResourceKind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    pub fn cluster(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: None,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Store operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Get,
    Create,
    Delete,
    Update,
    List,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreOperation::Get => "get",
            StoreOperation::Create => "create",
            StoreOperation::Delete => "delete",
            StoreOperation::Update => "update",
            StoreOperation::List => "list",
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: ResourceKind, name: String },
    #[error("failed to {operation} {key}: {message}")]
    Backend {
        operation: StoreOperation,
        key: ResourceKey,
        message: String,
    },
}

/// Cluster resource store
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Read a resource; `Ok(None)` when it does not exist
    async fn get(&self, key: &ResourceKey) -> Result<Option<DynamicObject>, StoreError>;

    /// Create a resource; fails with `AlreadyExists` if the identity is taken
    async fn create(&self, key: &ResourceKey, object: &DynamicObject) -> Result<(), StoreError>;

    /// Delete a resource; deleting an absent resource succeeds
    async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError>;

    /// Replace an existing resource
    async fn update(&self, key: &ResourceKey, object: &DynamicObject) -> Result<(), StoreError>;

    /// List resources of `kind` carrying every label in `selector`
    async fn list_labelled(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: &[(&str, &str)],
    ) -> Result<Vec<DynamicObject>, StoreError>;
}

/// Whether the object carries this operator's ownership marker
#[must_use]
pub fn is_owned(object: &DynamicObject) -> bool {
    object
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(OWNERSHIP_LABEL_KEY))
        .is_some_and(|value| value == OWNERSHIP_LABEL_VALUE)
}

/// Convert a typed Kubernetes object into the store's object representation
pub fn to_dynamic<T: Serialize>(object: &T) -> Result<DynamicObject, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(object)?)
}

/// Convert a store object back into a typed Kubernetes object
pub fn from_dynamic<T: DeserializeOwned>(object: &DynamicObject) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(object)?)
}

/// Label selector matching every resource this operator manages
#[must_use]
pub fn ownership_selector() -> [(&'static str, &'static str); 1] {
    [(OWNERSHIP_LABEL_KEY, OWNERSHIP_LABEL_VALUE)]
}
