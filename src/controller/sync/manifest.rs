//! # Manifests
//!
//! Turns raw manifest bytes into [`ManagedResource`]s ready to apply.
//!
//! Human-authored YAML is converted to canonical JSON first. Documents of
//! kind `List` are decoded through the typed [`ManifestList`] schema and
//! yield one resource per item. Every resource is stamped with the target
//! namespace, the ownership label, and a back-reference to the owning
//! `Installation`.

use crate::constants::{
    OWNERSHIP_LABEL_KEY, OWNERSHIP_LABEL_VALUE, OWNER_NAMESPACE_ANNOTATION, OWNER_NAME_ANNOTATION,
};
use crate::controller::store::{ResourceKey, ResourceKind};
use crate::crd::Installation;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{DynamicObject, TypeMeta};
use kube::Resource;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load resource {file}: {reason}")]
pub struct ParseError {
    pub file: String,
    pub reason: String,
    /// Kind of the resource that failed, when the document got far enough
    /// to resolve it
    pub kind: Option<ResourceKind>,
}

impl ParseError {
    fn new(file: &str, reason: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            reason: reason.into(),
            kind: None,
        }
    }

    fn of_kind(mut self, kind: ResourceKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Serialisation a manifest was authored in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Yaml,
}

impl ManifestFormat {
    /// Infer from the file extension; anything but `.yml`/`.yaml` is JSON
    #[must_use]
    pub fn from_file(file: &str) -> Self {
        match Path::new(file).extension().and_then(|ext| ext.to_str()) {
            Some("yml" | "yaml") => ManifestFormat::Yaml,
            _ => ManifestFormat::Json,
        }
    }
}

/// Raw manifest content for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub file: String,
    pub format: ManifestFormat,
    pub bytes: Vec<u8>,
}

/// Typed schema for documents of kind `List`
#[derive(Debug, Deserialize)]
pub struct ManifestList {
    #[serde(default)]
    pub items: Vec<DynamicObject>,
}

/// Owner back-reference stamped onto every managed resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRef {
    pub name: String,
    pub namespace: String,
    pub uid: Option<String>,
}

impl OwnerRef {
    #[must_use]
    pub fn from_installation(installation: &Installation) -> Self {
        let meta = installation.meta();
        Self {
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone().unwrap_or_default(),
            uid: meta.uid.clone(),
        }
    }
}

/// Where and on whose behalf resources are synchronised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub namespace: String,
    pub owner: OwnerRef,
}

/// A resource rendered from a manifest, paired with its identity
#[derive(Debug, Clone)]
pub struct ManagedResource {
    pub key: ResourceKey,
    pub object: DynamicObject,
    /// Manifest file the resource came from
    pub source: String,
}

impl Manifest {
    pub fn new(file: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let file = file.into();
        Self {
            format: ManifestFormat::from_file(&file),
            file,
            bytes: bytes.into(),
        }
    }

    /// Canonical JSON form of the manifest
    pub fn canonical_json(&self) -> Result<serde_json::Value, ParseError> {
        let value: serde_json::Value = match self.format {
            ManifestFormat::Json => serde_json::from_slice(&self.bytes)
                .map_err(|e| ParseError::new(&self.file, format!("invalid JSON: {e}")))?,
            ManifestFormat::Yaml => serde_yaml::from_slice(&self.bytes).map_err(|e| {
                ParseError::new(&self.file, format!("failed to convert yaml to json: {e}"))
            })?,
        };
        if !value.is_object() {
            return Err(ParseError::new(&self.file, "manifest is not an object"));
        }
        Ok(value)
    }

    /// Render every resource described by this manifest
    ///
    /// A document-level failure yields a single error. For `List` documents
    /// each item succeeds or fails on its own.
    #[must_use]
    pub fn resources(&self, target: &SyncTarget) -> Vec<Result<ManagedResource, ParseError>> {
        let value = match self.canonical_json() {
            Ok(value) => value,
            Err(e) => return vec![Err(e)],
        };

        let is_list = value
            .get("kind")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|kind| kind == "List" || kind.ends_with("List"));

        if is_list {
            match serde_json::from_value::<ManifestList>(value) {
                Ok(list) => list
                    .items
                    .into_iter()
                    .map(|item| self.stamp(item, target))
                    .collect(),
                Err(e) => vec![Err(ParseError::new(
                    &self.file,
                    format!("invalid list document: {e}"),
                ))],
            }
        } else {
            vec![serde_json::from_value::<DynamicObject>(value)
                .map_err(|e| ParseError::new(&self.file, e.to_string()))
                .and_then(|object| self.stamp(object, target))]
        }
    }

    fn stamp(
        &self,
        mut object: DynamicObject,
        target: &SyncTarget,
    ) -> Result<ManagedResource, ParseError> {
        let types = object
            .types
            .as_ref()
            .ok_or_else(|| ParseError::new(&self.file, "missing apiVersion/kind"))?;
        let kind = ResourceKind::from_type_meta(&types.api_version, &types.kind).ok_or_else(|| {
            ParseError::new(
                &self.file,
                format!("unsupported kind {} ({})", types.kind, types.api_version),
            )
        })?;
        let name = object
            .metadata
            .name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ParseError::new(&self.file, "missing metadata.name").of_kind(kind))?;

        let ar = kind.api_resource();
        object.types = Some(TypeMeta {
            api_version: ar.api_version,
            kind: ar.kind,
        });

        // Server-populated fields would make the create call fail
        object.metadata.resource_version = None;
        object.metadata.uid = None;
        object.metadata.creation_timestamp = None;
        object.metadata.managed_fields = None;

        let namespace = kind.is_namespaced().then(|| target.namespace.clone());
        object.metadata.namespace.clone_from(&namespace);

        object
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(OWNERSHIP_LABEL_KEY.to_string(), OWNERSHIP_LABEL_VALUE.to_string());

        stamp_owner(&mut object, &target.owner, namespace.as_deref());

        Ok(ManagedResource {
            key: ResourceKey {
                kind,
                name,
                namespace,
            },
            object,
            source: self.file.clone(),
        })
    }
}

/// Owner references cannot cross namespaces; use annotations instead when
/// the installation lives elsewhere
fn stamp_owner(object: &mut DynamicObject, owner: &OwnerRef, namespace: Option<&str>) {
    match (&owner.uid, namespace) {
        (Some(uid), Some(ns)) if ns == owner.namespace => {
            let reference = OwnerReference {
                api_version: Installation::api_version(&()).to_string(),
                kind: Installation::kind(&()).to_string(),
                name: owner.name.clone(),
                uid: uid.clone(),
                ..Default::default()
            };
            let references = object
                .metadata
                .owner_references
                .get_or_insert_with(Vec::new);
            references.retain(|r| r.uid != reference.uid);
            references.push(reference);
        }
        _ => {
            let annotations = object
                .metadata
                .annotations
                .get_or_insert_with(Default::default);
            annotations.insert(OWNER_NAME_ANNOTATION.to_string(), owner.name.clone());
            annotations.insert(
                OWNER_NAMESPACE_ANNOTATION.to_string(),
                owner.namespace.clone(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(owner_namespace: &str) -> SyncTarget {
        SyncTarget {
            namespace: "openshift".to_string(),
            owner: OwnerRef {
                name: "integreatly".to_string(),
                namespace: owner_namespace.to_string(),
                uid: Some("1234".to_string()),
            },
        }
    }

    const IMAGE_STREAM_LIST: &str = r#"{
        "kind": "List",
        "apiVersion": "v1",
        "items": [
            {"kind": "ImageStream", "apiVersion": "v1", "metadata": {"name": "fis-java-openshift"}},
            {"kind": "ImageStream", "apiVersion": "v1", "metadata": {"name": "fis-karaf-openshift"}},
            {"kind": "ImageStream", "apiVersion": "v1", "metadata": {}}
        ]
    }"#;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ManifestFormat::from_file("fuse-apicurito.yml"), ManifestFormat::Yaml);
        assert_eq!(ManifestFormat::from_file("a.yaml"), ManifestFormat::Yaml);
        assert_eq!(ManifestFormat::from_file("fis-image-streams.json"), ManifestFormat::Json);
    }

    #[test]
    fn test_list_items_are_parsed_individually() {
        let manifest = Manifest::new("fis-image-streams.json", IMAGE_STREAM_LIST);
        let resources = manifest.resources(&target("integreatly"));
        assert_eq!(resources.len(), 3);

        let first = resources[0].as_ref().unwrap();
        assert_eq!(first.key.kind, ResourceKind::ImageStream);
        assert_eq!(first.key.name, "fis-java-openshift");
        assert_eq!(first.key.namespace.as_deref(), Some("openshift"));
        assert_eq!(
            first.object.types.as_ref().unwrap().api_version,
            "image.openshift.io/v1"
        );
        let err = resources[2].as_ref().unwrap_err();
        assert_eq!(err.kind, Some(ResourceKind::ImageStream));
    }

    #[test]
    fn test_yaml_is_converted_and_stamped() {
        let manifest = Manifest::new(
            "fuse-apicurito.yml",
            "apiVersion: template.openshift.io/v1\nkind: Template\nmetadata:\n  name: fuse-apicurito\n  namespace: elsewhere\n",
        );
        let resource = manifest
            .resources(&target("integreatly"))
            .pop()
            .unwrap()
            .unwrap();

        assert_eq!(resource.key.kind, ResourceKind::Template);
        assert_eq!(resource.object.metadata.namespace.as_deref(), Some("openshift"));
        let labels = resource.object.metadata.labels.as_ref().unwrap();
        assert_eq!(labels.get("integreatly").map(String::as_str), Some("true"));
        let annotations = resource.object.metadata.annotations.as_ref().unwrap();
        assert_eq!(
            annotations.get(OWNER_NAME_ANNOTATION).map(String::as_str),
            Some("integreatly")
        );
        assert!(resource.object.metadata.owner_references.is_none());
    }

    #[test]
    fn test_owner_reference_within_same_namespace() {
        let manifest = Manifest::new(
            "t.json",
            r#"{"kind":"Template","apiVersion":"v1","metadata":{"name":"t"}}"#,
        );
        let resource = manifest.resources(&target("openshift")).pop().unwrap().unwrap();
        let references = resource.object.metadata.owner_references.unwrap();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].kind, "Installation");
        assert_eq!(references[0].api_version, "integreatly.org/v1alpha1");
        assert_eq!(references[0].uid, "1234");
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        let manifest = Manifest::new("broken.yml", "kind: [Template");
        let result = manifest.resources(&target("integreatly"));
        let err = result[0].as_ref().unwrap_err();
        assert_eq!(err.file, "broken.yml");
        assert!(err.to_string().contains("failed to convert yaml to json"));
        assert_eq!(err.kind, None);
    }

    #[test]
    fn test_unsupported_kind_is_rejected() {
        let manifest = Manifest::new(
            "deployment.json",
            r#"{"kind":"Deployment","apiVersion":"apps/v1","metadata":{"name":"d"}}"#,
        );
        let result = manifest.resources(&target("integreatly"));
        assert!(result[0].as_ref().unwrap_err().reason.contains("unsupported kind"));
    }
}
