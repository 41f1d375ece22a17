//! Shared fixtures for installation pass tests
//!
//! Provides an in-process artifact source serving valid manifests, a
//! samples registry builder, and rustls setup for tests that talk HTTP.

#![allow(dead_code)]

use async_trait::async_trait;
use installation_operator::config::{ControllerConfig, StaticConfigProvider};
use installation_operator::controller::artifact::{ArtifactSource, FetchFailure};
use installation_operator::controller::coordination::SAMPLES_CONFIG_NAME;
use installation_operator::controller::orchestrator::{default_stages, StageOrchestrator};
use installation_operator::controller::products::IMAGE_STREAM_FILE;
use installation_operator::controller::store::{InMemoryResourceStore, ResourceKey, ResourceKind};
use installation_operator::crd::{Installation, InstallationSpec};
use kube::api::DynamicObject;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static RUSTLS_INIT: Once = Once::new();

/// Install the ring crypto provider once per test binary
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

pub const IMAGE_STREAMS: [&str; 2] = ["fis-java-openshift", "fis-karaf-openshift"];

/// Serves a manifest for every requested file, failing those marked with
/// [`FixtureSource::fail`]
#[derive(Default)]
pub struct FixtureSource {
    failing: Mutex<HashSet<String>>,
    fetches: AtomicUsize,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer HTTP 500 for any URL ending in `file`
    pub fn fail(&self, file: &str) {
        self.failing.lock().unwrap().insert(file.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactSource for FixtureSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchFailure> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().iter().any(|f| url.ends_with(f.as_str())) {
            return Err(FetchFailure::Status(500));
        }

        let file = url.rsplit('/').next().unwrap_or_default();
        let name = template_name(file);
        let body = if file == IMAGE_STREAM_FILE {
            let items: Vec<Value> = IMAGE_STREAMS
                .iter()
                .map(|name| json!({ "kind": "ImageStream", "apiVersion": "v1", "metadata": { "name": name } }))
                .collect();
            json!({ "kind": "List", "apiVersion": "v1", "items": items }).to_string()
        } else if file.ends_with(".yml") {
            format!("apiVersion: v1\nkind: Template\nmetadata:\n  name: {name}\nobjects: []\n")
        } else {
            json!({ "kind": "Template", "apiVersion": "v1", "metadata": { "name": name } }).to_string()
        };
        Ok(body.into_bytes())
    }
}

/// Template object name served for `file`
pub fn template_name(file: &str) -> &str {
    file.trim_end_matches(".json").trim_end_matches(".yml")
}

pub fn installation() -> Installation {
    let mut installation = Installation::new("integreatly", InstallationSpec::default());
    installation.metadata.namespace = Some("integreatly".to_string());
    installation.metadata.uid = Some("0b7e3f4c-6a7d-4e8e-9d0b-3c5d2f1a9e11".to_string());
    installation
}

pub fn orchestrator(store: Arc<InMemoryResourceStore>, source: Arc<FixtureSource>) -> StageOrchestrator {
    StageOrchestrator::new(default_stages(
        Arc::new(StaticConfigProvider::new()),
        store,
        source,
        &ControllerConfig::default(),
    ))
}

pub fn registry_key() -> ResourceKey {
    ResourceKey::cluster(ResourceKind::SamplesConfig, SAMPLES_CONFIG_NAME)
}

/// Samples operator configuration carrying `spec`
pub fn registry(spec: Value) -> DynamicObject {
    let mut object =
        DynamicObject::new(SAMPLES_CONFIG_NAME, &ResourceKind::SamplesConfig.api_resource());
    object.data = json!({ "spec": spec });
    object
}

pub fn template_key(name: &str) -> ResourceKey {
    ResourceKey::namespaced(ResourceKind::Template, name, "openshift")
}

pub fn image_stream_key(name: &str) -> ResourceKey {
    ResourceKey::namespaced(ResourceKind::ImageStream, name, "openshift")
}
