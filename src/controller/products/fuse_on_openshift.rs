//! Fuse on OpenShift: image streams and templates from the
//! `jboss-fuse/application-templates` repository, installed into the
//! `openshift` namespace and withheld from the cluster samples operator.

use super::{ProductReconciler, ReconcilerError, ReconcilerFactory};
use crate::config::{ConfigProvider, ProductConfig};
use crate::controller::artifact::{cache_key, ArtifactSource, ExternalArtifactCache, UrlTemplate};
use crate::controller::cancellation::CancellationSignal;
use crate::controller::coordination::{ConflictCoordinator, RegistryCategory};
use crate::controller::store::{ResourceKey, ResourceKind, ResourceStore};
use crate::controller::sync::{Manifest, OwnerRef, ResourceSyncEngine, SyncTarget};
use crate::crd::{Installation, Phase, ProductName, ProductStatus};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

pub const TEMPLATES_BASE_URL: &str = "https://raw.githubusercontent.com/jboss-fuse/application-templates/";
pub const TEMPLATES_CONFIG_MAP_NAME: &str = "fuse-on-openshift-templates";
pub const IMAGE_STREAM_FILE: &str = "fis-image-streams.json";
pub const QUICKSTART_PREFIX: &str = "quickstarts/";

pub const CONSOLE_TEMPLATES: [&str; 3] = [
    "fuse-console-cluster-os4.json",
    "fuse-console-namespace-os4.json",
    "fuse-apicurito.yml",
];

pub const QUICKSTART_TEMPLATES: [&str; 21] = [
    "eap-camel-amq-template.json",
    "eap-camel-cdi-template.json",
    "eap-camel-cxf-jaxrs-template.json",
    "eap-camel-cxf-jaxws-template.json",
    "eap-camel-jpa-template.json",
    "karaf-camel-amq-template.json",
    "karaf-camel-log-template.json",
    "karaf-camel-rest-sql-template.json",
    "karaf-cxf-rest-template.json",
    "spring-boot-camel-amq-template.json",
    "spring-boot-camel-config-template.json",
    "spring-boot-camel-drools-template.json",
    "spring-boot-camel-infinispan-template.json",
    "spring-boot-camel-rest-3scale-template.json",
    "spring-boot-camel-rest-sql-template.json",
    "spring-boot-camel-teiid-template.json",
    "spring-boot-camel-template.json",
    "spring-boot-camel-xa-template.json",
    "spring-boot-camel-xml-template.json",
    "spring-boot-cxf-jaxrs-template.json",
    "spring-boot-cxf-jaxws-template.json",
];

/// Every artifact file, as fetched (quickstarts keep their sub-path)
#[must_use]
pub fn artifact_files() -> Vec<String> {
    std::iter::once(IMAGE_STREAM_FILE.to_string())
        .chain(CONSOLE_TEMPLATES.iter().map(|f| (*f).to_string()))
        .chain(
            QUICKSTART_TEMPLATES
                .iter()
                .map(|f| format!("{QUICKSTART_PREFIX}{f}")),
        )
        .collect()
}

/// Builds [`FuseOnOpenshiftReconciler`]s sharing one set of collaborators
pub struct FuseOnOpenshiftFactory {
    config: Arc<dyn ConfigProvider>,
    store: Arc<dyn ResourceStore>,
    source: Arc<dyn ArtifactSource>,
    operator_namespace: String,
    templates: UrlTemplate,
}

impl std::fmt::Debug for FuseOnOpenshiftFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuseOnOpenshiftFactory")
            .field("operator_namespace", &self.operator_namespace)
            .field("templates", &self.templates)
            .finish_non_exhaustive()
    }
}

impl FuseOnOpenshiftFactory {
    pub fn new(
        config: Arc<dyn ConfigProvider>,
        store: Arc<dyn ResourceStore>,
        source: Arc<dyn ArtifactSource>,
        operator_namespace: impl Into<String>,
    ) -> Self {
        Self {
            config,
            store,
            source,
            operator_namespace: operator_namespace.into(),
            templates: UrlTemplate::new(TEMPLATES_BASE_URL),
        }
    }

    /// Download artifacts from `base_url` instead of the public repository
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.templates = UrlTemplate::new(base_url);
        self
    }
}

#[async_trait]
impl ReconcilerFactory for FuseOnOpenshiftFactory {
    fn product(&self) -> ProductName {
        ProductName::FuseOnOpenshift
    }

    async fn build(
        &self,
        _installation: &Installation,
    ) -> Result<Box<dyn ProductReconciler>, ReconcilerError> {
        let config = self.config.read(ProductName::FuseOnOpenshift).await?;
        Ok(Box::new(FuseOnOpenshiftReconciler {
            cache_key: ResourceKey::namespaced(
                ResourceKind::ConfigMap,
                TEMPLATES_CONFIG_MAP_NAME,
                self.operator_namespace.clone(),
            ),
            cache: ExternalArtifactCache::new(self.store.clone(), self.source.clone()),
            engine: ResourceSyncEngine::new(self.store.clone()),
            coordinator: ConflictCoordinator::new(self.store.clone()),
            templates: self.templates.clone(),
            config,
        }))
    }
}

#[derive(Debug)]
pub struct FuseOnOpenshiftReconciler {
    config: ProductConfig,
    cache_key: ResourceKey,
    cache: ExternalArtifactCache,
    engine: ResourceSyncEngine,
    coordinator: ConflictCoordinator,
    templates: UrlTemplate,
}

impl FuseOnOpenshiftReconciler {
    fn check_cancelled(&self, cancel: &CancellationSignal) -> Result<(), ReconcilerError> {
        if cancel.is_cancelled() {
            return Err(ReconcilerError::Cancelled {
                product: ProductName::FuseOnOpenshift,
                reason: cancel.reason().unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn run(
        &self,
        installation: &Installation,
        status: &mut ProductStatus,
        cancel: &CancellationSignal,
    ) -> Result<Phase, ReconcilerError> {
        let product = ProductName::FuseOnOpenshift;
        self.check_cancelled(cancel)?;

        let version = self.config.product_version.clone();
        let record = self
            .cache
            .ensure(
                &self.cache_key,
                &artifact_files(),
                |file| self.templates.render(&version, file),
                cancel,
            )
            .await
            .map_err(|source| ReconcilerError::Cache { product, source })?;

        let manifests = artifact_files()
            .iter()
            .map(|file| {
                let name = cache_key(file);
                record
                    .get(name)
                    .map(|bytes| Manifest::new(name, bytes))
                    .ok_or_else(|| ReconcilerError::MissingArtifact {
                        key: self.cache_key.clone(),
                        file: name.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let target = SyncTarget {
            namespace: self.config.namespace.clone(),
            owner: OwnerRef::from_installation(installation),
        };
        let report = self
            .engine
            .apply_all(&manifests, &target, cancel)
            .await
            .map_err(|source| ReconcilerError::Sync { product, source })?;

        for (category, kind) in [
            (RegistryCategory::ImageStreams, ResourceKind::ImageStream),
            (RegistryCategory::Templates, ResourceKind::Template),
        ] {
            let names = report.names(kind);
            if names.is_empty() {
                continue;
            }
            self.check_cancelled(cancel)?;
            self.coordinator
                .declare_managed(category, &names)
                .await
                .map_err(|source| ReconcilerError::Coordination { product, source })?;
        }

        status.product_version.clone_from(&self.config.product_version);
        status.operator_version.clone_from(&self.config.operator_version);
        if !self.config.host.is_empty() {
            status.host.clone_from(&self.config.host);
        }

        info!(
            "[{}] successfully reconciled ({} created, {} reclaimed, {} unchanged)",
            product,
            report.created.len(),
            report.reclaimed.len(),
            report.unchanged.len()
        );
        Ok(Phase::Completed)
    }
}

#[async_trait]
impl ProductReconciler for FuseOnOpenshiftReconciler {
    fn product(&self) -> ProductName {
        ProductName::FuseOnOpenshift
    }

    async fn reconcile(
        &self,
        installation: &Installation,
        status: &mut ProductStatus,
        cancel: &CancellationSignal,
    ) -> Result<Phase, ReconcilerError> {
        let span = info_span!(
            "product.reconcile",
            product = %ProductName::FuseOnOpenshift,
            namespace = %self.config.namespace,
            version = %self.config.product_version
        );
        self.run(installation, status, cancel).instrument(span).await
    }
}
