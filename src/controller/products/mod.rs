//! # Products
//!
//! The contract every product reconciler satisfies, and the reconcilers
//! themselves.
//!
//! A pass over one product runs, in order and short-circuiting on the first
//! failure:
//!
//! 1. Read and validate the product configuration (when the reconciler is built)
//! 2. Ensure the product's external artifacts are cached
//! 3. Synchronise every derived resource in dependency order
//! 4. Declare the synchronised resources to the samples registry
//!
//! Success stamps the resolved versions onto the product status and yields
//! [`Phase::Completed`]. Any failure yields an error, which the orchestrator
//! records as [`Phase::Failed`]. Nothing is persisted between the steps, so a
//! retried pass starts again from configuration.

mod fuse_on_openshift;

pub use fuse_on_openshift::{
    artifact_files, FuseOnOpenshiftFactory, FuseOnOpenshiftReconciler, CONSOLE_TEMPLATES, IMAGE_STREAM_FILE,
    QUICKSTART_PREFIX, QUICKSTART_TEMPLATES, TEMPLATES_BASE_URL, TEMPLATES_CONFIG_MAP_NAME,
};

use crate::config::ConfigError;
use crate::controller::artifact::CacheError;
use crate::controller::cancellation::CancellationSignal;
use crate::controller::coordination::CoordinationError;
use crate::controller::store::ResourceKey;
use crate::controller::sync::SyncError;
use crate::crd::{Installation, Phase, ProductName, ProductStatus};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to cache {product} artifacts: {source}")]
    Cache {
        product: ProductName,
        #[source]
        source: CacheError,
    },
    #[error("cache record {key} has no entry for {file}")]
    MissingArtifact { key: ResourceKey, file: String },
    #[error("failed to sync {product} resources: {source}")]
    Sync {
        product: ProductName,
        #[source]
        source: SyncError,
    },
    #[error("failed to declare {product} resources to the samples registry: {source}")]
    Coordination {
        product: ProductName,
        #[source]
        source: CoordinationError,
    },
    #[error("{product} reconcile cancelled: {reason}")]
    Cancelled { product: ProductName, reason: String },
}

/// Reconciles one product
#[async_trait]
pub trait ProductReconciler: Send + Sync {
    fn product(&self) -> ProductName;

    /// Run one pass, mutating only this product's status
    async fn reconcile(
        &self,
        installation: &Installation,
        status: &mut ProductStatus,
        cancel: &CancellationSignal,
    ) -> Result<Phase, ReconcilerError>;
}

/// Builds a product reconciler, reading its configuration once
///
/// Building happens at the start of every pass so configuration changes
/// take effect on the next pass.
#[async_trait]
pub trait ReconcilerFactory: Send + Sync {
    fn product(&self) -> ProductName;

    async fn build(
        &self,
        installation: &Installation,
    ) -> Result<Box<dyn ProductReconciler>, ReconcilerError>;
}
