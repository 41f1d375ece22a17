//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `installation_reconciliations_total` - Total number of installation passes
//! - `installation_reconciliation_errors_total` - Passes that ended with an error
//! - `installation_reconciliation_duration_seconds` - Duration of installation passes
//! - `installation_product_reconciliations_total` - Product reconciles by product
//! - `installation_product_reconciliation_errors_total` - Failed product reconciles by product
//! - `installation_artifact_downloads_total` - Artifact downloads attempted
//! - `installation_artifact_download_errors_total` - Artifact downloads that failed
//! - `installation_artifact_download_duration_seconds` - Duration of artifact downloads
//! - `installation_artifact_cache_hits_total` - Artifact batches served from the cache record
//! - `installation_resources_created_total` - Resources created by kind
//! - `installation_resources_reclaimed_total` - Unowned resources deleted and recreated by kind
//! - `installation_registry_updates_total` - Updates to the samples operator registry

use crate::controller::store::ResourceKind;
use crate::crd::ProductName;
use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "installation_reconciliations_total",
        "Total number of installation reconciliation passes",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "installation_reconciliation_errors_total",
        "Total number of installation passes that ended with an error",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "installation_reconciliation_duration_seconds",
            "Duration of installation passes in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static PRODUCT_RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "installation_product_reconciliations_total",
            "Total number of product reconciles by product",
        ),
        &["product"],
    )
    .expect("Failed to create PRODUCT_RECONCILIATIONS_TOTAL metric - this should never happen")
});

static PRODUCT_RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "installation_product_reconciliation_errors_total",
            "Total number of failed product reconciles by product",
        ),
        &["product"],
    )
    .expect(
        "Failed to create PRODUCT_RECONCILIATION_ERRORS_TOTAL metric - this should never happen",
    )
});

static ARTIFACT_DOWNLOADS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "installation_artifact_downloads_total",
        "Total number of artifact downloads attempted",
    )
    .expect("Failed to create ARTIFACT_DOWNLOADS_TOTAL metric - this should never happen")
});

static ARTIFACT_DOWNLOAD_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "installation_artifact_download_errors_total",
        "Total number of artifact downloads that failed (non-200 status or transport error)",
    )
    .expect("Failed to create ARTIFACT_DOWNLOAD_ERRORS_TOTAL metric - this should never happen")
});

static ARTIFACT_DOWNLOAD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "installation_artifact_download_duration_seconds",
            "Duration of artifact downloads in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create ARTIFACT_DOWNLOAD_DURATION metric - this should never happen")
});

static ARTIFACT_CACHE_HITS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "installation_artifact_cache_hits_total",
        "Total number of artifact batches served from an existing cache record",
    )
    .expect("Failed to create ARTIFACT_CACHE_HITS_TOTAL metric - this should never happen")
});

static RESOURCES_CREATED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "installation_resources_created_total",
            "Total number of resources created by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RESOURCES_CREATED_TOTAL metric - this should never happen")
});

static RESOURCES_RECLAIMED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "installation_resources_reclaimed_total",
            "Total number of unowned resources deleted and recreated by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RESOURCES_RECLAIMED_TOTAL metric - this should never happen")
});

static REGISTRY_UPDATES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "installation_registry_updates_total",
        "Total number of updates to the samples operator registry",
    )
    .expect("Failed to create REGISTRY_UPDATES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(PRODUCT_RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PRODUCT_RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARTIFACT_DOWNLOADS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARTIFACT_DOWNLOAD_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARTIFACT_DOWNLOAD_DURATION.clone()))?;
    REGISTRY.register(Box::new(ARTIFACT_CACHE_HITS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RESOURCES_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RESOURCES_RECLAIMED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REGISTRY_UPDATES_TOTAL.clone()))?;

    Ok(())
}

/// Registry holding every operator metric, for the `/metrics` endpoint
#[must_use]
pub fn registry() -> &'static Registry {
    &REGISTRY
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_product_reconciliations_total(product: ProductName) {
    PRODUCT_RECONCILIATIONS_TOTAL
        .with_label_values(&[product.as_str()])
        .inc();
}

pub fn increment_product_reconciliation_errors_total(product: ProductName) {
    PRODUCT_RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[product.as_str()])
        .inc();
}

pub fn increment_artifact_downloads_total() {
    ARTIFACT_DOWNLOADS_TOTAL.inc();
}

pub fn increment_artifact_download_errors_total() {
    ARTIFACT_DOWNLOAD_ERRORS_TOTAL.inc();
}

pub fn observe_artifact_download_duration(duration: f64) {
    ARTIFACT_DOWNLOAD_DURATION.observe(duration);
}

pub fn increment_artifact_cache_hits_total() {
    ARTIFACT_CACHE_HITS_TOTAL.inc();
}

pub fn increment_resources_created_total(kind: ResourceKind) {
    RESOURCES_CREATED_TOTAL
        .with_label_values(&[kind.to_string().as_str()])
        .inc();
}

pub fn increment_resources_reclaimed_total(kind: ResourceKind) {
    RESOURCES_RECLAIMED_TOTAL
        .with_label_values(&[kind.to_string().as_str()])
        .inc();
}

pub fn increment_registry_updates_total() {
    REGISTRY_UPDATES_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        assert!(register_metrics().is_ok());
        let text = prometheus::TextEncoder::new()
            .encode_to_string(&REGISTRY.gather())
            .unwrap();
        assert!(text.contains("installation_artifact_cache_hits_total"));
    }

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL.get();
        increment_reconciliations();
        assert_eq!(RECONCILIATIONS_TOTAL.get(), before + 1u64);
    }

    #[test]
    fn test_product_counters_are_labelled() {
        let before = PRODUCT_RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["fuse-on-openshift"])
            .get();
        increment_product_reconciliation_errors_total(ProductName::FuseOnOpenshift);
        assert_eq!(
            PRODUCT_RECONCILIATION_ERRORS_TOTAL
                .with_label_values(&["fuse-on-openshift"])
                .get(),
            before + 1u64
        );
    }

    #[test]
    fn test_resource_counters_use_kind_label() {
        let before = RESOURCES_RECLAIMED_TOTAL.with_label_values(&["Template"]).get();
        increment_resources_reclaimed_total(ResourceKind::Template);
        assert_eq!(
            RESOURCES_RECLAIMED_TOTAL.with_label_values(&["Template"]).get(),
            before + 1u64
        );
    }

    #[test]
    fn test_observe_artifact_download_duration() {
        observe_artifact_download_duration(0.25);
    }
}
