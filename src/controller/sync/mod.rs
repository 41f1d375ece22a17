//! # Resource Sync
//!
//! Applies rendered manifests to the cluster with ownership-safe,
//! idempotent semantics.
//!
//! For each resource:
//!
//! 1. Read the live object by `{kind, name, namespace}`
//! 2. Absent: create it
//! 3. Present and carrying the ownership label: leave it untouched
//! 4. Present without the label: delete it and create it from the manifest
//!
//! Re-running a sync after a successful run performs no mutating calls.
//!
//! Resources are applied in tiers (see [`ResourceKind::sync_tier`]). Every
//! resource of a tier is attempted; if any of them fails to parse or apply,
//! later tiers are not started because they may reference the missing
//! resources by name.

mod manifest;

pub use manifest::{
    ManagedResource, Manifest, ManifestFormat, ManifestList, OwnerRef, ParseError, SyncTarget,
};

use crate::controller::cancellation::CancellationSignal;
use crate::controller::store::{is_owned, ResourceKey, ResourceKind, ResourceStore, StoreError};
use crate::observability::metrics;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The unowned object was deleted but the replacement could not be created
    #[error("failed to recreate {key} after reclaiming it: {source}")]
    Reclaim {
        key: ResourceKey,
        #[source]
        source: StoreError,
    },
    #[error("sync of {key} cancelled: {reason}")]
    Cancelled { key: ResourceKey, reason: String },
    #[error("{failed} of {total} resources failed to sync: {first}")]
    Batch {
        failed: usize,
        total: usize,
        first: Box<SyncError>,
    },
}

/// What applying one resource did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Unchanged,
    Reclaimed,
}

/// Result of a successful batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: Vec<ResourceKey>,
    pub reclaimed: Vec<ResourceKey>,
    pub unchanged: Vec<ResourceKey>,
}

impl SyncReport {
    fn record(&mut self, key: ResourceKey, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Created => self.created.push(key),
            SyncOutcome::Reclaimed => self.reclaimed.push(key),
            SyncOutcome::Unchanged => self.unchanged.push(key),
        }
    }

    /// Names of every synchronised resource of `kind`, sorted and deduplicated
    #[must_use]
    pub fn names(&self, kind: ResourceKind) -> Vec<String> {
        let mut keys: Vec<&ResourceKey> = self
            .created
            .iter()
            .chain(&self.reclaimed)
            .chain(&self.unchanged)
            .filter(|key| key.kind == kind)
            .collect();
        keys.sort();
        keys.dedup();
        keys.into_iter().map(|key| key.name.clone()).collect()
    }

    /// Number of mutating outcomes
    #[must_use]
    pub fn changed(&self) -> usize {
        self.created.len() + self.reclaimed.len()
    }
}

pub struct ResourceSyncEngine {
    store: Arc<dyn ResourceStore>,
}

impl std::fmt::Debug for ResourceSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSyncEngine").finish_non_exhaustive()
    }
}

impl ResourceSyncEngine {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Create the resource if absent, reclaim it if unowned, otherwise no-op
    pub async fn apply(&self, resource: &ManagedResource) -> Result<SyncOutcome, SyncError> {
        let key = &resource.key;
        let span = info_span!("sync.apply", resource = %key, source = %resource.source);

        async move {
            match self.store.get(key).await? {
                None => {
                    self.store.create(key, &resource.object).await?;
                    metrics::increment_resources_created_total(key.kind);
                    info!("Created {}", key);
                    Ok(SyncOutcome::Created)
                }
                Some(live) if is_owned(&live) => {
                    debug!("{} already owned, leaving untouched", key);
                    Ok(SyncOutcome::Unchanged)
                }
                Some(_) => {
                    warn!("{} exists without ownership label, reclaiming", key);
                    self.store.delete(key).await?;
                    self.store
                        .create(key, &resource.object)
                        .await
                        .map_err(|source| SyncError::Reclaim {
                            key: key.clone(),
                            source,
                        })?;
                    metrics::increment_resources_reclaimed_total(key.kind);
                    info!("Reclaimed {}", key);
                    Ok(SyncOutcome::Reclaimed)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Parse and apply every resource of a single manifest
    pub async fn apply_manifest(
        &self,
        manifest: &Manifest,
        target: &SyncTarget,
        cancel: &CancellationSignal,
    ) -> Result<SyncReport, SyncError> {
        self.apply_all(std::slice::from_ref(manifest), target, cancel)
            .await
    }

    /// Apply a batch of manifests in dependency order
    ///
    /// A resource that fails to parse counts as a failure of its kind's
    /// tier: siblings in that tier are still applied, later tiers are not.
    /// A failure whose kind could not be resolved counts against the lowest
    /// tier in the batch. Nothing is rolled back.
    pub async fn apply_all(
        &self,
        manifests: &[Manifest],
        target: &SyncTarget,
        cancel: &CancellationSignal,
    ) -> Result<SyncReport, SyncError> {
        let mut tiers: BTreeMap<u8, Tier> = BTreeMap::new();
        let mut unresolved: Vec<SyncError> = Vec::new();

        for manifest in manifests {
            for parsed in manifest.resources(target) {
                match parsed {
                    Ok(resource) => tiers
                        .entry(resource.key.kind.sync_tier())
                        .or_default()
                        .resources
                        .push(resource),
                    Err(e) => {
                        warn!("{}", e);
                        let kind = e.kind;
                        match kind {
                            Some(kind) => tiers
                                .entry(kind.sync_tier())
                                .or_default()
                                .failures
                                .push(e.into()),
                            None => unresolved.push(e.into()),
                        }
                    }
                }
            }
        }

        let total = unresolved.len()
            + tiers
                .values()
                .map(|tier| tier.resources.len() + tier.failures.len())
                .sum::<usize>();
        match tiers.values_mut().next() {
            Some(lowest) => lowest.failures.append(&mut unresolved),
            None if !unresolved.is_empty() => return Err(batch_error(unresolved, total)),
            None => {}
        }

        let mut errors: Vec<SyncError> = Vec::new();
        let mut report = SyncReport::default();

        for (number, tier) in tiers {
            let failures_before = errors.len();
            errors.extend(tier.failures);
            for resource in &tier.resources {
                if cancel.is_cancelled() {
                    errors.push(SyncError::Cancelled {
                        key: resource.key.clone(),
                        reason: cancel.reason().unwrap_or_default(),
                    });
                    return Err(batch_error(errors, total));
                }
                match self.apply(resource).await {
                    Ok(outcome) => report.record(resource.key.clone(), outcome),
                    Err(e) => {
                        warn!("Failed to sync {}: {}", resource.key, e);
                        errors.push(e);
                    }
                }
            }
            if errors.len() > failures_before {
                debug!("Tier {} had failures, not starting later tiers", number);
                break;
            }
        }

        if errors.is_empty() {
            Ok(report)
        } else {
            Err(batch_error(errors, total))
        }
    }
}

/// Resources of one sync tier and the parse failures attributed to it
#[derive(Default)]
struct Tier {
    resources: Vec<ManagedResource>,
    failures: Vec<SyncError>,
}

fn batch_error(mut errors: Vec<SyncError>, total: usize) -> SyncError {
    if errors.len() == 1 {
        return errors.remove(0);
    }
    let failed = errors.len();
    SyncError::Batch {
        failed,
        total,
        first: Box::new(errors.remove(0)),
    }
}
