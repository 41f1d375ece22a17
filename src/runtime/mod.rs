//! # Runtime
//!
//! Glue between `kube_runtime::Controller` and the stage orchestrator.
//!
//! Each reconcile runs one orchestrator pass over a copy of the
//! `Installation`, writes the resulting status back with a merge patch, and
//! decides when the next pass runs:
//!
//! - `Completed`: resync after the long interval
//! - non-terminal phase: requeue after the short in-progress interval
//! - `Failed`: return an error so the error policy applies its backoff
//!
//! - `error_policy.rs` - per-installation Fibonacci backoff on errors

mod error_policy;

pub use error_policy::{error_policy, BackoffState};

use crate::config::ControllerConfig;
use crate::constants::FIELD_MANAGER;
use crate::controller::cancellation::CancellationSignal;
use crate::controller::orchestrator::StageOrchestrator;
use crate::crd::{Installation, InstallationStatus, Phase};
use crate::observability::metrics;
use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("installation {name} failed: {message}")]
    Pass { name: String, message: String },
    #[error("failed to write status of installation {name}: {source}")]
    Status {
        name: String,
        #[source]
        source: kube::Error,
    },
}

/// Persists installation status
#[async_trait]
pub trait StatusWriter: Send + Sync {
    async fn write(
        &self,
        installation: &Installation,
        status: &InstallationStatus,
    ) -> Result<(), kube::Error>;
}

/// Merge-patches the status subresource
#[derive(Clone)]
pub struct KubeStatusWriter {
    client: Client,
}

impl std::fmt::Debug for KubeStatusWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStatusWriter").finish_non_exhaustive()
    }
}

impl KubeStatusWriter {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusWriter for KubeStatusWriter {
    async fn write(
        &self,
        installation: &Installation,
        status: &InstallationStatus,
    ) -> Result<(), kube::Error> {
        let namespace = installation.namespace().unwrap_or_default();
        let api: Api<Installation> = Api::namespaced(self.client.clone(), &namespace);
        let patch = serde_json::json!({ "status": status });
        api.patch_status(
            &installation.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}

/// Shared state handed to every reconcile
pub struct Context {
    pub orchestrator: StageOrchestrator,
    pub status: Arc<dyn StatusWriter>,
    pub config: ControllerConfig,
    pub cancel: CancellationSignal,
    // Backoff state per installation (identified by namespace/name)
    pub(crate) backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("orchestrator", &self.orchestrator)
            .field("config", &self.config)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(
        orchestrator: StageOrchestrator,
        status: Arc<dyn StatusWriter>,
        config: ControllerConfig,
        cancel: CancellationSignal,
    ) -> Self {
        Self {
            orchestrator,
            status,
            config,
            cancel,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }
}

pub(crate) fn object_key(installation: &Installation) -> String {
    format!(
        "{}/{}",
        installation.namespace().unwrap_or_default(),
        installation.name_any()
    )
}

/// Run one pass for `installation`
pub async fn reconcile(
    installation: Arc<Installation>,
    ctx: Arc<Context>,
) -> Result<Action, RuntimeError> {
    let name = installation.name_any();
    let span = info_span!("reconcile", installation = %object_key(&installation));

    async move {
        let start = Instant::now();
        metrics::increment_reconciliations();

        let mut working = (*installation).clone();
        let outcome = ctx.orchestrator.reconcile(&mut working, &ctx.cancel).await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        if ctx.cancel.is_cancelled() {
            info!("Shutting down, status of {} left as is", name);
            return Ok(Action::await_change());
        }

        let status = working.status.clone().unwrap_or_default();
        if installation.status.as_ref() != Some(&status) {
            ctx.status
                .write(&installation, &status)
                .await
                .map_err(|source| RuntimeError::Status {
                    name: name.clone(),
                    source,
                })?;
            debug!("Status of {} updated", name);
        }

        match (outcome.phase, outcome.error) {
            (Phase::Completed, _) => {
                error_policy::reset_backoff(&ctx, &installation);
                info!("Installation {} completed", name);
                Ok(Action::requeue(ctx.config.completed_resync()))
            }
            (_, Some(message)) => Err(RuntimeError::Pass { name, message }),
            // A product may report Failed without an error of its own
            (phase, None) if phase.is_terminal() => Err(RuntimeError::Pass {
                name,
                message: format!("installation is {phase}"),
            }),
            (phase, None) => {
                error_policy::reset_backoff(&ctx, &installation);
                info!("Installation {} is {}, requeueing", name, phase);
                Ok(Action::requeue(ctx.config.in_progress_requeue()))
            }
        }
    }
    .instrument(span)
    .await
    .inspect_err(|e| warn!("{}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::orchestrator::StageDefinition;
    use crate::controller::products::{ProductReconciler, ReconcilerError, ReconcilerFactory};
    use crate::crd::{InstallationSpec, ProductName, ProductStatus, StageName};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingWriter {
        writes: AtomicUsize,
    }

    #[async_trait]
    impl StatusWriter for RecordingWriter {
        async fn write(
            &self,
            _installation: &Installation,
            _status: &InstallationStatus,
        ) -> Result<(), kube::Error> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixed(Phase);

    #[async_trait]
    impl ProductReconciler for Fixed {
        fn product(&self) -> ProductName {
            ProductName::FuseOnOpenshift
        }

        async fn reconcile(
            &self,
            _installation: &Installation,
            _status: &mut ProductStatus,
            _cancel: &CancellationSignal,
        ) -> Result<Phase, ReconcilerError> {
            Ok(self.0)
        }
    }

    #[async_trait]
    impl ReconcilerFactory for Fixed {
        fn product(&self) -> ProductName {
            ProductName::FuseOnOpenshift
        }

        async fn build(
            &self,
            _installation: &Installation,
        ) -> Result<Box<dyn ProductReconciler>, ReconcilerError> {
            Ok(Box::new(Fixed(self.0)))
        }
    }

    fn context(phase: Phase, writer: Arc<RecordingWriter>) -> Arc<Context> {
        let orchestrator = StageOrchestrator::new(vec![StageDefinition {
            name: StageName::Products,
            products: vec![Arc::new(Fixed(phase))],
        }]);
        Arc::new(Context::new(
            orchestrator,
            writer,
            ControllerConfig::default(),
            CancellationSignal::new(),
        ))
    }

    fn installation() -> Arc<Installation> {
        let mut installation = Installation::new("integreatly", InstallationSpec::default());
        installation.metadata.namespace = Some("integreatly".to_string());
        Arc::new(installation)
    }

    #[tokio::test]
    async fn test_completed_pass_resyncs_after_long_interval() {
        let writer = Arc::new(RecordingWriter::default());
        let ctx = context(Phase::Completed, writer.clone());

        let action = reconcile(installation(), ctx.clone()).await.unwrap();
        assert_eq!(action, Action::requeue(ctx.config.completed_resync()));
        assert_eq!(writer.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_in_progress_pass_requeues_quickly() {
        let writer = Arc::new(RecordingWriter::default());
        let ctx = context(Phase::InProgress, writer);

        let action = reconcile(installation(), ctx.clone()).await.unwrap();
        assert_eq!(action, Action::requeue(ctx.config.in_progress_requeue()));
    }

    #[tokio::test]
    async fn test_failed_phase_without_error_applies_backoff() {
        let writer = Arc::new(RecordingWriter::default());
        let ctx = context(Phase::Failed, writer.clone());

        let err = reconcile(installation(), ctx).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Pass { .. }));
        assert_eq!(writer.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_context_debug_omits_writer() {
        let ctx = context(Phase::Completed, Arc::new(RecordingWriter::default()));
        let rendered = format!("{ctx:?}");
        assert!(rendered.starts_with("Context {"), "{rendered}");
        assert!(rendered.contains("orchestrator"));
    }

    #[tokio::test]
    async fn test_cancelled_pass_writes_no_status() {
        let writer = Arc::new(RecordingWriter::default());
        let ctx = context(Phase::Completed, writer.clone());
        ctx.cancel.cancel("shutdown");

        let action = reconcile(installation(), ctx).await.unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(writer.writes.load(Ordering::SeqCst), 0);
    }
}
