//! # Stage Orchestrator
//!
//! Walks the installation's stages in declared order and runs every product
//! reconciler of each stage, sequentially.
//!
//! - A stage is `Completed` iff every product in it completed this pass;
//!   otherwise it takes the phase of its first non-completed product. Every
//!   product of the stage is still attempted.
//! - A stage that is not `Completed` ends the pass. Later stages are not
//!   attempted and the pass reports that stage's phase.
//! - A product error marks the product `Failed` and is recorded as the
//!   installation's `lastError`. A pass that completes every stage clears it.
//!
//! The orchestrator never retries. A non-terminal phase tells the caller to
//! schedule another pass.

use crate::config::{ConfigProvider, ControllerConfig};
use crate::controller::artifact::ArtifactSource;
use crate::controller::cancellation::CancellationSignal;
use crate::controller::products::{FuseOnOpenshiftFactory, ReconcilerFactory};
use crate::controller::store::ResourceStore;
use crate::crd::{Installation, Phase, StageName};
use crate::observability::metrics;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// One stage and the products reconciled in it, in order
pub struct StageDefinition {
    pub name: StageName,
    pub products: Vec<Arc<dyn ReconcilerFactory>>,
}

impl std::fmt::Debug for StageDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageDefinition")
            .field("name", &self.name)
            .field(
                "products",
                &self.products.iter().map(|p| p.product()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// `(phase, error)` result of one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    pub phase: Phase,
    pub error: Option<String>,
}

impl PassOutcome {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }
}

/// Production stage table
#[must_use]
pub fn default_stages(
    config: Arc<dyn ConfigProvider>,
    store: Arc<dyn ResourceStore>,
    source: Arc<dyn ArtifactSource>,
    controller: &ControllerConfig,
) -> Vec<StageDefinition> {
    let mut fuse =
        FuseOnOpenshiftFactory::new(config, store, source, controller.operator_namespace.clone());
    if let Some(base_url) = &controller.templates_base_url {
        fuse = fuse.with_base_url(base_url.clone());
    }

    vec![StageDefinition {
        name: StageName::Products,
        products: vec![Arc::new(fuse)],
    }]
}

#[derive(Debug)]
pub struct StageOrchestrator {
    stages: Vec<StageDefinition>,
}

impl StageOrchestrator {
    #[must_use]
    pub fn new(stages: Vec<StageDefinition>) -> Self {
        Self { stages }
    }

    #[must_use]
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    /// Run one pass over every stage, updating `installation.status` in place
    pub async fn reconcile(
        &self,
        installation: &mut Installation,
        cancel: &CancellationSignal,
    ) -> PassOutcome {
        let mut first_error: Option<String> = None;

        for stage in &self.stages {
            let span = info_span!("stage", stage = %stage.name);
            let stage_phase = match self
                .reconcile_stage(stage, installation, cancel, &mut first_error)
                .instrument(span)
                .await
            {
                Some(phase) => phase,
                None => {
                    info!("Pass cancelled during stage {}", stage.name);
                    return PassOutcome {
                        phase: Phase::InProgress,
                        error: first_error,
                    };
                }
            };

            installation
                .status
                .get_or_insert_with(Default::default)
                .stage_mut(stage.name)
                .phase = stage_phase;

            if stage_phase != Phase::Completed {
                debug!("Stage {} is {}, not starting later stages", stage.name, stage_phase);
                let status = installation.status.get_or_insert_with(Default::default);
                if let Some(error) = &first_error {
                    status.last_error.clone_from(error);
                }
                return PassOutcome {
                    phase: stage_phase,
                    error: first_error,
                };
            }
        }

        installation
            .status
            .get_or_insert_with(Default::default)
            .last_error
            .clear();
        PassOutcome {
            phase: Phase::Completed,
            error: None,
        }
    }

    /// Reconcile every product of `stage`; `None` when the pass was cancelled
    async fn reconcile_stage(
        &self,
        stage: &StageDefinition,
        installation: &mut Installation,
        cancel: &CancellationSignal,
        first_error: &mut Option<String>,
    ) -> Option<Phase> {
        let mut stage_phase = Phase::Completed;

        for factory in &stage.products {
            if cancel.is_cancelled() {
                return None;
            }

            let product = factory.product();
            let mut product_status = installation
                .status
                .get_or_insert_with(Default::default)
                .stage_mut(stage.name)
                .product_mut(product)
                .clone();

            let result = match factory.build(installation).await {
                Ok(reconciler) => {
                    reconciler
                        .reconcile(installation, &mut product_status, cancel)
                        .await
                }
                Err(e) => Err(e),
            };
            metrics::increment_product_reconciliations_total(product);

            let phase = match result {
                Ok(phase) => phase,
                Err(_) if cancel.is_cancelled() => return None,
                Err(e) => {
                    error!("Failed to reconcile {}: {}", product, e);
                    metrics::increment_product_reconciliation_errors_total(product);
                    first_error.get_or_insert_with(|| e.to_string());
                    Phase::Failed
                }
            };
            if phase != Phase::Completed && phase != Phase::Failed {
                warn!("{} is {}", product, phase);
            }

            product_status.status = phase;
            *installation
                .status
                .get_or_insert_with(Default::default)
                .stage_mut(stage.name)
                .product_mut(product) = product_status;

            if stage_phase == Phase::Completed && phase != Phase::Completed {
                stage_phase = phase;
            }
        }

        Some(stage_phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::controller::products::{ProductReconciler, ReconcilerError};
    use crate::crd::{InstallationSpec, ProductName, ProductStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reconciler that always reports the same phase or error
    struct Scripted {
        product: ProductName,
        outcome: Result<Phase, &'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(product: ProductName, outcome: Result<Phase, &'static str>) -> Arc<Self> {
            Arc::new(Self {
                product,
                outcome,
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    struct ScriptedRun {
        outcome: Result<Phase, &'static str>,
    }

    #[async_trait]
    impl ProductReconciler for ScriptedRun {
        fn product(&self) -> ProductName {
            ProductName::Rhsso
        }

        async fn reconcile(
            &self,
            _installation: &Installation,
            status: &mut ProductStatus,
            _cancel: &CancellationSignal,
        ) -> Result<Phase, ReconcilerError> {
            status.product_version = "1.0".to_string();
            self.outcome.map_err(|reason| {
                ReconcilerError::Config(ConfigError::Invalid {
                    product: ProductName::Rhsso,
                    field: "namespace",
                    reason: reason.to_string(),
                })
            })
        }
    }

    #[async_trait]
    impl ReconcilerFactory for Scripted {
        fn product(&self) -> ProductName {
            self.product
        }

        async fn build(
            &self,
            _installation: &Installation,
        ) -> Result<Box<dyn ProductReconciler>, ReconcilerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedRun {
                outcome: self.outcome,
            }))
        }
    }

    fn installation() -> Installation {
        Installation::new("integreatly", InstallationSpec::default())
    }

    fn stage(name: StageName, products: Vec<Arc<Scripted>>) -> StageDefinition {
        StageDefinition {
            name,
            products: products
                .into_iter()
                .map(|p| p as Arc<dyn ReconcilerFactory>)
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_stage_completes_when_every_product_completes() {
        let orchestrator = StageOrchestrator::new(vec![stage(
            StageName::Products,
            vec![
                Scripted::new(ProductName::FuseOnOpenshift, Ok(Phase::Completed)),
                Scripted::new(ProductName::Ups, Ok(Phase::Completed)),
            ],
        )]);
        let mut installation = installation();

        let outcome = orchestrator
            .reconcile(&mut installation, &CancellationSignal::new())
            .await;

        assert!(outcome.is_completed());
        let status = installation.status.unwrap();
        let stage = &status.stages[&StageName::Products];
        assert_eq!(stage.phase, Phase::Completed);
        assert_eq!(stage.products[&ProductName::Ups].product_version, "1.0");
    }

    #[tokio::test]
    async fn test_failed_product_sets_stage_phase_but_siblings_still_run() {
        let completed = Scripted::new(ProductName::Ups, Ok(Phase::Completed));
        let orchestrator = StageOrchestrator::new(vec![stage(
            StageName::Products,
            vec![
                Scripted::new(ProductName::FuseOnOpenshift, Err("boom")),
                completed.clone(),
            ],
        )]);
        let mut installation = installation();

        let outcome = orchestrator
            .reconcile(&mut installation, &CancellationSignal::new())
            .await;

        assert_eq!(outcome.phase, Phase::Failed);
        assert!(outcome.error.as_deref().unwrap().contains("boom"));
        assert_eq!(completed.calls.load(Ordering::SeqCst), 1);

        let status = installation.status.unwrap();
        let stage = &status.stages[&StageName::Products];
        assert_eq!(stage.phase, Phase::Failed);
        assert_eq!(stage.products[&ProductName::FuseOnOpenshift].status, Phase::Failed);
        assert_eq!(stage.products[&ProductName::Ups].status, Phase::Completed);
        assert!(status.last_error.contains("boom"));
    }

    #[tokio::test]
    async fn test_stage_takes_first_non_completed_phase() {
        let orchestrator = StageOrchestrator::new(vec![stage(
            StageName::Products,
            vec![
                Scripted::new(ProductName::Ups, Ok(Phase::Completed)),
                Scripted::new(ProductName::AmqOnline, Ok(Phase::AwaitingOperator)),
                Scripted::new(ProductName::FuseOnOpenshift, Err("boom")),
            ],
        )]);
        let mut installation = installation();

        let outcome = orchestrator
            .reconcile(&mut installation, &CancellationSignal::new())
            .await;
        assert_eq!(outcome.phase, Phase::AwaitingOperator);
    }

    #[tokio::test]
    async fn test_incomplete_stage_gates_later_stages() {
        let later = Scripted::new(ProductName::FuseOnOpenshift, Ok(Phase::Completed));
        let orchestrator = StageOrchestrator::new(vec![
            stage(
                StageName::Authentication,
                vec![Scripted::new(ProductName::Rhsso, Ok(Phase::InProgress))],
            ),
            stage(StageName::Products, vec![later.clone()]),
        ]);
        let mut installation = installation();

        let outcome = orchestrator
            .reconcile(&mut installation, &CancellationSignal::new())
            .await;

        assert_eq!(outcome.phase, Phase::InProgress);
        assert_eq!(later.calls.load(Ordering::SeqCst), 0);
        assert!(!installation
            .status
            .unwrap()
            .stages
            .contains_key(&StageName::Products));
    }

    #[tokio::test]
    async fn test_completed_pass_clears_last_error() {
        let orchestrator = StageOrchestrator::new(vec![stage(
            StageName::Products,
            vec![Scripted::new(ProductName::FuseOnOpenshift, Ok(Phase::Completed))],
        )]);
        let mut installation = installation();
        installation
            .status
            .get_or_insert_with(Default::default)
            .last_error = "failed to get file contents".to_string();

        orchestrator
            .reconcile(&mut installation, &CancellationSignal::new())
            .await;
        assert!(installation.status.unwrap().last_error.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_pass_leaves_status_untouched() {
        let product = Scripted::new(ProductName::FuseOnOpenshift, Ok(Phase::Completed));
        let orchestrator =
            StageOrchestrator::new(vec![stage(StageName::Products, vec![product.clone()])]);
        let mut installation = installation();
        let cancel = CancellationSignal::new();
        cancel.cancel("shutdown");

        let outcome = orchestrator.reconcile(&mut installation, &cancel).await;
        assert_eq!(outcome.phase, Phase::InProgress);
        assert_eq!(product.calls.load(Ordering::SeqCst), 0);
        assert!(installation.status.is_none());
    }
}
