//! # Installation Operator
//!
//! A Kubernetes operator that installs and upgrades a staged set of products
//! onto an OpenShift cluster.
//!
//! ## Overview
//!
//! For every `Installation` resource the operator:
//!
//! 1. **Walks stages in order** - each stage groups products that depend on earlier stages
//! 2. **Reconciles each product** - config, artifact cache, resource sync, registry declaration
//! 3. **Rolls up phases** - product phases into stage phases, stage phases into the installation
//! 4. **Requeues** - until every stage reports `completed`, then resyncs periodically
//!
//! ## Features
//!
//! - **Fetch-once artifacts**: downloaded manifests are cached in a ConfigMap, all or nothing
//! - **Ownership-safe sync**: unowned resources are reclaimed, owned ones never touched twice
//! - **Prometheus metrics**: exposed on `/metrics`
//! - **Health probes**: `/healthz` and `/readyz`

use anyhow::{Context as _, Result};
use futures::StreamExt;
use installation_operator::config::{ConfigMapConfigProvider, ControllerConfig};
use installation_operator::controller::artifact::HttpArtifactSource;
use installation_operator::controller::cancellation::CancellationSignal;
use installation_operator::controller::orchestrator::{default_stages, StageOrchestrator};
use installation_operator::controller::store::{KubeResourceStore, ResourceStore};
use installation_operator::crd::Installation;
use installation_operator::observability::metrics;
use installation_operator::runtime::{self, Context, KubeStatusWriter};
use installation_operator::server::{start_server, ServerState};
use kube::{Api, Client};
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Configure rustls crypto provider before any TLS connection is made
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = ControllerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .init();

    info!(
        "Starting installation operator (commit {}, built {})",
        env!("BUILD_GIT_HASH"),
        env!("BUILD_DATETIME")
    );

    metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_port = config.metrics_port;
    let server_state_clone = server_state.clone();
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let store: Arc<dyn ResourceStore> = Arc::new(KubeResourceStore::new(client.clone()));
    let provider = Arc::new(ConfigMapConfigProvider::new(
        store.clone(),
        &config.installation_config_name,
        &config.operator_namespace,
    ));
    let source = Arc::new(
        HttpArtifactSource::new(config.http_timeout())
            .context("Failed to build artifact HTTP client")?,
    );
    let orchestrator = StageOrchestrator::new(default_stages(provider, store, source, &config));
    for stage in orchestrator.stages() {
        info!(
            "Stage {}: {}",
            stage.name,
            stage
                .products
                .iter()
                .map(|product| product.product().as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let cancel = CancellationSignal::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel("received shutdown signal");
        }
    });

    let ctx = Arc::new(Context::new(
        orchestrator,
        Arc::new(KubeStatusWriter::new(client.clone())),
        config.clone(),
        cancel,
    ));

    let installations: Api<Installation> =
        Api::namespaced(client, &config.operator_namespace);

    server_state.mark_ready();
    info!(
        "Watching Installation resources in namespace {}",
        config.operator_namespace
    );

    Controller::new(installations, watcher::Config::default())
        .shutdown_on_signal()
        .run(runtime::reconcile, runtime::error_policy, ctx)
        .for_each(|result| {
            match result {
                Ok((object, action)) => debug!("Reconciled {:?}: {:?}", object, action),
                Err(e) => warn!("Controller error: {}", e),
            }
            std::future::ready(())
        })
        .await;

    info!("Operator stopped");
    Ok(())
}
