//! # Controller Configuration
//!
//! Operator-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS, DEFAULT_COMPLETED_RESYNC_SECS,
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_INSTALLATION_CONFIG_NAME, DEFAULT_IN_PROGRESS_REQUEUE_SECS,
    DEFAULT_METRICS_PORT, DEFAULT_OPERATOR_NAMESPACE,
};
use std::time::Duration;

/// Operator-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace the operator is deployed in
    /// Holds the artifact cache and the installation-config ConfigMap
    pub operator_namespace: String,
    /// Name of the ConfigMap carrying per-product configuration
    pub installation_config_name: String,
    /// Base URL artifacts are downloaded from, overriding each product's default
    pub templates_base_url: Option<String>,
    /// Timeout for one artifact download (seconds)
    pub http_timeout_secs: u64,
    /// Requeue interval while the installation is not yet complete (seconds)
    pub in_progress_requeue_secs: u64,
    /// Resync interval after the installation completed (seconds)
    pub completed_resync_secs: u64,
    /// Fibonacci backoff bounds for failed reconciliations (seconds)
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    /// Port for the metrics and probe server
    pub metrics_port: u16,
    /// Log filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            installation_config_name: DEFAULT_INSTALLATION_CONFIG_NAME.to_string(),
            templates_base_url: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            in_progress_requeue_secs: DEFAULT_IN_PROGRESS_REQUEUE_SECS,
            completed_resync_secs: DEFAULT_COMPLETED_RESYNC_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_filter: "installation_operator=info".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            operator_namespace: env_var_or_default_str("POD_NAMESPACE", DEFAULT_OPERATOR_NAMESPACE),
            installation_config_name: env_var_or_default_str(
                "INSTALLATION_CONFIG_NAME",
                DEFAULT_INSTALLATION_CONFIG_NAME,
            ),
            templates_base_url: std::env::var("TEMPLATES_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            http_timeout_secs: env_var_or_default("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            in_progress_requeue_secs: env_var_or_default(
                "IN_PROGRESS_REQUEUE_SECS",
                DEFAULT_IN_PROGRESS_REQUEUE_SECS,
            ),
            completed_resync_secs: env_var_or_default(
                "COMPLETED_RESYNC_SECS",
                DEFAULT_COMPLETED_RESYNC_SECS,
            ),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            log_filter: env_var_or_default_str("LOG_FILTER", "installation_operator=info"),
        }
    }

    /// Get HTTP timeout duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Get in-progress requeue duration
    pub fn in_progress_requeue(&self) -> Duration {
        Duration::from_secs(self.in_progress_requeue_secs)
    }

    /// Get completed resync duration
    pub fn completed_resync(&self) -> Duration {
        Duration::from_secs(self.completed_resync_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
