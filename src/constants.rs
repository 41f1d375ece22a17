//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Namespace the operator runs in when `POD_NAMESPACE` is unset
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "integreatly";

/// ConfigMap holding per-product configuration
pub const DEFAULT_INSTALLATION_CONFIG_NAME: &str = "installation-config";

/// Requeue interval while any stage is still in progress (seconds)
pub const DEFAULT_IN_PROGRESS_REQUEUE_SECS: u64 = 10;

/// Resync interval once every stage has completed (seconds)
pub const DEFAULT_COMPLETED_RESYNC_SECS: u64 = 300;

/// Error backoff bounds (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Timeout for a single artifact download (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Label key marking resources this operator manages
pub const OWNERSHIP_LABEL_KEY: &str = "integreatly";

/// Label value marking resources this operator manages
pub const OWNERSHIP_LABEL_VALUE: &str = "true";

/// Annotations used as the owner back-reference when an owner reference
/// cannot cross namespaces
pub const OWNER_NAME_ANNOTATION: &str = "integreatly.org/installation-name";
pub const OWNER_NAMESPACE_ANNOTATION: &str = "integreatly.org/installation-namespace";

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "installation-operator";
