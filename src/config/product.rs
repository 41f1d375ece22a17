//! # Product Configuration
//!
//! Per-product configuration read once when a product reconciler is built.
//!
//! Configuration lives in the `installation-config` ConfigMap in the operator
//! namespace. Each entry is keyed by product name and holds a small YAML
//! document:
//!
//! ```yaml
//! namespace: openshift
//! productVersion: master
//! operatorVersion: ""
//! host: ""
//! ```
//!
//! A missing ConfigMap or entry is not an error; defaults apply.

use crate::controller::store::{ResourceKey, ResourceKind, ResourceStore, StoreError};
use crate::crd::ProductName;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tracing::debug;

// RFC 1123 label: [a-z0-9]([-a-z0-9]*[a-z0-9])?
static NAMESPACE_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").ok());

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not retrieve {product} config: {source}")]
    Read {
        product: ProductName,
        #[source]
        source: StoreError,
    },
    #[error("could not parse {product} config: {message}")]
    Parse {
        product: ProductName,
        message: String,
    },
    #[error("{product} config is not valid: {field} {reason}")]
    Invalid {
        product: ProductName,
        field: &'static str,
        reason: String,
    },
}

/// Raw entry as stored in the installation-config ConfigMap
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductConfigEntry {
    pub namespace: String,
    pub product_version: String,
    pub operator_version: String,
    pub host: String,
}

/// Resolved configuration of one product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductConfig {
    pub product: ProductName,
    pub namespace: String,
    pub product_version: String,
    pub operator_version: String,
    pub host: String,
}

impl ProductConfig {
    /// Build from a raw entry, filling in the product's defaults
    #[must_use]
    pub fn from_entry(product: ProductName, entry: ProductConfigEntry) -> Self {
        let mut config = Self {
            product,
            namespace: entry.namespace,
            product_version: entry.product_version,
            operator_version: entry.operator_version,
            host: entry.host,
        };
        config.apply_defaults();
        config
    }

    fn apply_defaults(&mut self) {
        if self.namespace.trim().is_empty() {
            self.namespace = self.product.default_namespace();
        }
        if self.product_version.trim().is_empty() {
            if let Some(version) = self.product.default_product_version() {
                self.product_version = version.to_string();
            }
        }
        if self.operator_version.trim().is_empty() {
            if let Some(version) = self.product.default_operator_version() {
                self.operator_version = version.to_string();
            }
        }
    }

    /// Check the configuration against the generic product contract
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: String| ConfigError::Invalid {
            product: self.product,
            field,
            reason,
        };

        if self.namespace.len() > 63 {
            return Err(invalid(
                "namespace",
                format!(
                    "'{}' exceeds maximum length of 63 characters (got {})",
                    self.namespace,
                    self.namespace.len()
                ),
            ));
        }
        let valid_namespace = NAMESPACE_REGEX
            .as_ref()
            .is_some_and(|re| re.is_match(&self.namespace));
        if !valid_namespace {
            return Err(invalid(
                "namespace",
                format!(
                    "'{}' must be a valid Kubernetes namespace (lowercase alphanumeric, hyphens; cannot start/end with hyphen)",
                    self.namespace
                ),
            ));
        }

        // The product version is a URL path segment when fetching artifacts
        if self.product_version.trim().is_empty() {
            return Err(invalid("productVersion", "cannot be empty".to_string()));
        }
        if self.product_version.contains('/') || self.product_version.chars().any(char::is_whitespace) {
            return Err(invalid(
                "productVersion",
                format!(
                    "'{}' must not contain '/' or whitespace",
                    self.product_version
                ),
            ));
        }

        Ok(())
    }
}

/// Supplies per-product configuration
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Read, default, and validate the configuration for `product`
    async fn read(&self, product: ProductName) -> Result<ProductConfig, ConfigError>;
}

/// Reads configuration from the installation-config ConfigMap
pub struct ConfigMapConfigProvider {
    store: Arc<dyn ResourceStore>,
    key: ResourceKey,
}

impl std::fmt::Debug for ConfigMapConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigMapConfigProvider")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl ConfigMapConfigProvider {
    pub fn new(store: Arc<dyn ResourceStore>, name: &str, namespace: &str) -> Self {
        Self {
            store,
            key: ResourceKey::namespaced(ResourceKind::ConfigMap, name, namespace),
        }
    }
}

#[async_trait]
impl ConfigProvider for ConfigMapConfigProvider {
    async fn read(&self, product: ProductName) -> Result<ProductConfig, ConfigError> {
        let object = self
            .store
            .get(&self.key)
            .await
            .map_err(|source| ConfigError::Read { product, source })?;

        let raw = object
            .as_ref()
            .and_then(|cm| cm.data.get("data"))
            .and_then(|data| data.get(product.as_str()))
            .and_then(serde_json::Value::as_str);

        let entry = match raw {
            Some(raw) if !raw.trim().is_empty() => serde_yaml::from_str::<ProductConfigEntry>(raw)
                .map_err(|e| ConfigError::Parse {
                    product,
                    message: e.to_string(),
                })?,
            _ => {
                debug!("No {} entry in {}, using defaults", product, self.key);
                ProductConfigEntry::default()
            }
        };

        let config = ProductConfig::from_entry(product, entry);
        config.validate()?;
        Ok(config)
    }
}

/// Configuration held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    entries: HashMap<ProductName, ProductConfigEntry>,
}

impl StaticConfigProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entry(mut self, product: ProductName, entry: ProductConfigEntry) -> Self {
        self.entries.insert(product, entry);
        self
    }
}

#[async_trait]
impl ConfigProvider for StaticConfigProvider {
    async fn read(&self, product: ProductName) -> Result<ProductConfig, ConfigError> {
        let entry = self.entries.get(&product).cloned().unwrap_or_default();
        let config = ProductConfig::from_entry(product, entry);
        config.validate()?;
        Ok(config)
    }
}
