//! # Installation Spec
//!
//! Main CRD specification for the `Installation` resource.

use crate::crd::names::ProductName;
use crate::crd::status::{InstallationStatus, ProductStatus};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Installation Custom Resource Definition
///
/// One `Installation` exists per cluster. Its status records every stage and
/// product the operator walks through.
///
/// # Example
///
/// ```yaml
/// apiVersion: integreatly.org/v1alpha1
/// kind: Installation
/// metadata:
///   name: integreatly
///   namespace: integreatly
/// spec:
///   type: workshop
///   namespacePrefix: integreatly-
///   selfSignedCerts: true
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Installation",
    group = "integreatly.org",
    version = "v1alpha1",
    namespaced,
    status = "InstallationStatus",
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Last Error", "type":"string", "jsonPath":".status.lastError"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InstallationSpec {
    /// Installation flavour
    pub r#type: InstallationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_subdomain: Option<String>,
    #[serde(default, rename = "masterURL", skip_serializing_if = "Option::is_none")]
    pub master_url: Option<String>,
    /// Prefix applied to every product namespace
    #[serde(default)]
    pub namespace_prefix: String,
    #[serde(default)]
    pub self_signed_certs: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_secret: Option<PullSecretSpec>,
    #[serde(default)]
    pub use_cluster_storage: bool,
    /// Name of a secret in the installation namespace holding SMTP
    /// connection details (host, port, tls, username, password)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_secret: Option<String>,
}

/// Installation flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InstallationType {
    #[default]
    Workshop,
    Managed,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
pub struct PullSecretSpec {
    pub name: String,
    pub namespace: String,
}

impl Installation {
    /// Find the status entry for `product` in whichever stage holds it
    #[must_use]
    pub fn product_status(&self, product: ProductName) -> Option<&ProductStatus> {
        self.status
            .as_ref()?
            .stages
            .values()
            .find_map(|stage| stage.products.get(&product))
    }
}
