//! # Installation Status
//!
//! Status types recording per-stage and per-product progress.

use crate::crd::names::{Phase, ProductName, StageName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Observed state of an `Installation`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallationStatus {
    /// Stage status keyed by stage name
    /// Map order is not the walk order; the orchestrator's stage table is
    #[serde(default)]
    pub stages: BTreeMap<StageName, StageStatus>,
    #[serde(default)]
    pub preflight_status: PreflightStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preflight_message: Option<String>,
    /// Most recent fatal reconciliation message
    #[serde(default)]
    pub last_error: String,
    #[serde(default, rename = "gitHubOAuthEnabled")]
    pub github_oauth_enabled: bool,
    #[serde(default, rename = "smtpEnabled")]
    pub smtp_enabled: bool,
}

impl InstallationStatus {
    /// Get the stage status, creating it zero-valued on first reference
    pub fn stage_mut(&mut self, stage: StageName) -> &mut StageStatus {
        self.stages
            .entry(stage)
            .or_insert_with(|| StageStatus::new(stage))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, schemars::JsonSchema)]
pub enum PreflightStatus {
    #[default]
    #[serde(rename = "")]
    InProgress,
    #[serde(rename = "successful")]
    Success,
    #[serde(rename = "failed")]
    Fail,
}

/// Roll-up of every product in one stage
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct StageStatus {
    pub name: StageName,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub products: BTreeMap<ProductName, ProductStatus>,
}

impl StageStatus {
    #[must_use]
    pub fn new(name: StageName) -> Self {
        Self {
            name,
            phase: Phase::None,
            products: BTreeMap::new(),
        }
    }

    /// Get the product status, creating it zero-valued on first reference
    pub fn product_mut(&mut self, product: ProductName) -> &mut ProductStatus {
        self.products
            .entry(product)
            .or_insert_with(|| ProductStatus::new(product))
    }
}

/// Progress and resolved versions of one product
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct ProductStatus {
    pub name: ProductName,
    /// Resolved operator version
    #[serde(default, rename = "operator", skip_serializing_if = "String::is_empty")]
    pub operator_version: String,
    /// Resolved product version
    #[serde(default, rename = "version")]
    pub product_version: String,
    #[serde(default)]
    pub host: String,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub product_type: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mobile: bool,
    #[serde(default)]
    pub status: Phase,
}

impl ProductStatus {
    #[must_use]
    pub fn new(name: ProductName) -> Self {
        Self {
            name,
            operator_version: String::new(),
            product_version: String::new(),
            host: String::new(),
            product_type: String::new(),
            mobile: false,
            status: Phase::None,
        }
    }
}
