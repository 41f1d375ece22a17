//! # Names and Phases
//!
//! Closed enumerations shared by the installation status: the phase state
//! machine, the ordered installation stages, and the products the operator
//! knows how to install.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress state of an installation, stage, or product
///
/// `Completed` and `Failed` end a pass. Both may be left again on a later
/// pass when the reconciler is invoked once more.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, schemars::JsonSchema,
)]
pub enum Phase {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "accepted")]
    Accepted,
    #[serde(rename = "creating subscription")]
    CreatingSubscription,
    #[serde(rename = "awaiting operator")]
    AwaitingOperator,
    #[serde(rename = "creating components")]
    CreatingComponents,
    #[serde(rename = "awaiting components")]
    AwaitingComponents,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl Phase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::None => "",
            Phase::Accepted => "accepted",
            Phase::CreatingSubscription => "creating subscription",
            Phase::AwaitingOperator => "awaiting operator",
            Phase::CreatingComponents => "creating components",
            Phase::AwaitingComponents => "awaiting components",
            Phase::InProgress => "in progress",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        }
    }

    /// Whether this phase ends the current pass
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::None => f.write_str("none"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Ordered installation stages
///
/// Declaration order here is the order the orchestrator walks them in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum StageName {
    Bootstrap,
    CloudResources,
    Monitoring,
    Authentication,
    Products,
    SolutionExplorer,
}

impl StageName {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Bootstrap => "bootstrap",
            StageName::CloudResources => "cloud-resources",
            StageName::Monitoring => "monitoring",
            StageName::Authentication => "authentication",
            StageName::Products => "products",
            StageName::SolutionExplorer => "solution-explorer",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Products installed by the operator
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    schemars::JsonSchema,
)]
pub enum ProductName {
    #[serde(rename = "amqstreams")]
    AmqStreams,
    #[serde(rename = "amqonline")]
    AmqOnline,
    #[serde(rename = "solution-explorer")]
    SolutionExplorer,
    #[serde(rename = "rhsso")]
    Rhsso,
    #[serde(rename = "rhssouser")]
    RhssoUser,
    #[serde(rename = "codeready-workspaces")]
    CodeReadyWorkspaces,
    #[serde(rename = "fuse")]
    Fuse,
    #[serde(rename = "fuse-on-openshift")]
    FuseOnOpenshift,
    #[serde(rename = "3scale")]
    ThreeScale,
    #[serde(rename = "ups")]
    Ups,
    #[serde(rename = "monitoring")]
    Monitoring,
    #[serde(rename = "cloud-resources")]
    CloudResources,
}

impl ProductName {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductName::AmqStreams => "amqstreams",
            ProductName::AmqOnline => "amqonline",
            ProductName::SolutionExplorer => "solution-explorer",
            ProductName::Rhsso => "rhsso",
            ProductName::RhssoUser => "rhssouser",
            ProductName::CodeReadyWorkspaces => "codeready-workspaces",
            ProductName::Fuse => "fuse",
            ProductName::FuseOnOpenshift => "fuse-on-openshift",
            ProductName::ThreeScale => "3scale",
            ProductName::Ups => "ups",
            ProductName::Monitoring => "monitoring",
            ProductName::CloudResources => "cloud-resources",
        }
    }

    /// Product version installed when configuration does not pin one
    #[must_use]
    pub fn default_product_version(&self) -> Option<&'static str> {
        match self {
            ProductName::AmqOnline => Some("1.3.1"),
            ProductName::AmqStreams => Some("1.1.0"),
            ProductName::CodeReadyWorkspaces => Some("2.0.0.GA"),
            ProductName::FuseOnOpenshift => Some("master"),
            ProductName::Monitoring => Some("1.0.2"),
            ProductName::ThreeScale => Some("2.7"),
            ProductName::Ups => Some("2.3.2"),
            ProductName::CloudResources => Some("0.7.1"),
            ProductName::Fuse => Some("7.5"),
            ProductName::SolutionExplorer | ProductName::Rhsso | ProductName::RhssoUser => None,
        }
    }

    /// Operator version installed when configuration does not pin one
    #[must_use]
    pub fn default_operator_version(&self) -> Option<&'static str> {
        match self {
            ProductName::AmqStreams => Some("1.1.0"),
            ProductName::AmqOnline => Some("1.3.1"),
            ProductName::Monitoring => Some("1.0.2"),
            ProductName::SolutionExplorer => Some("0.0.44"),
            ProductName::Rhsso | ProductName::RhssoUser => Some("8.0.1"),
            ProductName::CodeReadyWorkspaces => Some("2.0.0"),
            ProductName::Fuse => Some("1.5.0"),
            ProductName::ThreeScale => Some("0.4.0"),
            ProductName::Ups => Some("0.4.1"),
            ProductName::CloudResources => Some("0.7.1"),
            ProductName::FuseOnOpenshift => None,
        }
    }

    /// Namespace used when configuration leaves it empty
    #[must_use]
    pub fn default_namespace(&self) -> String {
        match self {
            ProductName::FuseOnOpenshift => "openshift".to_string(),
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProductName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
