//! # Custom Resource Definitions
//!
//! CRD types for the installation operator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `Installation` custom resource and its spec
//! - `status.rs` - Stage and product status tracked on the installation
//! - `names.rs` - Phase state machine values, stage and product names

mod names;
mod spec;
mod status;

pub use names::{Phase, ProductName, StageName};
pub use spec::{Installation, InstallationSpec, InstallationType, PullSecretSpec};
pub use status::{InstallationStatus, PreflightStatus, ProductStatus, StageStatus};
