//! Installation Operator Library
//!
//! Staged reconciliation of independently versioned products onto a cluster.
//! Tests are included in the module files and under `tests/`.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod runtime;
pub mod server;
