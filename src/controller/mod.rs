//! # Controller
//!
//! Core reconciliation modules for the installation operator.
//!
//! - `artifact`: external artifact download and the fetch-once cache
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `cancellation`: cooperative cancellation signal
//! - `coordination`: declares managed resources to the samples operator
//! - `orchestrator`: walks stages and rolls product phases up
//! - `products`: the product reconciler contract and implementations
//! - `store`: cluster resource store seam
//! - `sync`: manifest parsing and ownership-safe apply

pub mod artifact;
pub mod backoff;
pub mod cancellation;
pub mod coordination;
pub mod orchestrator;
pub mod products;
pub mod store;
pub mod sync;
