//! # Configuration
//!
//! - `controller.rs` - operator-level settings from environment variables
//! - `product.rs` - per-product configuration and the `ConfigProvider` seam

mod controller;
mod product;

pub use controller::ControllerConfig;
pub use product::{
    ConfigError, ConfigMapConfigProvider, ConfigProvider, ProductConfig, ProductConfigEntry,
    StaticConfigProvider,
};
