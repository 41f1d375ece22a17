//! # Artifacts
//!
//! External artifact download and the fetch-once cache built on top of it.
//!
//! - `source.rs` - HTTP artifact source and URL template
//! - `cache.rs` - all-or-nothing cache persisted as a ConfigMap

mod cache;
mod source;

pub use cache::{cache_key, CacheError, CacheRecord, ExternalArtifactCache, FetchError};
pub use source::{ArtifactSource, FetchFailure, HttpArtifactSource, UrlTemplate};
