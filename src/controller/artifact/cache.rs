//! # Artifact Cache
//!
//! Fetches a batch of named artifacts once per installation lifetime and
//! persists them as one immutable ConfigMap.
//!
//! The batch is all-or-nothing: every file is downloaded into memory first
//! and the record is written with a single create call only after every
//! download succeeded. A record that exists is therefore complete, and a
//! failed batch leaves nothing behind, so the next pass refetches from empty.

use super::source::{ArtifactSource, FetchFailure};
use crate::constants::{OWNERSHIP_LABEL_KEY, OWNERSHIP_LABEL_VALUE};
use crate::controller::cancellation::CancellationSignal;
use crate::controller::store::{
    from_dynamic, to_dynamic, ResourceKey, ResourceStore, StoreError,
};
use crate::observability::metrics;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// A download that failed, naming the file and the URL it was fetched from
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to get file contents of {file} from {url}: {failure}")]
pub struct FetchError {
    pub file: String,
    pub url: String,
    pub failure: FetchFailure,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to get cache record {key}: {source}")]
    Lookup {
        key: ResourceKey,
        #[source]
        source: StoreError,
    },
    #[error("failed to create cache record {key}: {source}")]
    Create {
        key: ResourceKey,
        #[source]
        source: StoreError,
    },
    #[error("cache record {key} is malformed: {message}")]
    Decode { key: ResourceKey, message: String },
    #[error("artifact download cancelled before {file}: {reason}")]
    Cancelled { file: String, reason: String },
}

/// Cached artifact payloads keyed by file base name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub key: ResourceKey,
    entries: BTreeMap<String, Vec<u8>>,
}

impl CacheRecord {
    /// Payload stored for `file`; any sub-path in `file` is ignored
    #[must_use]
    pub fn get(&self, file: &str) -> Option<&[u8]> {
        self.entries.get(cache_key(file)).map(Vec::as_slice)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn to_config_map(&self) -> ConfigMap {
        let mut data = BTreeMap::new();
        let mut binary_data = BTreeMap::new();
        for (name, bytes) in &self.entries {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    data.insert(name.clone(), text.to_string());
                }
                Err(_) => {
                    binary_data.insert(name.clone(), ByteString(bytes.clone()));
                }
            }
        }

        ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.key.name.clone()),
                namespace: self.key.namespace.clone(),
                labels: Some(BTreeMap::from([(
                    OWNERSHIP_LABEL_KEY.to_string(),
                    OWNERSHIP_LABEL_VALUE.to_string(),
                )])),
                ..Default::default()
            },
            data: (!data.is_empty()).then_some(data),
            binary_data: (!binary_data.is_empty()).then_some(binary_data),
            ..Default::default()
        }
    }

    fn from_config_map(key: ResourceKey, cm: ConfigMap) -> Self {
        let mut entries: BTreeMap<String, Vec<u8>> = cm
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.into_bytes()))
            .collect();
        entries.extend(
            cm.binary_data
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, v.0)),
        );
        Self { key, entries }
    }
}

/// Key a file is stored under: its base name, dropping any grouping prefix
/// such as `quickstarts/`
#[must_use]
pub fn cache_key(file: &str) -> &str {
    file.rsplit('/').next().unwrap_or(file)
}

/// Fetch-once cache of external artifacts
pub struct ExternalArtifactCache {
    store: Arc<dyn ResourceStore>,
    source: Arc<dyn ArtifactSource>,
}

impl std::fmt::Debug for ExternalArtifactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalArtifactCache").finish_non_exhaustive()
    }
}

impl ExternalArtifactCache {
    pub fn new(store: Arc<dyn ResourceStore>, source: Arc<dyn ArtifactSource>) -> Self {
        Self { store, source }
    }

    /// Return the cache record under `key`, downloading `files` if it is absent
    ///
    /// `resolve` maps a file name to the URL it is downloaded from. A hit
    /// performs no network I/O and is never refreshed.
    pub async fn ensure<R>(
        &self,
        key: &ResourceKey,
        files: &[String],
        resolve: R,
        cancel: &CancellationSignal,
    ) -> Result<CacheRecord, CacheError>
    where
        R: Fn(&str) -> String + Send + Sync,
    {
        if let Some(record) = self.lookup(key).await? {
            debug!("Cache hit for {} ({} entries)", key, record.len());
            metrics::increment_artifact_cache_hits_total();
            return Ok(record);
        }

        info!("Cache miss for {}, downloading {} artifacts", key, files.len());
        let mut entries = BTreeMap::new();
        for file in files {
            if cancel.is_cancelled() {
                return Err(CacheError::Cancelled {
                    file: file.clone(),
                    reason: cancel.reason().unwrap_or_default(),
                });
            }

            let url = resolve(file);
            let bytes = self.source.fetch(&url).await.map_err(|failure| FetchError {
                file: file.clone(),
                url: url.clone(),
                failure,
            })?;
            entries.insert(cache_key(file).to_string(), bytes);
        }

        let record = CacheRecord {
            key: key.clone(),
            entries,
        };
        let object = to_dynamic(&record.to_config_map()).map_err(|e| CacheError::Decode {
            key: key.clone(),
            message: e.to_string(),
        })?;

        match self.store.create(key, &object).await {
            Ok(()) => {
                info!("✅ Created cache record {} with {} entries", key, record.len());
                Ok(record)
            }
            // Another pass populated the cache first; its record is complete
            Err(StoreError::AlreadyExists { .. }) => match self.lookup(key).await? {
                Some(existing) => Ok(existing),
                None => Ok(record),
            },
            Err(source) => Err(CacheError::Create {
                key: key.clone(),
                source,
            }),
        }
    }

    async fn lookup(&self, key: &ResourceKey) -> Result<Option<CacheRecord>, CacheError> {
        let object = self
            .store
            .get(key)
            .await
            .map_err(|source| CacheError::Lookup {
                key: key.clone(),
                source,
            })?;

        object
            .map(|object| {
                from_dynamic::<ConfigMap>(&object)
                    .map(|cm| CacheRecord::from_config_map(key.clone(), cm))
                    .map_err(|e| CacheError::Decode {
                        key: key.clone(),
                        message: e.to_string(),
                    })
            })
            .transpose()
    }
}
