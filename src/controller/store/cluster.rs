//! # Kubernetes Store
//!
//! [`ResourceStore`] backed by the Kubernetes API through `kube::Api<DynamicObject>`.

use super::{ResourceKey, ResourceKind, ResourceStore, StoreError, StoreOperation};
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::Client;
use tracing::debug;

#[derive(Clone)]
pub struct KubeResourceStore {
    client: Client,
}

impl std::fmt::Debug for KubeResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeResourceStore").finish_non_exhaustive()
    }
}

impl KubeResourceStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, kind: ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = kind.api_resource();
        match namespace {
            Some(ns) if kind.is_namespaced() => Api::namespaced_with(self.client.clone(), ns, &ar),
            _ => Api::all_with(self.client.clone(), &ar),
        }
    }
}

fn backend_error(operation: StoreOperation, key: &ResourceKey, err: &kube::Error) -> StoreError {
    StoreError::Backend {
        operation,
        key: key.clone(),
        message: err.to_string(),
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<DynamicObject>, StoreError> {
        let api = self.api(key.kind, key.namespace.as_deref());
        match api.get(&key.name).await {
            Ok(object) => Ok(Some(object)),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(None),
            Err(e) => Err(backend_error(StoreOperation::Get, key, &e)),
        }
    }

    async fn create(&self, key: &ResourceKey, object: &DynamicObject) -> Result<(), StoreError> {
        let api = self.api(key.kind, key.namespace.as_deref());
        match api.create(&PostParams::default(), object).await {
            Ok(_) => {
                debug!("Created {}", key);
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => Err(StoreError::AlreadyExists {
                kind: key.kind,
                name: key.name.clone(),
            }),
            Err(e) => Err(backend_error(StoreOperation::Create, key, &e)),
        }
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
        let api = self.api(key.kind, key.namespace.as_deref());
        match api.delete(&key.name, &DeleteParams::default()).await {
            Ok(_) => {
                debug!("Deleted {}", key);
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(backend_error(StoreOperation::Delete, key, &e)),
        }
    }

    async fn update(&self, key: &ResourceKey, object: &DynamicObject) -> Result<(), StoreError> {
        let api = self.api(key.kind, key.namespace.as_deref());
        api.replace(&key.name, &PostParams::default(), object)
            .await
            .map(|_| ())
            .map_err(|e| backend_error(StoreOperation::Update, key, &e))
    }

    async fn list_labelled(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: &[(&str, &str)],
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let api = self.api(kind, namespace);
        let labels = selector
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        api.list(&ListParams::default().labels(&labels))
            .await
            .map(|list| list.items)
            .map_err(|e| {
                let key = ResourceKey {
                    kind,
                    name: format!("[{labels}]"),
                    namespace: namespace.map(str::to_string),
                };
                backend_error(StoreOperation::List, &key, &e)
            })
    }
}
