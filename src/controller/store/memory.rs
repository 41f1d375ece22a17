//! # In-Memory Store
//!
//! [`ResourceStore`] kept in process memory. Every mutating call is appended
//! to a journal so callers can assert exactly which writes a pass issued.
//! Failures can be injected per operation and key.

use super::{ResourceKey, ResourceKind, ResourceStore, StoreError, StoreOperation};
use async_trait::async_trait;
use kube::api::DynamicObject;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One mutating call observed by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Create(ResourceKey),
    Delete(ResourceKey),
    Update(ResourceKey),
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ResourceKey, DynamicObject>,
    journal: Vec<StoreCall>,
    failures: HashSet<(StoreOperationKey, ResourceKey)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum StoreOperationKey {
    Get,
    Create,
    Delete,
    Update,
}

impl From<StoreOperationKey> for StoreOperation {
    fn from(op: StoreOperationKey) -> Self {
        match op {
            StoreOperationKey::Get => StoreOperation::Get,
            StoreOperationKey::Create => StoreOperation::Create,
            StoreOperationKey::Delete => StoreOperation::Delete,
            StoreOperationKey::Update => StoreOperation::Update,
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryResourceStore {
    state: Mutex<State>,
}

impl InMemoryResourceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object without recording a journal entry
    pub fn insert(&self, key: ResourceKey, object: DynamicObject) {
        self.lock().objects.insert(key, object);
    }

    /// Current object stored under `key`
    #[must_use]
    pub fn object(&self, key: &ResourceKey) -> Option<DynamicObject> {
        self.lock().objects.get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.lock().objects.contains_key(key)
    }

    /// Every mutating call issued so far, in order
    #[must_use]
    pub fn journal(&self) -> Vec<StoreCall> {
        self.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    /// Make the next and every later `create` of `key` fail
    pub fn fail_create(&self, key: ResourceKey) {
        self.lock().failures.insert((StoreOperationKey::Create, key));
    }

    /// Make every `get` of `key` fail
    pub fn fail_get(&self, key: ResourceKey) {
        self.lock().failures.insert((StoreOperationKey::Get, key));
    }

    /// Make every `update` of `key` fail
    pub fn fail_update(&self, key: ResourceKey) {
        self.lock().failures.insert((StoreOperationKey::Update, key));
    }

    fn check_failure(state: &State, op: StoreOperationKey, key: &ResourceKey) -> Result<(), StoreError> {
        if state.failures.contains(&(op, key.clone())) {
            return Err(StoreError::Backend {
                operation: op.into(),
                key: key.clone(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<DynamicObject>, StoreError> {
        let state = self.lock();
        Self::check_failure(&state, StoreOperationKey::Get, key)?;
        Ok(state.objects.get(key).cloned())
    }

    async fn create(&self, key: &ResourceKey, object: &DynamicObject) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.journal.push(StoreCall::Create(key.clone()));
        Self::check_failure(&state, StoreOperationKey::Create, key)?;
        if state.objects.contains_key(key) {
            return Err(StoreError::AlreadyExists {
                kind: key.kind,
                name: key.name.clone(),
            });
        }
        state.objects.insert(key.clone(), object.clone());
        Ok(())
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.journal.push(StoreCall::Delete(key.clone()));
        Self::check_failure(&state, StoreOperationKey::Delete, key)?;
        state.objects.remove(key);
        Ok(())
    }

    async fn update(&self, key: &ResourceKey, object: &DynamicObject) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.journal.push(StoreCall::Update(key.clone()));
        Self::check_failure(&state, StoreOperationKey::Update, key)?;
        match state.objects.get_mut(key) {
            Some(existing) => {
                *existing = object.clone();
                Ok(())
            }
            None => Err(StoreError::Backend {
                operation: StoreOperation::Update,
                key: key.clone(),
                message: "not found".to_string(),
            }),
        }
    }

    async fn list_labelled(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: &[(&str, &str)],
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let state = self.lock();
        Ok(state
            .objects
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .filter(|(key, _)| namespace.is_none() || key.namespace.as_deref() == namespace)
            .filter(|(_, object)| {
                let labels = object.metadata.labels.as_ref();
                selector.iter().all(|(k, v)| {
                    labels
                        .and_then(|labels| labels.get(*k))
                        .is_some_and(|value| value == v)
                })
            })
            .map(|(_, object)| object.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::store::ownership_selector;

    fn template(name: &str, owned: bool) -> DynamicObject {
        let mut object = DynamicObject::new(name, &ResourceKind::Template.api_resource()).within("openshift");
        if owned {
            object.metadata.labels = Some(BTreeMap::from([(
                "integreatly".to_string(),
                "true".to_string(),
            )]));
        }
        object
    }

    #[tokio::test]
    async fn test_create_get_delete_are_journaled() {
        let store = InMemoryResourceStore::new();
        let key = ResourceKey::namespaced(ResourceKind::Template, "foo", "openshift");

        assert!(store.get(&key).await.unwrap().is_none());
        store.create(&key, &template("foo", true)).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_some());
        store.delete(&key).await.unwrap();
        assert!(!store.contains(&key));

        assert_eq!(
            store.journal(),
            vec![StoreCall::Create(key.clone()), StoreCall::Delete(key)]
        );
    }

    #[tokio::test]
    async fn test_create_rejects_existing_identity() {
        let store = InMemoryResourceStore::new();
        let key = ResourceKey::namespaced(ResourceKind::Template, "foo", "openshift");
        store.insert(key.clone(), template("foo", false));

        let err = store.create(&key, &template("foo", true)).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_list_filters_by_label() {
        let store = InMemoryResourceStore::new();
        store.insert(
            ResourceKey::namespaced(ResourceKind::Template, "owned", "openshift"),
            template("owned", true),
        );
        store.insert(
            ResourceKey::namespaced(ResourceKind::Template, "foreign", "openshift"),
            template("foreign", false),
        );

        let owned = store
            .list_labelled(ResourceKind::Template, Some("openshift"), &ownership_selector())
            .await
            .unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].metadata.name.as_deref(), Some("owned"));
    }

    #[tokio::test]
    async fn test_injected_failure_surfaces_backend_error() {
        let store = InMemoryResourceStore::new();
        let key = ResourceKey::namespaced(ResourceKind::Template, "foo", "openshift");
        store.fail_create(key.clone());

        let err = store.create(&key, &template("foo", true)).await.unwrap_err();
        assert!(err.to_string().contains("failed to create Template openshift/foo"));
        assert!(!store.contains(&key));
    }
}
