//! In-memory [`ResourceStore`] with optimistic concurrency and a call journal.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use super::{ResourceStore, Result, StoreError, StoreOp};
use crate::gitops::resource::{ManagedResource, ResourceKind};

type Key = (ResourceKind, String, String);

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCall {
    pub op: StoreOp,
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    /// Version token the caller sent (update) or that was assigned (create).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<Key, ManagedResource>,
    journal: Vec<StoreCall>,
    next_version: u64,
    failing: HashSet<(StoreOp, ResourceKind, String)>,
}

impl State {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

/// Thread-safe in-memory store.
///
/// Behaves like an API server for the three calls the engine uses: it assigns
/// `uid`, `creationTimestamp` and a monotonically increasing `resourceVersion`,
/// refuses to create an existing identity and refuses updates carrying a stale
/// version. Every call is appended to a journal that tests can inspect.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call, to exercise caller timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every future `op` on `kind`/`name` fail with a backend error.
    pub fn fail_on(&self, op: StoreOp, kind: ResourceKind, name: impl Into<String>) {
        self.lock().failing.insert((op, kind, name.into()));
    }

    /// Stores a resource directly, bypassing the journal. Returns it as stored.
    pub fn seed(&self, resource: ManagedResource) -> Result<ManagedResource> {
        let mut state = self.lock();
        let key = key_of(&resource)?;
        let mut stored = resource;
        let version = state.bump_version();
        stamp_new(&mut stored, version);
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    /// Returns a stored resource without recording a call.
    pub fn peek(&self, kind: ResourceKind, name: &str, namespace: &str) -> Option<ManagedResource> {
        self.lock()
            .objects
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of stored resources.
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All calls made so far, oldest first.
    pub fn journal(&self) -> Vec<StoreCall> {
        self.lock().journal.clone()
    }

    /// Number of journaled calls of the given operation.
    pub fn count(&self, op: StoreOp) -> usize {
        self.lock().journal.iter().filter(|c| c.op == op).count()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave State half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_failure(
        state: &State,
        op: StoreOp,
        kind: ResourceKind,
        name: &str,
    ) -> Result<()> {
        if state.failing.contains(&(op, kind, name.to_string())) {
            return Err(StoreError::Backend(format!(
                "injected {} failure for {}/{}",
                op, kind, name
            )));
        }
        Ok(())
    }
}

fn key_of(resource: &ManagedResource) -> Result<Key> {
    let namespace = resource
        .namespace()
        .filter(|ns| !ns.is_empty())
        .ok_or_else(|| {
            StoreError::Backend(format!(
                "{} '{}' has no namespace",
                resource.kind(),
                resource.name()
            ))
        })?;
    Ok((
        resource.kind(),
        namespace.to_string(),
        resource.name().to_string(),
    ))
}

fn stamp_new(resource: &mut ManagedResource, version: String) {
    let meta = resource.metadata_mut();
    meta.uid = Some(uuid::Uuid::new_v4().to_string());
    meta.creation_timestamp = Some(Utc::now());
    meta.resource_version = Some(version);
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ManagedResource>> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.journal.push(StoreCall {
            op: StoreOp::Get,
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            resource_version: None,
        });
        Self::check_failure(&state, StoreOp::Get, kind, name)?;

        Ok(state
            .objects
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn create(&self, resource: &ManagedResource) -> Result<ManagedResource> {
        self.simulate_latency().await;
        let key = key_of(resource)?;
        let mut state = self.lock();
        let mut call = StoreCall {
            op: StoreOp::Create,
            kind: key.0,
            namespace: key.1.clone(),
            name: key.2.clone(),
            resource_version: None,
        };

        if let Err(e) = Self::check_failure(&state, StoreOp::Create, key.0, &key.2) {
            state.journal.push(call);
            return Err(e);
        }
        if state.objects.contains_key(&key) {
            state.journal.push(call);
            return Err(StoreError::AlreadyExists {
                kind: key.0,
                namespace: key.1,
                name: key.2,
            });
        }

        let mut stored = resource.clone();
        let version = state.bump_version();
        call.resource_version = Some(version.clone());
        stamp_new(&mut stored, version);
        state.journal.push(call);
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update(&self, resource: &ManagedResource) -> Result<ManagedResource> {
        self.simulate_latency().await;
        let key = key_of(resource)?;
        let mut state = self.lock();
        state.journal.push(StoreCall {
            op: StoreOp::Update,
            kind: key.0,
            namespace: key.1.clone(),
            name: key.2.clone(),
            resource_version: resource.resource_version().map(str::to_string),
        });
        Self::check_failure(&state, StoreOp::Update, key.0, &key.2)?;

        let current = match state.objects.get(&key) {
            Some(current) => current.clone(),
            None => {
                return Err(StoreError::NotFound {
                    kind: key.0,
                    namespace: key.1,
                    name: key.2,
                })
            }
        };

        let actual = current.resource_version().unwrap_or_default().to_string();
        if resource.resource_version() != Some(actual.as_str()) {
            return Err(StoreError::Conflict {
                kind: key.0,
                name: key.2,
                expected: resource.resource_version().map(str::to_string),
                actual,
            });
        }

        let mut stored = resource.clone();
        let version = state.bump_version();
        {
            let current_meta = current.metadata();
            let meta = stored.metadata_mut();
            meta.uid = current_meta.uid.clone();
            meta.creation_timestamp = current_meta.creation_timestamp;
            meta.resource_version = Some(version);
        }
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitops::resource::{ConfigMap, ConfigMapBody, Manifest, ObjectMeta};

    fn config_map(name: &str, namespace: &str, value: &str) -> ManagedResource {
        let mut cm: ConfigMap = Manifest::new(name, ConfigMapBody::default().with_data("k", value));
        cm.metadata = ObjectMeta::new(name).in_namespace(namespace);
        cm.into_managed()
    }

    #[tokio::test]
    async fn test_create_assigns_store_managed_fields() {
        let store = MemoryStore::new();
        let created = store.create(&config_map("a", "ns", "v")).await.unwrap();

        let meta = created.metadata();
        assert_eq!(meta.resource_version.as_deref(), Some("1"));
        assert!(meta.uid.is_some());
        assert!(meta.creation_timestamp.is_some());
        assert_eq!(store.len(), 1);
        assert_eq!(store.journal()[0].resource_version.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_create_existing_is_rejected() {
        let store = MemoryStore::new();
        store.create(&config_map("a", "ns", "v")).await.unwrap();
        let err = store.create(&config_map("a", "ns", "v")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.count(StoreOp::Create), 2);
    }

    #[tokio::test]
    async fn test_same_name_in_other_namespace_is_distinct() {
        let store = MemoryStore::new();
        store.create(&config_map("a", "ns1", "v")).await.unwrap();
        store.create(&config_map("a", "ns2", "v")).await.unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.get(ResourceKind::Secret, "a", "ns1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_requires_current_version() {
        let store = MemoryStore::new();
        let created = store.create(&config_map("a", "ns", "v1")).await.unwrap();

        let stale = config_map("a", "ns", "v2");
        let err = store.update(&stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: None, .. }));

        let mut fresh = config_map("a", "ns", "v2");
        fresh.metadata_mut().resource_version = created.resource_version().map(str::to_string);
        let updated = store.update(&fresh).await.unwrap();

        assert_eq!(updated.resource_version(), Some("2"));
        assert_eq!(updated.metadata().uid, created.metadata().uid);
        assert_eq!(
            updated.metadata().creation_timestamp,
            created.metadata().creation_timestamp
        );
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update(&config_map("a", "ns", "v")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_namespace_is_rejected() {
        let store = MemoryStore::new();
        let cm: ConfigMap = Manifest::new("a", ConfigMapBody::default());
        let err = store.create(&cm.into_managed()).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.fail_on(StoreOp::Create, ResourceKind::ConfigMap, "b");
        assert!(store.create(&config_map("a", "ns", "v")).await.is_ok());
        let err = store.create(&config_map("b", "ns", "v")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_seed_and_peek() {
        let store = MemoryStore::new();
        store.seed(config_map("a", "ns", "v")).unwrap();
        let stored = store.peek(ResourceKind::ConfigMap, "a", "ns").unwrap();
        assert_eq!(stored.resource_version(), Some("1"));
        assert!(store.journal().is_empty());
    }
}
