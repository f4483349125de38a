use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chartfold_core::{AppError, AppResult, RoleId, UserId, WorkspaceId};
use tokio::sync::Mutex;

use crate::authorization_ports::{KeyValueCache, PermissionQueries, RoleHolder};

use super::{PermissionKeySpace, PermissionResolver, ResolverConfig};

/// Store fake where `None` for an operation means "backend unavailable".
#[derive(Default)]
struct FakePermissionQueries {
    aggregate: Option<Vec<String>>,
    view: Option<Vec<String>>,
    join: Option<Vec<String>>,
    calls: Mutex<usize>,
}

impl FakePermissionQueries {
    fn with_aggregate(names: &[&str]) -> Self {
        Self {
            aggregate: Some(owned(names)),
            ..Self::default()
        }
    }

    async fn call_count(&self) -> usize {
        *self.calls.lock().await
    }

    async fn answer(&self, outcome: &Option<Vec<String>>, operation: &str) -> AppResult<Vec<String>> {
        *self.calls.lock().await += 1;
        outcome
            .clone()
            .ok_or_else(|| AppError::Unavailable(format!("{operation} backend is unreachable")))
    }
}

#[async_trait]
impl PermissionQueries for FakePermissionQueries {
    async fn effective_permissions_aggregate(
        &self,
        _user_id: UserId,
        _workspace_id: WorkspaceId,
    ) -> AppResult<Vec<String>> {
        self.answer(&self.aggregate, "aggregate").await
    }

    async fn effective_permissions_view(
        &self,
        _user_id: UserId,
        _workspace_id: WorkspaceId,
    ) -> AppResult<Vec<String>> {
        self.answer(&self.view, "view").await
    }

    async fn effective_permissions_join(
        &self,
        _user_id: UserId,
        _workspace_id: WorkspaceId,
    ) -> AppResult<Vec<String>> {
        self.answer(&self.join, "join").await
    }

    async fn active_assignments_for_role(&self, _role_id: RoleId) -> AppResult<Vec<RoleHolder>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct FakeKeyValueCache {
    entries: Mutex<HashMap<String, String>>,
    fail_all: bool,
}

impl FakeKeyValueCache {
    fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    fn check_available(&self) -> AppResult<()> {
        if self.fail_all {
            return Err(AppError::Unavailable("cache backend is down".to_owned()));
        }

        Ok(())
    }
}

#[async_trait]
impl KeyValueCache for FakeKeyValueCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.check_available()?;
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) -> AppResult<()> {
        self.check_available()?;
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.check_available()?;
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> AppResult<()> {
        self.check_available()?;
        let prefix = pattern.trim_end_matches('*').to_owned();
        self.entries
            .lock()
            .await
            .retain(|key, _| !key.starts_with(prefix.as_str()));
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.check_available()?;
        Ok(self.entries.lock().await.contains_key(key))
    }

    async fn health(&self) -> bool {
        !self.fail_all
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}

fn expected_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}

fn resolver(
    store: Arc<FakePermissionQueries>,
    cache: Arc<FakeKeyValueCache>,
) -> PermissionResolver {
    PermissionResolver::new(
        store,
        cache,
        PermissionKeySpace::default(),
        ResolverConfig::default(),
    )
}

#[tokio::test]
async fn aggregate_result_is_returned_and_cached() {
    let store = Arc::new(FakePermissionQueries::with_aggregate(&[
        "dashboard.read",
        "chart.read",
    ]));
    let cache = Arc::new(FakeKeyValueCache::default());
    let resolver = resolver(store.clone(), cache);
    let user_id = UserId::new();
    let workspace_id = WorkspaceId::new();

    let first = resolver
        .resolve_effective_permissions(user_id, workspace_id)
        .await;
    let second = resolver
        .resolve_effective_permissions(user_id, workspace_id)
        .await;

    assert_eq!(first, expected_set(&["dashboard.read", "chart.read"]));
    assert_eq!(second, first);
    assert_eq!(store.call_count().await, 1);
}

#[tokio::test]
async fn unavailable_aggregate_falls_through_to_view() {
    let store = Arc::new(FakePermissionQueries {
        view: Some(owned(&["dashboard.read"])),
        ..FakePermissionQueries::default()
    });
    let cache = Arc::new(FakeKeyValueCache::default());
    let resolver = resolver(store.clone(), cache);

    let resolved = resolver
        .resolve_effective_permissions(UserId::new(), WorkspaceId::new())
        .await;

    assert_eq!(resolved, expected_set(&["dashboard.read"]));
    assert_eq!(store.call_count().await, 2);
}

#[tokio::test]
async fn manual_join_is_the_path_of_last_resort() {
    let store = Arc::new(FakePermissionQueries {
        join: Some(owned(&["export.create"])),
        ..FakePermissionQueries::default()
    });
    let cache = Arc::new(FakeKeyValueCache::default());
    let resolver = resolver(store.clone(), cache);

    let resolved = resolver
        .resolve_effective_permissions(UserId::new(), WorkspaceId::new())
        .await;

    assert_eq!(resolved, expected_set(&["export.create"]));
    assert_eq!(store.call_count().await, 3);
}

#[tokio::test]
async fn strategy_exhaustion_resolves_empty_and_is_not_cached() {
    let store = Arc::new(FakePermissionQueries::default());
    let cache = Arc::new(FakeKeyValueCache::default());
    let resolver = resolver(store.clone(), cache);
    let user_id = UserId::new();
    let workspace_id = WorkspaceId::new();

    let first = resolver
        .resolve_effective_permissions(user_id, workspace_id)
        .await;
    let second = resolver
        .resolve_effective_permissions(user_id, workspace_id)
        .await;

    assert!(first.is_empty());
    assert!(second.is_empty());
    // Both resolutions walked the whole chain; an outage is never cached.
    assert_eq!(store.call_count().await, 6);
}

#[tokio::test]
async fn correctly_computed_empty_set_is_cached() {
    let store = Arc::new(FakePermissionQueries::with_aggregate(&[]));
    let cache = Arc::new(FakeKeyValueCache::default());
    let resolver = resolver(store.clone(), cache);
    let user_id = UserId::new();
    let workspace_id = WorkspaceId::new();

    let first = resolver
        .resolve_effective_permissions(user_id, workspace_id)
        .await;
    let second = resolver
        .resolve_effective_permissions(user_id, workspace_id)
        .await;

    assert!(first.is_empty());
    assert!(second.is_empty());
    assert_eq!(store.call_count().await, 1);
}

#[tokio::test]
async fn failing_cache_degrades_to_store_roundtrips() {
    let store = Arc::new(FakePermissionQueries::with_aggregate(&["dashboard.read"]));
    let cache = Arc::new(FakeKeyValueCache::failing());
    let resolver = resolver(store.clone(), cache);
    let user_id = UserId::new();
    let workspace_id = WorkspaceId::new();

    let first = resolver
        .resolve_effective_permissions(user_id, workspace_id)
        .await;
    let second = resolver
        .resolve_effective_permissions(user_id, workspace_id)
        .await;

    assert_eq!(first, expected_set(&["dashboard.read"]));
    assert_eq!(second, first);
    assert_eq!(store.call_count().await, 2);
}

#[tokio::test]
async fn undecodable_cache_entry_is_recomputed() {
    let store = Arc::new(FakePermissionQueries::with_aggregate(&["dashboard.read"]));
    let cache = Arc::new(FakeKeyValueCache::default());
    let key_space = PermissionKeySpace::default();
    let user_id = UserId::new();
    let workspace_id = WorkspaceId::new();
    cache.entries.lock().await.insert(
        key_space.entry_key(user_id, workspace_id),
        "not a permission set".to_owned(),
    );
    let resolver = resolver(store.clone(), cache);

    let resolved = resolver
        .resolve_effective_permissions(user_id, workspace_id)
        .await;

    assert_eq!(resolved, expected_set(&["dashboard.read"]));
    assert_eq!(store.call_count().await, 1);
}
