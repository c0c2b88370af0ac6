//! In-memory mock registry.
//!
//! Mocks are held behind `Arc` and replaced wholesale on update, so the
//! resolution path can take a cheap snapshot and never observes a
//! half-updated entity.

use crate::mock::{Mock, MockData, MockUpdate};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Mock with id {0} not found")]
    NotFound(Uuid),
}

/// Owns every registered mock, iterable in insertion order.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Entries>,
}

#[derive(Debug, Default)]
struct Entries {
    order: Vec<Uuid>,
    mocks: HashMap<Uuid, Arc<Mock>>,
}

impl Entries {
    fn ordered(&self) -> Vec<Arc<Mock>> {
        self.order
            .iter()
            .filter_map(|id| self.mocks.get(id).cloned())
            .collect()
    }
}

/// Search criteria. Every given criterion must hold.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MockSearch {
    /// Substring of the route pattern
    pub route: Option<String>,
    /// Method, case-insensitive
    pub method: Option<String>,
    /// Case-insensitive substring of the description
    pub description: Option<String>,
}

/// Aggregate counts over the registered mocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockStats {
    pub total: usize,
    pub by_method: BTreeMap<String, usize>,
    pub by_status: BTreeMap<u16, usize>,
    pub by_content_type: BTreeMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new mock.
    pub fn create(&self, data: MockData) -> Arc<Mock> {
        let mock = Arc::new(Mock::create(data, Utc::now()));
        let mut entries = self.write();
        entries.order.push(mock.id);
        entries.mocks.insert(mock.id, Arc::clone(&mock));
        debug!(mock_id = %mock.id, route = %mock.route, method = %mock.method, "Mock registered");
        mock
    }

    /// All mocks in insertion order.
    pub fn get_all(&self) -> Vec<Arc<Mock>> {
        self.read().ordered()
    }

    /// Consistent view of the registry for one resolution.
    pub fn snapshot(&self) -> Vec<Arc<Mock>> {
        self.get_all()
    }

    pub fn get_by_id(&self, id: &Uuid) -> Option<Arc<Mock>> {
        self.read().mocks.get(id).cloned()
    }

    /// Apply a partial update, replacing the stored entity.
    pub fn update(&self, id: &Uuid, update: MockUpdate) -> Result<Arc<Mock>, RegistryError> {
        let mut entries = self.write();
        let current = entries.mocks.get(id).ok_or(RegistryError::NotFound(*id))?;
        let next = Arc::new(current.updated(update, Utc::now()));
        entries.mocks.insert(*id, Arc::clone(&next));
        debug!(mock_id = %id, "Mock updated");
        Ok(next)
    }

    pub fn delete(&self, id: &Uuid) -> Result<(), RegistryError> {
        let mut entries = self.write();
        if entries.mocks.remove(id).is_none() {
            return Err(RegistryError::NotFound(*id));
        }
        entries.order.retain(|existing| existing != id);
        debug!(mock_id = %id, "Mock deleted");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().mocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mocks satisfying every criterion in `search`, in insertion order.
    pub fn search(&self, search: &MockSearch) -> Vec<Arc<Mock>> {
        let description = search.description.as_deref().map(str::to_lowercase);

        self.get_all()
            .into_iter()
            .filter(|mock| {
                search
                    .route
                    .as_deref()
                    .map_or(true, |route| mock.route.contains(route))
            })
            .filter(|mock| {
                search
                    .method
                    .as_deref()
                    .map_or(true, |method| mock.method.matches(method))
            })
            .filter(|mock| {
                description
                    .as_deref()
                    .map_or(true, |d| mock.description.to_lowercase().contains(d))
            })
            .collect()
    }

    pub fn stats(&self) -> MockStats {
        self.get_all()
            .iter()
            .fold(MockStats::default(), |mut stats, mock| {
                stats.total += 1;
                *stats.by_method.entry(mock.method.to_string()).or_default() += 1;
                *stats.by_status.entry(mock.status_code).or_default() += 1;
                *stats
                    .by_content_type
                    .entry(mock.content_type.clone())
                    .or_default() += 1;
                stats
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::HttpMethod;
    use serde_json::json;

    #[test]
    fn test_create_then_get_by_id() {
        let registry = Registry::new();
        let data = MockData::new(HttpMethod::Get, "/api/users")
            .with_response(json!({"users": []}))
            .with_description("list users");

        let created = registry.create(data.clone());
        let fetched = registry.get_by_id(&created.id).unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.route, data.route);
        assert_eq!(fetched.method, data.method);
        assert_eq!(fetched.response_content, data.response_content);
        assert_eq!(fetched.description, data.description);
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = Registry::new();
        let a = registry.create(MockData::new(HttpMethod::Get, "/a"));
        let b = registry.create(MockData::new(HttpMethod::Get, "/a"));
        assert_ne!(a.id, b.id);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_get_all_keeps_insertion_order() {
        let registry = Registry::new();
        let routes = ["/c", "/a", "/b"];
        for route in routes {
            registry.create(MockData::new(HttpMethod::Get, route));
        }

        let listed: Vec<_> = registry.get_all().iter().map(|m| m.route.clone()).collect();
        assert_eq!(listed, routes);
    }

    #[test]
    fn test_order_survives_delete_and_update() {
        let registry = Registry::new();
        let a = registry.create(MockData::new(HttpMethod::Get, "/a"));
        let b = registry.create(MockData::new(HttpMethod::Get, "/b"));
        let c = registry.create(MockData::new(HttpMethod::Get, "/c"));

        registry.delete(&b.id).unwrap();
        registry
            .update(
                &a.id,
                MockUpdate {
                    status_code: Some(204),
                    ..Default::default()
                },
            )
            .unwrap();

        let ids: Vec<_> = registry.get_all().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
    }

    #[test]
    fn test_update_description_only() {
        let registry = Registry::new();
        let created = registry.create(
            MockData::new(HttpMethod::Post, "/orders").with_description("before"),
        );
        std::thread::sleep(std::time::Duration::from_millis(5));

        let updated = registry
            .update(
                &created.id,
                MockUpdate {
                    description: Some("after".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.route, created.route);
        assert_eq!(updated.method, created.method);
        assert_eq!(updated.status_code, created.status_code);
        assert_eq!(updated.description, "after");
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(registry.get_by_id(&created.id).unwrap().description, "after");
        // Snapshots taken before the update are untouched.
        assert_eq!(created.description, "before");
    }

    #[test]
    fn test_update_unknown_id() {
        let registry = Registry::new();
        let id = Uuid::new_v4();
        assert_eq!(
            registry.update(&id, MockUpdate::default()),
            Err(RegistryError::NotFound(id))
        );
    }

    #[test]
    fn test_delete_twice() {
        let registry = Registry::new();
        let mock = registry.create(MockData::new(HttpMethod::Get, "/gone"));

        assert!(registry.delete(&mock.id).is_ok());
        assert_eq!(registry.delete(&mock.id), Err(RegistryError::NotFound(mock.id)));
        assert!(registry.get_by_id(&mock.id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_delete_unknown_id() {
        let registry = Registry::new();
        let id = Uuid::new_v4();
        assert_eq!(registry.delete(&id), Err(RegistryError::NotFound(id)));
    }

    #[test]
    fn test_search() {
        let registry = Registry::new();
        registry.create(MockData::new(HttpMethod::Get, "/api/users").with_description("List Users"));
        registry.create(MockData::new(HttpMethod::Post, "/api/users").with_description("create user"));
        registry.create(MockData::new(HttpMethod::Get, "/api/orders"));

        let by_route = registry.search(&MockSearch {
            route: Some("users".to_string()),
            ..Default::default()
        });
        assert_eq!(by_route.len(), 2);

        let by_method = registry.search(&MockSearch {
            method: Some("GET".to_string()),
            ..Default::default()
        });
        assert_eq!(by_method.len(), 2);

        let by_description = registry.search(&MockSearch {
            description: Some("USERS".to_string()),
            ..Default::default()
        });
        assert_eq!(by_description.len(), 1);
        assert_eq!(by_description[0].method, HttpMethod::Get);

        let combined = registry.search(&MockSearch {
            route: Some("/api".to_string()),
            method: Some("post".to_string()),
            description: None,
        });
        assert_eq!(combined.len(), 1);
    }

    #[test]
    fn test_stats() {
        let registry = Registry::new();
        registry.create(MockData::new(HttpMethod::Get, "/a"));
        registry.create(MockData::new(HttpMethod::Get, "/b"));
        let mut text = MockData::new(HttpMethod::Post, "/c");
        text.status_code = 201;
        text.content_type = "text/plain".to_string();
        registry.create(text);

        let stats = registry.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_method.get("get"), Some(&2));
        assert_eq!(stats.by_method.get("post"), Some(&1));
        assert_eq!(stats.by_status.get(&200), Some(&2));
        assert_eq!(stats.by_status.get(&201), Some(&1));
        assert_eq!(stats.by_content_type.get("text/plain"), Some(&1));
    }

    #[test]
    fn test_concurrent_reads_and_writes() {
        let registry = Arc::new(Registry::new());
        let seeded = registry.create(MockData::new(HttpMethod::Get, "/shared"));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let id = seeded.id;
                std::thread::spawn(move || {
                    for n in 0..50 {
                        if i % 2 == 0 {
                            registry
                                .update(
                                    &id,
                                    MockUpdate {
                                        status_code: Some(200 + n),
                                        description: Some(format!("{}", 200 + n)),
                                        ..Default::default()
                                    },
                                )
                                .unwrap();
                        } else {
                            let mock = registry.get_by_id(&id).unwrap();
                            let described = mock.description.parse::<u16>().unwrap_or(200);
                            assert_eq!(described, mock.status_code);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 1);
    }
}
