//! In-memory catalog

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use reflex_api_client::{ApiError, ApiResult, CatalogApi};
use reflex_core::models::CatalogResource;

#[derive(Default)]
struct CatalogState {
    collections: HashMap<String, Value>,
    assets: HashMap<String, Value>,
    created: Vec<(CatalogResource, String)>,
    post_calls: usize,
    put_calls: usize,
    failures_left: usize,
    failure_status: u16,
    assigned_prefix: Option<String>,
}

impl CatalogState {
    fn records(&mut self, resource: CatalogResource) -> &mut HashMap<String, Value> {
        match resource {
            CatalogResource::Collections => &mut self.collections,
            CatalogResource::Assets => &mut self.assets,
        }
    }

    fn injected_failure(&mut self, method: &str, resource: CatalogResource) -> ApiResult<()> {
        if self.failures_left == 0 {
            return Ok(());
        }
        self.failures_left -= 1;
        Err(ApiError::Status {
            method: method.to_string(),
            url: format!("mock://catalog/{}", resource),
            status: self.failure_status,
            body: "injected failure".to_string(),
        })
    }
}

/// Catalog double keyed by record id
///
/// Creating a collection whose parent is known appends the new id to the
/// parent's `children`, as the real catalog does.
#[derive(Default)]
pub struct MockCatalog {
    state: Mutex<CatalogState>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a record without counting it as created
    pub fn insert(&self, resource: CatalogResource, record: Value) {
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.state().records(resource).insert(id, record);
    }

    /// Fail the next `count` calls with `status`
    pub fn fail_next(&self, count: usize, status: u16) {
        let mut state = self.state();
        state.failures_left = count;
        state.failure_status = status;
    }

    /// Replace the id of every posted asset with `{prefix}-{n}`, as a catalog
    /// with surrogate keys does
    pub fn assign_asset_ids(&self, prefix: &str) {
        self.state().assigned_prefix = Some(prefix.to_string());
    }

    pub fn collection(&self, id: &str) -> Option<Value> {
        self.state().collections.get(id).cloned()
    }

    pub fn asset_by_slug(&self, slug: &str) -> Option<Value> {
        self.state()
            .assets
            .values()
            .find(|asset| asset.get("slug").and_then(Value::as_str) == Some(slug))
            .cloned()
    }

    /// Ids created through `post`, in creation order
    pub fn created(&self, resource: CatalogResource) -> Vec<String> {
        self.state()
            .created
            .iter()
            .filter(|(r, _)| *r == resource)
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn len(&self, resource: CatalogResource) -> usize {
        self.state().records(resource).len()
    }

    pub fn post_calls(&self) -> usize {
        self.state().post_calls
    }

    pub fn put_calls(&self) -> usize {
        self.state().put_calls
    }
}

#[async_trait]
impl CatalogApi for MockCatalog {
    async fn get(&self, resource: CatalogResource, id: &str) -> ApiResult<Option<Value>> {
        let mut state = self.state();
        state.injected_failure("GET", resource)?;
        Ok(state.records(resource).get(id).cloned())
    }

    async fn query(
        &self,
        resource: CatalogResource,
        params: &[(&str, &str)],
    ) -> ApiResult<Vec<Value>> {
        let mut state = self.state();
        state.injected_failure("GET", resource)?;
        let rows = state
            .records(resource)
            .values()
            .filter(|record| {
                params
                    .iter()
                    .all(|(field, value)| record.get(*field).and_then(Value::as_str) == Some(*value))
            })
            .cloned()
            .collect();
        Ok(rows)
    }

    async fn post(&self, resource: CatalogResource, payload: &Value) -> ApiResult<Value> {
        let mut state = self.state();
        state.injected_failure("POST", resource)?;
        state.post_calls += 1;

        let mut record = payload.clone();
        let assigned = match (&state.assigned_prefix, resource) {
            (Some(prefix), CatalogResource::Assets) => {
                Some(format!("{}-{}", prefix, state.assets.len() + 1))
            }
            _ => None,
        };
        let id = match (assigned, record.get("id").and_then(Value::as_str)) {
            (Some(assigned), _) => {
                record["id"] = Value::String(assigned.clone());
                assigned
            }
            (None, Some(id)) => id.to_string(),
            (None, None) => {
                let id = uuid::Uuid::new_v4().to_string();
                record["id"] = Value::String(id.clone());
                id
            }
        };

        if resource == CatalogResource::Collections {
            let parent_id = record
                .get("parent_id")
                .and_then(Value::as_str)
                .map(String::from);
            if let Some(parent_id) = parent_id {
                if let Some(Value::Object(parent)) = state.collections.get_mut(&parent_id) {
                    let children = parent
                        .entry("children")
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(children) = children {
                        children.push(Value::String(id.clone()));
                    }
                }
            }
        }

        state.records(resource).insert(id.clone(), record.clone());
        state.created.push((resource, id));
        Ok(record)
    }

    async fn put(&self, resource: CatalogResource, id: &str, payload: &Value) -> ApiResult<Value> {
        let mut state = self.state();
        state.injected_failure("PUT", resource)?;
        state.put_calls += 1;
        if !state.records(resource).contains_key(id) {
            return Err(ApiError::Status {
                method: "PUT".to_string(),
                url: format!("mock://catalog/{}/{}", resource, id),
                status: 404,
                body: String::new(),
            });
        }
        state.records(resource).insert(id.to_string(), payload.clone());
        Ok(payload.clone())
    }
}
