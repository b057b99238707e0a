//! Catalog ("library") REST client.
//!
//! Resources live at `/{collections|assets}`; a query by slug answers with
//! `{"data": [...]}`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use reflex_core::models::CatalogResource;

use crate::client::{ApiClient, Auth};
use crate::error::ApiResult;

/// Capabilities the pipeline needs from the catalog
///
/// Records are exchanged as JSON; callers parse them into typed models.
/// Absence is `Ok(None)` / an empty vector, never an error.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn get(&self, resource: CatalogResource, id: &str) -> ApiResult<Option<Value>>;

    async fn query(
        &self,
        resource: CatalogResource,
        params: &[(&str, &str)],
    ) -> ApiResult<Vec<Value>>;

    async fn post(&self, resource: CatalogResource, payload: &Value) -> ApiResult<Value>;

    async fn put(&self, resource: CatalogResource, id: &str, payload: &Value) -> ApiResult<Value>;
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Clone, Debug)]
pub struct RestCatalogClient {
    client: ApiClient,
}

impl RestCatalogClient {
    pub fn new(base_url: &str, auth: Auth, timeout: Duration) -> ApiResult<Self> {
        Ok(Self {
            client: ApiClient::new(base_url, auth, timeout)?,
        })
    }

    fn item_path(resource: CatalogResource, id: &str) -> String {
        format!("{}/{}", resource.path(), urlencoding::encode(id))
    }
}

#[async_trait]
impl CatalogApi for RestCatalogClient {
    async fn get(&self, resource: CatalogResource, id: &str) -> ApiResult<Option<Value>> {
        self.client
            .get_optional(&Self::item_path(resource, id), &[])
            .await
    }

    async fn query(
        &self,
        resource: CatalogResource,
        params: &[(&str, &str)],
    ) -> ApiResult<Vec<Value>> {
        let response: QueryResponse = self.client.get(resource.path(), params).await?;
        Ok(response.data)
    }

    async fn post(&self, resource: CatalogResource, payload: &Value) -> ApiResult<Value> {
        let created: Value = self.client.post_json(resource.path(), payload).await?;
        tracing::info!(
            resource = %resource,
            id = created.get("id").and_then(serde_json::Value::as_str).unwrap_or_default(),
            "Catalog record created"
        );
        Ok(created)
    }

    async fn put(&self, resource: CatalogResource, id: &str, payload: &Value) -> ApiResult<Value> {
        self.client
            .put_json(&Self::item_path(resource, id), payload)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::ServerGuard) -> RestCatalogClient {
        RestCatalogClient::new(&server.url(), Auth::None, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_query_by_slug_unwraps_data() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/assets")
            .match_query(Matcher::UrlEncoded("slug".into(), "file-1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"data": [{"id": "a-1", "slug": "file-1"}]}).to_string())
            .create_async()
            .await;

        let rows = client(&server)
            .query(CatalogResource::Assets, &[("slug", "file-1")])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "a-1");
    }

    #[tokio::test]
    async fn test_get_absent_collection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/collections/c-404")
            .with_status(404)
            .create_async()
            .await;

        let found = client(&server)
            .get(CatalogResource::Collections, "c-404")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_put_sends_full_record() {
        let mut server = mockito::Server::new_async().await;
        let record = json!({"id": "a-1", "collections": ["c-1", "c-2"]});
        let mock = server
            .mock("PUT", "/assets/a-1")
            .match_body(Matcher::Json(record.clone()))
            .with_status(200)
            .with_body(record.to_string())
            .create_async()
            .await;

        let updated = client(&server)
            .put(CatalogResource::Assets, "a-1", &record)
            .await
            .unwrap();
        assert_eq!(updated["collections"], json!(["c-1", "c-2"]));
        mock.assert_async().await;
    }
}
