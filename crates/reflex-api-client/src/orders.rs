//! Orders service client.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use reflex_core::models::Order;

use crate::client::{ApiClient, Auth};
use crate::error::{ApiError, ApiResult};

/// Source of full order records, used when an import is started by id
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn get_order(&self, order_id: &str) -> ApiResult<Order>;
}

#[derive(Clone, Debug)]
pub struct RestOrderClient {
    client: ApiClient,
}

impl RestOrderClient {
    pub fn new(base_url: &str, auth: Auth, timeout: Duration) -> ApiResult<Self> {
        Ok(Self {
            client: ApiClient::new(base_url, auth, timeout)?,
        })
    }
}

#[async_trait]
impl OrderSource for RestOrderClient {
    #[tracing::instrument(skip(self))]
    async fn get_order(&self, order_id: &str) -> ApiResult<Order> {
        let path = format!("orders/{}", urlencoding::encode(order_id));
        let payload: Value = self.client.get(&path, &[]).await?;
        Order::from_value(payload).map_err(|e| ApiError::Decode {
            url: self.client.build_url(&path),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_core::Recoverable;
    use serde_json::json;

    fn order_json() -> Value {
        json!({
            "id": "o-1",
            "slug": "1234",
            "title": "Order 1234",
            "description": "",
            "customer": {"id": "cu-1", "slug": "acme", "title": "ACME"},
            "project": {"id": "pr-1", "slug": "spring", "title": "Spring"},
            "requirement_items": [],
            "delivery": {"gdrive": "https://drive.google.com/drive/folders/0B1aBcDeFgHiJkLmN"}
        })
    }

    #[tokio::test]
    async fn test_get_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/orders/o-1")
            .with_status(200)
            .with_body(order_json().to_string())
            .create_async()
            .await;

        let client = RestOrderClient::new(&server.url(), Auth::None, Duration::from_secs(5)).unwrap();
        let order = client.get_order("o-1").await.unwrap();

        assert_eq!(order.id, "o-1");
        assert_eq!(order.customer.slug, "acme");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_order_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/orders/o-2")
            .with_status(200)
            .with_body(json!({"id": "o-2"}).to_string())
            .create_async()
            .await;

        let client = RestOrderClient::new(&server.url(), Auth::None, Duration::from_secs(5)).unwrap();
        let err = client.get_order("o-2").await.unwrap_err();

        assert!(matches!(err, ApiError::Decode { .. }));
        assert!(!err.is_recoverable());
    }
}
