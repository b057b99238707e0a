//! Shared JSON-over-HTTP plumbing for the REST clients.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

/// Authentication strategy for a service.
#[derive(Clone, Debug)]
pub enum Auth {
    /// No credentials
    None,
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
}

/// HTTP client bound to one service base URL.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl ApiClient {
    pub fn new(base_url: &str, auth: Auth, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.build_url(path));
        match &self.auth {
            Auth::None => request,
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::XApiKey(key) => request.header("X-API-Key", key.as_str()),
        }
    }

    pub(crate) async fn send(&self, method: Method, path: &str, request: RequestBuilder) -> ApiResult<Response> {
        let url = self.build_url(path);
        request
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })
            .map(|response| {
                tracing::debug!(
                    method = %method,
                    url = %url,
                    status = response.status().as_u16(),
                    "HTTP response received"
                );
                response
            })
    }

    /// GET returning `None` on 404.
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ApiResult<Option<T>> {
        let mut request = self.request(Method::GET, path);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = self.send(Method::GET, path, request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.decode(Method::GET, path, response).await.map(Some)
    }

    /// GET treating 404 as an error.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<T> {
        self.get_optional(path, query)
            .await?
            .ok_or_else(|| ApiError::NotFound(self.build_url(path)))
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let request = self.request(Method::POST, path).json(body);
        let response = self.send(Method::POST, path, request).await?;
        self.decode(Method::POST, path, response).await
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let request = self.request(Method::PUT, path).json(body);
        let response = self.send(Method::PUT, path, request).await?;
        self.decode(Method::PUT, path, response).await
    }

    /// Fail on non-2xx, otherwise parse the JSON body.
    pub(crate) async fn decode<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        response: Response,
    ) -> ApiResult<T> {
        let response = self.check_status(method, path, response).await?;
        let url = self.build_url(path);
        let bytes = response.bytes().await.map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
            url,
            message: e.to_string(),
        })
    }

    pub(crate) async fn check_status(
        &self,
        method: Method,
        path: &str,
        response: Response,
    ) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ApiError::Status {
            method: method.to_string(),
            url: self.build_url(path),
            status: status.as_u16(),
            body,
        })
    }
}
