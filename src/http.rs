// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Thin HTTP client wrapper (ambient).
//!
//! Centralizes bearer-token injection, JSON (de)serialization, and
//! non-2xx -> typed-error mapping so C4 and C5 never construct requests
//! by hand. Every transport or contract failure is materialized as a
//! [`SyncError`], never propagated as a panic or unchecked `Result`.

use crate::error::{Result, SyncError};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Configuration injected at startup: backend base URL and bearer token.
#[derive(Debug, Clone)]
pub struct Config {
    /// The backend's base URL, e.g. `https://api.example.com`.
    pub backend_url: String,
    /// The bearer token attached to every request.
    pub auth_token: String,
}

/// A thin wrapper over [`reqwest::Client`] that owns the backend base URL
/// and bearer token.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: Config,
}

impl HttpClient {
    /// Builds a client from the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// The configured backend base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.backend_url
    }

    /// The configured bearer token.
    #[must_use]
    pub fn auth_token(&self) -> &str {
        &self.config.auth_token
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.backend_url, path)
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        let mut request = self
            .client
            .request(method, self.url(path))
            .header("Authorization", format!("Bearer {}", self.config.auth_token));

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|error| {
            warn!(path, %error, "request failed");
            SyncError::transport(path, error.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(path, %status, "server returned non-2xx");
            return Err(SyncError::server_status(path, status.as_u16(), body));
        }

        Ok(response)
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let response = self.send(method, path, body).await?;
        response.json::<T>().await.map_err(|error| {
            SyncError::contract_violation(path, error.to_string())
        })
    }

    /// `GET path`, decoding the JSON response as `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json::<(), T>(Method::GET, path, None).await
    }

    /// `DELETE path`, decoding the JSON response as `T`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json::<(), T>(Method::DELETE, path, None).await
    }

    /// `POST path` with a JSON body, decoding the JSON response as `T`.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send_json(Method::POST, path, Some(body)).await
    }

    /// `POST path` with no body, decoding the JSON response as `T`. Used
    /// for endpoints like `/retry` whose response shape is unobserved —
    /// callers that only care about success should prefer
    /// [`HttpClient::post_status`].
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json::<(), T>(Method::POST, path, None).await
    }

    /// `POST path` with no body, treating any 2xx as success and ignoring
    /// the response body/shape entirely.
    pub async fn post_status(&self, path: &str) -> Result<StatusCode> {
        let response = self.send::<()>(Method::POST, path, None).await?;
        Ok(response.status())
    }

    /// `PUT path` with a JSON body, decoding the JSON response as `T`.
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send_json(Method::PUT, path, Some(body)).await
    }

    /// Opens a raw streaming POST request (used for SSE), returning the
    /// response for the caller to consume as a byte stream.
    pub async fn post_stream<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        self.send(Method::POST, path, Some(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> Config {
        Config {
            backend_url: server.uri(),
            auth_token: "test-token".to_string(),
        }
    }

    #[tokio::test]
    async fn test_get_decodes_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/thing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let client = HttpClient::new(config(&server));
        let body: serde_json::Value = client.get("/api/thing").await.unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_non_2xx_becomes_server_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/thing"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = HttpClient::new(config(&server));
        let result: Result<serde_json::Value> = client.get("/api/thing").await;
        match result {
            Err(SyncError::ServerStatus { status, .. }) => assert_eq!(status, 500),
            other => panic!("expected ServerStatus error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bearer_token_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/thing"))
            .and(wiremock::matchers::header(
                "Authorization",
                "Bearer test-token",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = HttpClient::new(config(&server));
        let _: serde_json::Value = client.get("/api/thing").await.unwrap();
    }

    #[tokio::test]
    async fn test_post_status_ignores_body_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/local-ingest/p1/retry"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = HttpClient::new(config(&server));
        let status = client
            .post_status("/api/local-ingest/p1/retry")
            .await
            .unwrap();
        assert!(status.is_success());
    }
}
