//! Command-line client for a running gateway.
//!
//! Mirrors the HTTP surface: register and login post JSON, tasks sends HTTP
//! Basic credentials.

use anyhow::{Context, Result};
use std::time::Duration;

/// Where `credgate serve` listens by default.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

const CLIENT_TIMEOUT_SECS: u64 = 30;

/// Status and body of one gateway call.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: u16,
    pub body: String,
}

impl ClientResponse {
    /// Pretty-printed JSON when the body is JSON, the raw text otherwise.
    pub fn display_body(&self) -> String {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|value| serde_json::to_string_pretty(&value).ok())
            .unwrap_or_else(|| self.body.clone())
    }
}

pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// POST /register
    pub async fn register(&self, username: &str, password: &str) -> Result<ClientResponse> {
        self.post_credentials("/register", username, password).await
    }

    /// POST /login
    pub async fn login(&self, username: &str, password: &str) -> Result<ClientResponse> {
        self.post_credentials("/login", username, password).await
    }

    /// GET /tasks with HTTP Basic credentials.
    pub async fn tasks(&self, username: &str, password: &str) -> Result<ClientResponse> {
        let url = format!("{}/tasks", self.base_url);
        let response = self
            .http
            .get(&url)
            .basic_auth(username, Some(password))
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;
        Self::collect(response).await
    }

    async fn post_credentials(
        &self,
        path: &str,
        username: &str,
        password: &str,
    ) -> Result<ClientResponse> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;
        Self::collect(response).await
    }

    async fn collect(response: reqwest::Response) -> Result<ClientResponse> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;
        Ok(ClientResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Gate, HashingPolicy, SqliteCredentialStore, DEFAULT_REALM};
    use crate::config::GatewayConfig;
    use crate::gateway::{build_router, AppState};
    use std::sync::Arc;

    async fn spawn_gateway() -> String {
        let store = Arc::new(SqliteCredentialStore::open_in_memory().unwrap());
        let gate = Gate::new(store, HashingPolicy::new(1_000), DEFAULT_REALM, 2).unwrap();
        let app = build_router(
            AppState {
                gate: Arc::new(gate),
            },
            &GatewayConfig::default(),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn display_body_pretty_prints_json() {
        let response = ClientResponse {
            status: 200,
            body: r#"{"status":"ok"}"#.into(),
        };
        assert_eq!(response.display_body(), "{\n  \"status\": \"ok\"\n}");

        let html = ClientResponse {
            status: 200,
            body: "<p>hi</p>".into(),
        };
        assert_eq!(html.display_body(), "<p>hi</p>");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = GatewayClient::new("http://localhost:5000/").unwrap();
        assert_eq!(client.base_url, "http://localhost:5000");
    }

    #[tokio::test]
    async fn client_round_trip_against_live_gateway() {
        let base_url = spawn_gateway().await;
        let client = GatewayClient::new(&base_url).unwrap();

        assert_eq!(client.register("alice", "s3cr3t").await.unwrap().status, 201);
        assert_eq!(client.register("alice", "other").await.unwrap().status, 409);

        assert_eq!(client.login("alice", "s3cr3t").await.unwrap().status, 200);
        assert_eq!(client.login("alice", "wrong").await.unwrap().status, 401);

        let page = client.tasks("alice", "s3cr3t").await.unwrap();
        assert_eq!(page.status, 200);
        assert!(page.body.contains("alice"));

        let denied = client.tasks("bob", "anything").await.unwrap();
        assert_eq!(denied.status, 401);
        assert_eq!(denied.body, "Authentication required");
    }
}
