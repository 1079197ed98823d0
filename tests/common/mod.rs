#![allow(dead_code)]

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};

use hierarchy_api_rust::auth::MIN_HASH_COST;
use hierarchy_api_rust::config::{AppConfig, BootstrapAdmin};
use hierarchy_api_rust::database::Stores;
use hierarchy_api_rust::{app, AppState};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const VIEWER_USERNAME: &str = "viewer";
pub const VIEWER_PASSWORD: &str = "viewer-password";

/// A server on its own port and in-memory store, living as long as the test runtime
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub client: Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::development();
        config.api.enable_request_logging = false;
        config.security.password_hash_cost = MIN_HASH_COST;

        let state = AppState::new(config, Stores::memory());
        state
            .auth
            .seed_admin(&BootstrapAdmin {
                username: ADMIN_USERNAME.to_string(),
                password: ADMIN_PASSWORD.to_string(),
            })
            .await?;
        state
            .auth
            .create_user(VIEWER_USERNAME, VIEWER_PASSWORD, vec!["user".to_string()])
            .await?;

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind port {}", port))?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app(state)).await;
        });

        Ok(Self {
            port,
            base_url,
            client: Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());

        let body: Value = res.json().await?;
        body["data"]["access_token"]
            .as_str()
            .map(str::to_string)
            .context("login response carried no access_token")
    }

    pub async fn admin_token(&self) -> Result<String> {
        self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    pub async fn viewer_token(&self) -> Result<String> {
        self.login(VIEWER_USERNAME, VIEWER_PASSWORD).await
    }

    pub fn get(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    /// POST /positions, returning the status and parsed body
    pub async fn create_position(&self, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .post(self.url("/positions"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        Ok((res.status(), res.json().await?))
    }

    /// Create and return the new position's id, failing unless 201
    pub async fn create_ok(&self, token: &str, body: Value) -> Result<String> {
        let (status, body) = self.create_position(token, body).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create failed: {} {}", status, body);
        body["data"]["id"]
            .as_str()
            .map(str::to_string)
            .context("created position has no id")
    }

    pub async fn patch_position(&self, token: &str, id: &str, body: Value) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .patch(self.url(&format!("/positions/{}", id)))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn delete_position(&self, token: &str, id: &str) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .delete(self.url(&format!("/positions/{}", id)))
            .bearer_auth(token)
            .send()
            .await?;
        Ok((res.status(), res.json().await?))
    }
}
