//! Vault KV v2 HTTP client
//!
//! Talks to the dev-mode Vault the cluster addon runs. Paths are relative
//! to the `secret/` KV v2 mount: data lives under `secret/data/<path>` and
//! listing goes through `secret/metadata/<path>?list=true`.

use std::collections::BTreeMap;
use std::time::Duration;

use hostk8s_core::Environment;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Result, VaultError};

/// Default address of the port-forwarded dev Vault
pub const DEFAULT_VAULT_ADDR: &str = "http://localhost:8080";

/// Default dev-mode root token
pub const DEFAULT_VAULT_TOKEN: &str = "hostk8s";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct KvReadResponse {
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct KvListResponse {
    #[serde(default)]
    data: KvListData,
}

#[derive(Debug, Default, Deserialize)]
struct KvListData {
    #[serde(default)]
    keys: Vec<String>,
}

/// Minimal Vault KV v2 client
#[derive(Debug, Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    addr: String,
    token: String,
}

impl VaultClient {
    pub fn new(addr: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            addr: addr.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Client configured from `VAULT_ADDR` / `VAULT_TOKEN`
    pub fn from_env(env: &Environment) -> Result<Self> {
        Self::new(
            env.get_or("VAULT_ADDR", DEFAULT_VAULT_ADDR),
            env.get_or("VAULT_TOKEN", DEFAULT_VAULT_TOKEN),
        )
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.addr)
    }

    /// Whether Vault answers its health endpoint (sealed counts as up)
    pub async fn health(&self) -> bool {
        let response = self
            .http
            .get(self.url("sys/health"))
            .header("X-Vault-Token", &self.token)
            .send()
            .await;
        matches!(
            response,
            Ok(resp) if resp.status() == StatusCode::OK
                || resp.status() == StatusCode::TOO_MANY_REQUESTS
        )
    }

    /// Whether a secret exists at the given KV path
    pub async fn secret_exists(&self, path: &str) -> Result<bool> {
        let response = self
            .http
            .get(self.url(&format!("secret/data/{path}")))
            .header("X-Vault-Token", &self.token)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Ok(false);
        }
        let body: KvReadResponse = response.json().await?;
        Ok(body.data.is_some_and(|d| !d.is_null()))
    }

    /// Write a secret's key/value payload
    pub async fn put_secret(&self, path: &str, data: &BTreeMap<String, String>) -> Result<()> {
        let api_path = format!("secret/data/{path}");
        let response = self
            .http
            .post(self.url(&api_path))
            .header("X-Vault-Token", &self.token)
            .json(&json!({ "data": data }))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            status => Err(VaultError::Api {
                status: status.as_u16(),
                path: api_path,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Delete a secret's data and metadata
    ///
    /// Deletion never fails the caller; the secret may not exist.
    pub async fn delete_secret(&self, path: &str) {
        for api_path in [
            format!("secret/data/{path}"),
            format!("secret/metadata/{path}"),
        ] {
            let _ = self
                .http
                .delete(self.url(&api_path))
                .header("X-Vault-Token", &self.token)
                .send()
                .await;
        }
    }

    /// List keys under a base path; empty base lists the mount root
    pub async fn list_secrets(&self, base_path: &str) -> Result<Vec<String>> {
        let api_path = if base_path.is_empty() {
            "secret/metadata?list=true".to_string()
        } else {
            format!("secret/metadata/{base_path}?list=true")
        };

        let response = self
            .http
            .get(self.url(&api_path))
            .header("X-Vault-Token", &self.token)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Ok(Vec::new());
        }
        let body: KvListResponse = response.json().await?;
        Ok(body.data.keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> VaultClient {
        VaultClient::new(server.uri(), "test-token").unwrap()
    }

    #[tokio::test]
    async fn health_accepts_ok_and_sealed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sys/health"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        assert!(client(&server).await.health().await);
    }

    #[tokio::test]
    async fn health_rejects_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sys/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        assert!(!client(&server).await.health().await);
    }

    #[tokio::test]
    async fn secret_exists_requires_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/sample/default/db"))
            .and(header("X-Vault-Token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "data": { "username": "admin" } }
            })))
            .mount(&server)
            .await;

        let client = client(&server).await;
        assert!(client.secret_exists("sample/default/db").await.unwrap());
        assert!(!client.secret_exists("sample/default/missing").await.unwrap());
    }

    #[tokio::test]
    async fn put_secret_posts_wrapped_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/secret/data/sample/default/db"))
            .and(header("X-Vault-Token", "test-token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut data = BTreeMap::new();
        data.insert("username".to_string(), "admin".to_string());
        client(&server)
            .await
            .put_secret("sample/default/db", &data)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn put_secret_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/secret/data/sample/default/db"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let mut data = BTreeMap::new();
        data.insert("k".to_string(), "v".to_string());
        let err = client(&server)
            .await
            .put_secret("sample/default/db", &data)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Api { status: 403, .. }));
    }

    #[tokio::test]
    async fn list_secrets_reads_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/metadata/sample"))
            .and(query_param("list", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "keys": ["default/", "monitoring/"] }
            })))
            .mount(&server)
            .await;

        let keys = client(&server).await.list_secrets("sample").await.unwrap();
        assert_eq!(keys, vec!["default/".to_string(), "monitoring/".to_string()]);
    }
}
