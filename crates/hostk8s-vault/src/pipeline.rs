//! Contract-driven secret pipeline
//!
//! Resolves a stack's secret contract into Vault writes plus a generated
//! ExternalSecret manifest. Secrets already present in Vault are left
//! untouched, so generated values survive reruns.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hostk8s_core::logging as log;
use hostk8s_core::{SecretContract, StackPaths};

use crate::client::VaultClient;
use crate::error::{Result, VaultError};
use crate::external::{vault_path, ExternalSecret};

const MANIFEST_HEADER: &str = "# Generated ExternalSecret manifests from hostk8s.secrets.yaml\n\
# This file is auto-generated by hostk8s - safe to commit to Git\n\
# Contains no sensitive data - only Vault path references\n";

/// Drives secret contracts through Vault and ExternalSecret generation
pub struct SecretPipeline {
    root: PathBuf,
    client: VaultClient,
}

impl SecretPipeline {
    pub fn new(root: impl Into<PathBuf>, client: VaultClient) -> Self {
        Self {
            root: root.into(),
            client,
        }
    }

    /// Store a stack's secrets in Vault and regenerate its manifest
    ///
    /// Stacks without a contract are a no-op. Partial failures still write
    /// the manifest for the secrets that succeeded, then error.
    pub async fn add(&self, stack: &str) -> Result<()> {
        let paths = StackPaths::new(&self.root, stack);
        let contract_path = paths.secrets_contract();
        if !contract_path.exists() {
            log::info(format!("[Secrets] No secret contract for stack '{stack}'"));
            return Ok(());
        }

        if !self.client.health().await {
            return Err(VaultError::Unreachable {
                addr: self.client.addr().to_string(),
            });
        }

        let contract = SecretContract::load(&contract_path)?;
        let total = contract.spec.secrets.len();
        log::info(format!(
            "[Secrets] Processing {total} secret(s) for stack '{stack}'"
        ));

        let mut manifest = String::from(MANIFEST_HEADER);
        manifest.push_str(&format!("# To regenerate: hostk8s up {stack}\n"));
        let mut processed = 0usize;

        for secret in &contract.spec.secrets {
            let path = vault_path(stack, &secret.namespace, &secret.name);

            if self.client.secret_exists(&path).await? {
                log::info(format!(
                    "[Secrets] Secret '{}' already in Vault, skipping",
                    secret.name
                ));
            } else {
                let resolved = secret.resolve();
                for key in &resolved.skipped {
                    log::warn(format!(
                        "[Secrets] Key '{key}' in secret '{}' has neither value nor generate, skipping",
                        secret.name
                    ));
                }
                if resolved.data.is_empty() {
                    log::warn(format!(
                        "[Secrets] Secret '{}' resolved to no data, skipping",
                        secret.name
                    ));
                    continue;
                }

                let data: BTreeMap<String, String> = resolved.data.into_iter().collect();
                match self.client.put_secret(&path, &data).await {
                    Ok(()) => {
                        log::info(format!("[Secrets] Stored '{}' at {path}", secret.name));
                    }
                    Err(e) => {
                        log::error(format!("[Secrets] Failed to store '{}': {e}", secret.name));
                        continue;
                    }
                }
            }

            let external = ExternalSecret::for_secret(secret, stack);
            manifest.push_str(&format!("\n---\n# ExternalSecret for {}\n", secret.name));
            manifest.push_str(&serde_yaml::to_string(&external)?);
            processed += 1;
        }

        self.write_manifest(&paths.external_secrets_manifest(), &manifest)?;

        if processed < total {
            return Err(VaultError::Incomplete { processed, total });
        }
        log::success(format!("[Secrets] Stack '{stack}' secrets ready"));
        Ok(())
    }

    /// Remove a stack's secrets from Vault and delete its manifest
    ///
    /// Works from the contract when present, otherwise sweeps Vault under
    /// the stack's path prefix. Deletion never fails the pipeline.
    pub async fn remove(&self, stack: &str) -> Result<()> {
        if !self.client.health().await {
            log::warn(format!(
                "[Secrets] Vault unreachable at {}, skipping secret removal",
                self.client.addr()
            ));
            return Ok(());
        }

        let paths = StackPaths::new(&self.root, stack);
        let contract_path = paths.secrets_contract();

        if contract_path.exists() {
            let contract = SecretContract::load(&contract_path)?;
            for secret in &contract.spec.secrets {
                let path = vault_path(stack, &secret.namespace, &secret.name);
                self.client.delete_secret(&path).await;
                log::info(format!("[Secrets] Removed '{path}' from Vault"));
            }
        } else {
            // Contract gone; sweep everything under the stack prefix
            for namespace in self.client.list_secrets(stack).await? {
                let namespace = namespace.trim_end_matches('/');
                let base = format!("{stack}/{namespace}");
                for name in self.client.list_secrets(&base).await? {
                    let path = format!("{base}/{name}");
                    self.client.delete_secret(&path).await;
                    log::info(format!("[Secrets] Removed '{path}' from Vault"));
                }
            }
        }

        let manifest = paths.external_secrets_manifest();
        if manifest.exists() {
            std::fs::remove_file(&manifest)?;
            log::debug(format!("[Secrets] Deleted {}", manifest.display()));
        }
        Ok(())
    }

    /// List Vault paths, either for one stack or across all stacks
    pub async fn list(&self, stack: Option<&str>) -> Result<Vec<String>> {
        if !self.client.health().await {
            return Err(VaultError::Unreachable {
                addr: self.client.addr().to_string(),
            });
        }

        let stacks: Vec<String> = match stack {
            Some(s) => vec![s.to_string()],
            None => self
                .client
                .list_secrets("")
                .await?
                .into_iter()
                .map(|s| s.trim_end_matches('/').to_string())
                .collect(),
        };

        let mut found = Vec::new();
        for stack in &stacks {
            for namespace in self.client.list_secrets(stack).await? {
                let namespace = namespace.trim_end_matches('/');
                let base = format!("{stack}/{namespace}");
                for name in self.client.list_secrets(&base).await? {
                    found.push(format!("{base}/{name}"));
                }
            }
        }
        found.sort();
        Ok(found)
    }

    fn write_manifest(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        log::info(format!("[Secrets] Wrote {}", path.display()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CONTRACT: &str = r#"
apiVersion: hostk8s.io/v1
kind: SecretContract
metadata:
  name: sample
spec:
  secrets:
    - name: database-credentials
      namespace: sample
      data:
        - key: username
          value: admin
        - key: password
          generate: password
          length: 24
"#;

    fn workspace_with_contract() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let stack_dir = dir.path().join("software/stacks/sample");
        std::fs::create_dir_all(&stack_dir).unwrap();
        std::fs::write(stack_dir.join("hostk8s.secrets.yaml"), CONTRACT).unwrap();
        dir
    }

    async fn healthy_vault() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sys/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn add_writes_secret_and_manifest() {
        let workspace = workspace_with_contract();
        let server = healthy_vault().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v1/secret/data/sample/.*"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/secret/data/sample/sample/database-credentials"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = VaultClient::new(server.uri(), "t").unwrap();
        SecretPipeline::new(workspace.path(), client)
            .add("sample")
            .await
            .unwrap();

        let manifest = std::fs::read_to_string(
            workspace
                .path()
                .join("software/stacks/sample/manifests/external-secrets.yaml"),
        )
        .unwrap();
        assert!(manifest.starts_with("# Generated ExternalSecret manifests"));
        assert!(manifest.contains("# ExternalSecret for database-credentials"));
        assert!(manifest.contains("key: sample/sample/database-credentials"));
    }

    #[tokio::test]
    async fn add_skips_existing_vault_secret() {
        let workspace = workspace_with_contract();
        let server = healthy_vault().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/sample/sample/database-credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "data": { "username": "admin" } }
            })))
            .mount(&server)
            .await;
        // No POST mock mounted; a write attempt would 404 and fail the run

        let client = VaultClient::new(server.uri(), "t").unwrap();
        SecretPipeline::new(workspace.path(), client)
            .add("sample")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn add_without_contract_is_noop() {
        let workspace = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        let client = VaultClient::new(server.uri(), "t").unwrap();
        SecretPipeline::new(workspace.path(), client)
            .add("missing-stack")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn add_fails_when_vault_down() {
        let workspace = workspace_with_contract();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sys/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = VaultClient::new(server.uri(), "t").unwrap();
        let err = SecretPipeline::new(workspace.path(), client)
            .add("sample")
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn remove_deletes_contract_secrets_and_manifest() {
        let workspace = workspace_with_contract();
        let manifest = workspace
            .path()
            .join("software/stacks/sample/manifests/external-secrets.yaml");
        std::fs::create_dir_all(manifest.parent().unwrap()).unwrap();
        std::fs::write(&manifest, "# stale").unwrap();

        let server = healthy_vault().await;
        Mock::given(method("DELETE"))
            .and(path_regex(r"^/v1/secret/(data|metadata)/sample/.*"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let client = VaultClient::new(server.uri(), "t").unwrap();
        SecretPipeline::new(workspace.path(), client)
            .remove("sample")
            .await
            .unwrap();
        assert!(!manifest.exists());
    }

    #[tokio::test]
    async fn list_walks_namespaces() {
        let server = healthy_vault().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/metadata/sample"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "keys": ["sample/"] }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/metadata/sample/sample"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "keys": ["database-credentials"] }
            })))
            .mount(&server)
            .await;

        let client = VaultClient::new(server.uri(), "t").unwrap();
        let workspace = tempfile::tempdir().unwrap();
        let found = SecretPipeline::new(workspace.path(), client)
            .list(Some("sample"))
            .await
            .unwrap();
        assert_eq!(found, vec!["sample/sample/database-credentials".to_string()]);
    }
}
