//! Direct Kubernetes Secret application
//!
//! Used when Vault is disabled: the secret contract is resolved locally and
//! applied as plain `v1/Secret` objects. Existing secrets are never
//! overwritten, so generated values stay stable across reruns.

use std::collections::BTreeMap;

use hostk8s_core::logging as log;
use hostk8s_core::secrets::SecretContract;
use serde_json::json;

use crate::error::Result;
use crate::tools::{Tool, ToolRunner};

/// Applies resolved secret contracts straight to the cluster
pub struct SecretApplier {
    runner: ToolRunner,
}

impl SecretApplier {
    pub fn new(runner: ToolRunner) -> Self {
        Self { runner }
    }

    /// Apply every secret in the contract, skipping ones that already exist
    ///
    /// Individual failures are logged and swallowed; the return value is the
    /// number of secrets actually created.
    pub async fn apply_contract(&self, contract: &SecretContract, stack: &str) -> Result<usize> {
        let mut applied = 0usize;

        for secret in &contract.spec.secrets {
            let existing = self
                .runner
                .try_run(
                    Tool::Kubectl,
                    [
                        "get",
                        "secret",
                        secret.name.as_str(),
                        "-n",
                        secret.namespace.as_str(),
                    ],
                )
                .await?;
            if existing.success() {
                log::info(format!(
                    "[Secrets] Secret '{}' already exists, skipping",
                    secret.name
                ));
                continue;
            }

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

            self.ensure_namespace(&secret.namespace).await?;

            let string_data: BTreeMap<&str, &str> = resolved
                .data
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            let manifest = json!({
                "apiVersion": "v1",
                "kind": "Secret",
                "metadata": {
                    "name": secret.name,
                    "namespace": secret.namespace,
                    "labels": {
                        "hostk8s.io/managed": "true",
                        "hostk8s.io/contract": stack,
                    },
                },
                "type": "Opaque",
                "stringData": string_data,
            });
            let yaml = serde_yaml::to_string(&manifest)?;

            match self.runner.try_apply_stdin(&yaml).await {
                Ok(out) if out.success() => {
                    log::info(format!(
                        "[Secrets] Created secret '{}' in namespace '{}'",
                        secret.name, secret.namespace
                    ));
                    applied += 1;
                }
                Ok(out) => {
                    log::warn(format!(
                        "[Secrets] Failed to create secret '{}': {}",
                        secret.name,
                        out.stderr.trim()
                    ));
                }
                Err(e) => {
                    log::warn(format!("[Secrets] Failed to create secret '{}': {e}", secret.name));
                }
            }
        }

        Ok(applied)
    }

    /// Delete the contract's secrets, best-effort
    pub async fn remove_contract(&self, contract: &SecretContract) -> Result<usize> {
        let mut removed = 0usize;
        for secret in &contract.spec.secrets {
            let out = self
                .runner
                .try_run(
                    Tool::Kubectl,
                    [
                        "delete",
                        "secret",
                        secret.name.as_str(),
                        "-n",
                        secret.namespace.as_str(),
                        "--ignore-not-found",
                    ],
                )
                .await?;
            if out.success() {
                removed += 1;
            } else {
                log::warn(format!(
                    "[Secrets] Failed to delete secret '{}': {}",
                    secret.name,
                    out.stderr.trim()
                ));
            }
        }
        Ok(removed)
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        let out = self
            .runner
            .try_run(Tool::Kubectl, ["create", "namespace", namespace])
            .await?;
        if !out.success() && !out.stderr.contains("AlreadyExists") {
            log::debug(format!(
                "[Secrets] Could not create namespace '{namespace}': {}",
                out.stderr.trim()
            ));
        }
        Ok(())
    }
}
