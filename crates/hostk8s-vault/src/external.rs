//! ExternalSecret manifest generation
//!
//! Each secret in a contract becomes an ExternalSecret resource that the
//! External Secrets Operator reconciles against the `vault-backend`
//! ClusterSecretStore. The generated manifests hold only Vault path
//! references, never values, so they are safe to commit.

use serde::{Deserialize, Serialize};

use hostk8s_core::SecretSpec;

/// Label marking resources created by hostk8s
pub const MANAGED_LABEL: &str = "hostk8s.io/managed";

/// Label naming the contract a resource came from
pub const CONTRACT_LABEL: &str = "hostk8s.io/contract";

/// ClusterSecretStore the ExternalSecrets reference
pub const SECRET_STORE: &str = "vault-backend";

/// Vault KV path for a secret: `{stack}/{namespace}/{name}`
pub fn vault_path(stack: &str, namespace: &str, name: &str) -> String {
    format!("{stack}/{namespace}/{name}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSecret {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ExternalSecretMetadata,
    pub spec: ExternalSecretSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSecretMetadata {
    pub name: String,
    pub namespace: String,
    pub labels: ExternalSecretLabels,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSecretLabels {
    #[serde(rename = "hostk8s.io/managed")]
    pub managed: String,
    #[serde(rename = "hostk8s.io/contract")]
    pub contract: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSecretSpec {
    #[serde(rename = "refreshInterval")]
    pub refresh_interval: String,
    #[serde(rename = "secretStoreRef")]
    pub secret_store_ref: SecretStoreRef,
    pub target: ExternalSecretTarget,
    pub data: Vec<ExternalSecretData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretStoreRef {
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSecretTarget {
    pub name: String,
    #[serde(rename = "creationPolicy")]
    pub creation_policy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSecretData {
    #[serde(rename = "secretKey")]
    pub secret_key: String,
    #[serde(rename = "remoteRef")]
    pub remote_ref: RemoteRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRef {
    pub key: String,
    pub property: String,
}

impl ExternalSecret {
    /// Build the ExternalSecret for one contract secret
    ///
    /// Every declared key is referenced, including keys the Vault write
    /// skipped; ESO reports those as missing rather than silently dropping
    /// them from the target secret.
    pub fn for_secret(spec: &SecretSpec, stack: &str) -> Self {
        let key = vault_path(stack, &spec.namespace, &spec.name);
        Self {
            api_version: "external-secrets.io/v1".to_string(),
            kind: "ExternalSecret".to_string(),
            metadata: ExternalSecretMetadata {
                name: spec.name.clone(),
                namespace: spec.namespace.clone(),
                labels: ExternalSecretLabels {
                    managed: "true".to_string(),
                    contract: stack.to_string(),
                },
            },
            spec: ExternalSecretSpec {
                refresh_interval: "10s".to_string(),
                secret_store_ref: SecretStoreRef {
                    name: SECRET_STORE.to_string(),
                    kind: "ClusterSecretStore".to_string(),
                },
                target: ExternalSecretTarget {
                    name: spec.name.clone(),
                    creation_policy: "Owner".to_string(),
                },
                data: spec
                    .data
                    .iter()
                    .map(|field| ExternalSecretData {
                        secret_key: field.key.clone(),
                        remote_ref: RemoteRef {
                            key: key.clone(),
                            property: field.key.clone(),
                        },
                    })
                    .collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostk8s_core::SecretContract;

    const CONTRACT: &str = r#"
apiVersion: hostk8s.io/v1
kind: SecretContract
metadata:
  name: sample
spec:
  secrets:
    - name: database-credentials
      namespace: sample-app
      data:
        - key: username
          value: admin
        - key: password
          generate: password
          length: 24
"#;

    #[test]
    fn test_manifest_shape() {
        let contract: SecretContract = serde_yaml::from_str(CONTRACT).unwrap();
        let manifest = ExternalSecret::for_secret(&contract.spec.secrets[0], "sample");

        let yaml = serde_yaml::to_string(&manifest).unwrap();
        assert!(yaml.contains("apiVersion: external-secrets.io/v1"));
        assert!(yaml.contains("hostk8s.io/managed: 'true'"));
        assert!(yaml.contains("refreshInterval: 10s"));
        assert!(yaml.contains("name: vault-backend"));
        assert!(yaml.contains("creationPolicy: Owner"));
        assert!(yaml.contains("key: sample/sample-app/database-credentials"));

        assert_eq!(manifest.spec.data.len(), 2);
        assert_eq!(manifest.spec.data[1].remote_ref.property, "password");
    }

    #[test]
    fn test_vault_path_layout() {
        assert_eq!(vault_path("sample", "default", "db"), "sample/default/db");
    }
}
