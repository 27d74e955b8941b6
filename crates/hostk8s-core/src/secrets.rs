//! SecretContract parsing and secret value generation
//!
//! A SecretContract (`hostk8s.secrets.yaml`) declares the secrets a stack
//! needs, with either static values or generated ones:
//!
//! ```yaml
//! apiVersion: hostk8s.io/v1
//! kind: SecretContract
//! metadata:
//!   name: sample
//! spec:
//!   secrets:
//!     - name: database-credentials
//!       namespace: sample
//!       data:
//!         - key: username
//!           value: admin
//!         - key: password
//!           generate: password
//!           length: 24
//! ```
//!
//! Generated values are produced fresh each run; idempotence comes from the
//! consumers (Vault paths and Kubernetes secrets that already exist are
//! never overwritten).

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Expected apiVersion for both contract kinds
pub const CONTRACT_API_VERSION: &str = "hostk8s.io/v1";

// =============================================================================
// GENERATION
// =============================================================================

/// Kinds of generated secret values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateKind {
    /// Alphanumeric plus `!@#$%^&*`
    Password,
    /// Alphanumeric only (default for unknown kinds)
    #[default]
    Token,
    /// Lowercase hex digits, `length / 2` random bytes
    Hex,
    /// Random UUID v4, lowercase; length is ignored
    Uuid,
}

impl GenerateKind {
    /// Parse a generate kind, falling back to `Token` for unknown values
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "password" => Self::Password,
            "token" => Self::Token,
            "hex" => Self::Hex,
            "uuid" => Self::Uuid,
            _ => Self::Token,
        }
    }

    const fn chars(&self) -> &'static [u8] {
        match self {
            Self::Password => {
                b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*"
            }
            Self::Token => b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789",
            Self::Hex | Self::Uuid => b"",
        }
    }
}

/// Generate a secret value of the given kind and length
pub fn generate_value(kind: GenerateKind, length: usize) -> String {
    let mut rng = rand::rng();
    match kind {
        GenerateKind::Password | GenerateKind::Token => {
            let chars = kind.chars();
            (0..length)
                .map(|_| chars[rng.random_range(0..chars.len())] as char)
                .collect()
        }
        GenerateKind::Hex => {
            let bytes = length / 2;
            (0..bytes).map(|_| format!("{:02x}", rng.random::<u8>())).collect()
        }
        GenerateKind::Uuid => uuid::Uuid::new_v4().to_string(),
    }
}

// =============================================================================
// CONTRACT MODEL
// =============================================================================

/// Shared metadata block for hostk8s.io contracts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractMetadata {
    pub name: String,
}

/// A declared secret field: either a static value or a generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretField {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

/// A single secret declaration within a contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretSpec {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub data: Vec<SecretField>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretContractSpec {
    #[serde(default)]
    pub secrets: Vec<SecretSpec>,
}

/// The `hostk8s.secrets.yaml` contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretContract {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ContractMetadata,
    #[serde(default)]
    pub spec: SecretContractSpec,
}

impl SecretContract {
    /// Load and validate a contract file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::ContractNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let contract: Self = serde_yaml::from_str(&content)?;
        contract.validate()?;
        Ok(contract)
    }

    fn validate(&self) -> Result<()> {
        if self.api_version != CONTRACT_API_VERSION {
            return Err(CoreError::InvalidContract {
                message: format!("secret contract must have apiVersion: {CONTRACT_API_VERSION}"),
            });
        }
        if self.kind != "SecretContract" {
            return Err(CoreError::InvalidContract {
                message: "secret contract must have kind: SecretContract".to_string(),
            });
        }
        Ok(())
    }
}

/// A secret with all field values materialized
#[derive(Debug, Clone)]
pub struct ResolvedSecret {
    pub name: String,
    pub namespace: String,
    pub data: Vec<(String, String)>,
    /// Keys that declared neither `value` nor `generate`
    pub skipped: Vec<String>,
}

impl SecretSpec {
    /// Materialize field values, generating where requested
    pub fn resolve(&self) -> ResolvedSecret {
        let mut data = Vec::new();
        let mut skipped = Vec::new();
        for field in &self.data {
            if let Some(value) = &field.value {
                data.push((field.key.clone(), value.clone()));
            } else if let Some(kind) = &field.generate {
                let length = field.length.unwrap_or(32);
                data.push((field.key.clone(), generate_value(GenerateKind::parse(kind), length)));
            } else {
                skipped.push(field.key.clone());
            }
        }
        ResolvedSecret {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            data,
            skipped,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
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
        - key: api-token
          generate: hex
          length: 32
"#;

    #[test]
    fn test_parse_contract() {
        let contract: SecretContract = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(contract.metadata.name, "sample");
        assert_eq!(contract.spec.secrets.len(), 1);
        assert_eq!(contract.spec.secrets[0].data.len(), 3);
    }

    #[test]
    fn test_load_rejects_wrong_kind() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.replace("SecretContract", "Secret").as_bytes())
            .unwrap();
        let err = SecretContract::load(file.path()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidContract { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SecretContract::load(Path::new("/nope/hostk8s.secrets.yaml")).unwrap_err();
        assert!(matches!(err, CoreError::ContractNotFound { .. }));
    }

    #[test]
    fn test_resolve_generates_values() {
        let contract: SecretContract = serde_yaml::from_str(SAMPLE).unwrap();
        let resolved = contract.spec.secrets[0].resolve();
        assert_eq!(resolved.data[0], ("username".to_string(), "admin".to_string()));
        assert_eq!(resolved.data[1].1.len(), 24);
        assert_eq!(resolved.data[2].1.len(), 32);
        assert!(resolved.data[2].1.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(resolved.skipped.is_empty());
    }

    #[test]
    fn test_resolve_skips_empty_fields() {
        let spec = SecretSpec {
            name: "s".to_string(),
            namespace: "ns".to_string(),
            data: vec![SecretField {
                key: "orphan".to_string(),
                value: None,
                generate: None,
                length: None,
            }],
        };
        let resolved = spec.resolve();
        assert!(resolved.data.is_empty());
        assert_eq!(resolved.skipped, vec!["orphan".to_string()]);
    }

    #[test]
    fn test_generate_kinds() {
        assert_eq!(generate_value(GenerateKind::Token, 16).len(), 16);
        assert_eq!(generate_value(GenerateKind::Hex, 32).len(), 32);

        let uuid = generate_value(GenerateKind::Uuid, 0);
        assert_eq!(uuid.len(), 36);
        assert_eq!(uuid, uuid.to_lowercase());

        let token = generate_value(GenerateKind::Token, 64);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_unknown_generate_kind_falls_back_to_token() {
        assert_eq!(GenerateKind::parse("passphrase"), GenerateKind::Token);
        assert_eq!(GenerateKind::parse("PASSWORD"), GenerateKind::Password);
        assert_eq!(GenerateKind::parse("uuid"), GenerateKind::Uuid);
    }
}
