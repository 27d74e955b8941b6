//! Error types for hostk8s-vault

use thiserror::Error;

/// Result type for hostk8s-vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors that can occur talking to Vault or writing manifests
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VaultError {
    /// Vault did not answer the health probe
    #[error(
        "cannot connect to Vault at {addr}\nHint: Make sure Vault is running and VAULT_ADDR/VAULT_TOKEN are set correctly"
    )]
    Unreachable { addr: String },

    /// Vault answered with an unexpected status
    #[error("Vault request to '{path}' failed: HTTP {status}{}", format_body(.body))]
    Api {
        status: u16,
        path: String,
        body: String,
    },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Contract error from hostk8s-core
    #[error(transparent)]
    Core(#[from] hostk8s_core::CoreError),

    /// Not every secret in the contract could be processed
    #[error("only {processed}/{total} secrets processed successfully")]
    Incomplete { processed: usize, total: usize },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for VaultError {
    fn from(e: serde_yaml::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}
