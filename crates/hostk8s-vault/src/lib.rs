//! Vault secret management for HostK8s
//!
//! Bridges stack secret contracts to the dev-mode Vault addon:
//!
//! - **Client**: minimal KV v2 HTTP client (health, read, write, list)
//! - **External**: ExternalSecret manifest generation for the External
//!   Secrets Operator
//! - **Pipeline**: contract-driven add/remove/list of stack secrets

pub mod client;
pub mod error;
pub mod external;
pub mod pipeline;

pub use client::{VaultClient, DEFAULT_VAULT_ADDR, DEFAULT_VAULT_TOKEN};
pub use error::{Result, VaultError};
pub use external::ExternalSecret;
pub use pipeline::SecretPipeline;
