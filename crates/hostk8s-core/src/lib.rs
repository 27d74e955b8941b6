//! HostK8s Core - foundational types for the HostK8s development platform
//!
//! This crate provides the types shared by the HostK8s tooling:
//! - `Environment`: `.env` + process environment configuration
//! - `SecretContract` / `StorageContract`: the hostk8s.io/v1 contract conventions
//! - `StackVars`: `${VAR}` substitution for stack manifests
//! - Secret value generation (password/token/hex/uuid)

pub mod apps;
pub mod config;
pub mod error;
pub mod logging;
pub mod secrets;
pub mod stack;
pub mod storage;

pub use apps::{DeploymentType, app_deployment_type, list_available_apps};
pub use config::{ClusterConfig, Environment, GitOpsConfig};
pub use error::{CoreError, Result};
pub use secrets::{GenerateKind, ResolvedSecret, SecretContract, SecretSpec, generate_value};
pub use stack::{StackPaths, StackVars};
pub use storage::{DirectorySpec, StorageContract};
