//! HostK8s Kube - cluster and GitOps operations for HostK8s
//!
//! This crate provides:
//! - **Tool Runners**: `kind`/`kubectl`/`flux`/`helm`/`docker` invocation with
//!   kubeconfig injection and typed failures
//! - **Cluster Lifecycle**: Kind cluster create/delete, local registry,
//!   node readiness
//! - **Flux Operations**: install, reconcile, suspend/resume, typed status
//! - **Stack Deployment**: GitOps source and bootstrap application
//! - **Storage Contracts**: StorageClass/PersistentVolume realization
//! - **Secret Application**: direct Secret apply when Vault is disabled
//! - **Status Collection**: typed cluster snapshot for the status command

pub mod addons;
pub mod apps;
pub mod cluster;
pub mod error;
pub mod flux;
pub mod kubeconfig;
pub mod secret_apply;
pub mod stack;
pub mod status;
pub mod storage;
pub mod tools;

pub use addons::{GatewayApiAddon, IngressAddon, MetricsAddon, VaultAddon};
pub use apps::AppDeployer;
pub use cluster::{ClusterManager, REGISTRY_CONTAINER};
pub use error::{KubeError, Result};
pub use flux::{BulkOutcome, FluxManager, FluxResourceStatus};
pub use secret_apply::SecretApplier;
pub use stack::StackDeployer;
pub use status::{AppStatus, ClusterStatus, NodeStatus, StatusCollector};
pub use storage::StorageManager;
pub use tools::{Tool, ToolOutput, ToolRunner};
