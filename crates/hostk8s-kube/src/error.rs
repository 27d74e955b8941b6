//! Error types for hostk8s-kube

use std::path::PathBuf;

use thiserror::Error;

/// Result type for hostk8s-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur during cluster and GitOps operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// A required external tool is not installed
    #[error("{tool} not found in PATH\nHint: {hint}")]
    ToolMissing { tool: String, hint: String },

    /// An external tool exited non-zero on a checked run
    #[error("{tool} {args} failed{}", format_stderr(.stderr))]
    ToolFailed {
        tool: String,
        args: String,
        stderr: String,
    },

    /// No kubeconfig could be located
    #[error(
        "no kubeconfig found at '{searched}'\nHint: Is the cluster running? Try `hostk8s start`"
    )]
    KubeconfigNotFound { searched: String },

    /// The named cluster does not exist
    #[error("cluster '{name}' does not exist\nHint: Create it first with `hostk8s start`")]
    ClusterMissing { name: String },

    /// The named cluster is already running
    #[error("cluster '{name}' already exists\nHint: Use `hostk8s restart` to recreate it")]
    ClusterExists { name: String },

    /// The cluster exists but the API server is not answering
    #[error("cluster '{name}' is not ready")]
    ClusterNotReady { name: String },

    /// Node readiness polling exhausted its attempts
    #[error("nodes not ready after {attempts} attempts")]
    NodesNotReady { attempts: u32 },

    /// Flux is required but not installed in the cluster
    #[error("Flux is not installed in this cluster\nHint: Enable Flux with `hostk8s up <stack>`")]
    FluxNotInstalled,

    /// A stack configuration file is missing
    #[error("stack configuration not found: {}", path.display())]
    StackConfigNotFound { path: PathBuf },

    /// The named app has no directory under software/apps/
    #[error("app not found: {app}")]
    AppNotFound { app: String },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Storage contract realization failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Contract error from hostk8s-core
    #[error(transparent)]
    Core(#[from] hostk8s_core::CoreError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}
