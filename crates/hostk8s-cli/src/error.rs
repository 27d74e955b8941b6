//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use miette::Diagnostic;
use thiserror::Error;

use hostk8s_kube::KubeError;
use hostk8s_vault::VaultError;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Cluster lifecycle or access failure
    #[error("{message}")]
    #[diagnostic(code(hostk8s::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A required external tool is missing or failed
    #[error("{message}")]
    #[diagnostic(code(hostk8s::cli::tool))]
    Tool {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Secret pipeline failure (Vault or direct apply)
    #[error(transparent)]
    #[diagnostic(code(hostk8s::cli::secrets))]
    Secrets(#[from] VaultError),

    /// Cluster/GitOps operation failure
    #[error(transparent)]
    #[diagnostic(code(hostk8s::cli::kube))]
    Kube(#[from] KubeError),

    /// Configuration or contract failure
    #[error(transparent)]
    #[diagnostic(code(hostk8s::cli::config))]
    Core(#[from] hostk8s_core::CoreError),

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(hostk8s::cli::io))]
    Io { message: String },

    /// Invalid arguments beyond what clap can express
    #[error("{message}")]
    #[diagnostic(code(hostk8s::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(hostk8s::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Tool { .. } => exit_codes::TOOL_ERROR,
            CliError::Secrets(_) => exit_codes::SECRET_ERROR,
            CliError::Kube(e) => match e {
                KubeError::ToolMissing { .. } | KubeError::ToolFailed { .. } => {
                    exit_codes::TOOL_ERROR
                }
                KubeError::ClusterMissing { .. }
                | KubeError::ClusterExists { .. }
                | KubeError::ClusterNotReady { .. }
                | KubeError::NodesNotReady { .. } => exit_codes::CLUSTER_ERROR,
                KubeError::Io(_) => exit_codes::IO_ERROR,
                _ => exit_codes::ERROR,
            },
            CliError::Core(_) => exit_codes::ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a cluster error
    pub fn cluster(message: impl Into<String>) -> Self {
        Self::Cluster {
            message: message.into(),
            help: None,
        }
    }

    /// Create a cluster error with help text
    pub fn cluster_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Cluster {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a tool error with its install hint
    pub fn tool(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Tool {
            message: message.into(),
            help: Some(hint.into()),
        }
    }

    /// Create a usage error
    pub fn usage(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a passthrough error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::cluster("down").exit_code(), exit_codes::CLUSTER_ERROR);
        assert_eq!(
            CliError::tool("kind not found", "brew install kind").exit_code(),
            exit_codes::TOOL_ERROR
        );
        assert_eq!(
            CliError::usage("stack required", "pass a stack name").exit_code(),
            exit_codes::USAGE_ERROR
        );
        assert_eq!(
            CliError::from(KubeError::FluxNotInstalled).exit_code(),
            exit_codes::ERROR
        );
        assert_eq!(
            CliError::from(KubeError::ClusterMissing {
                name: "hostk8s".to_string()
            })
            .exit_code(),
            exit_codes::CLUSTER_ERROR
        );
    }
}
