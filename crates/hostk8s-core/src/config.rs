//! Environment configuration
//!
//! HostK8s is configured entirely through environment variables, optionally
//! seeded from a `.env` file at the project root. Process environment always
//! wins over `.env` values so that `KIND_CONFIG=custom hostk8s start` behaves
//! the same as the old Make exports.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Default GitOps repository used when GITOPS_REPO is unset
pub const DEFAULT_GITOPS_REPO: &str = "https://community.opengroup.org/danielscholl/hostk8s";

/// Merged view of process environment and a `.env` file
#[derive(Debug, Clone, Default)]
pub struct Environment {
    file_vars: HashMap<String, String>,
}

impl Environment {
    /// Load `.env` from the current directory, tolerating its absence
    pub fn load() -> Self {
        Self::load_from(Path::new(".env"))
    }

    /// Load a specific `.env` file, tolerating its absence
    pub fn load_from(path: &Path) -> Self {
        let mut file_vars = HashMap::new();
        if let Ok(content) = std::fs::read_to_string(path) {
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let Some((key, value)) = line.split_once('=') else {
                    continue;
                };
                // Inline comments end the value
                let value = value.split('#').next().unwrap_or("");
                let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                file_vars.insert(key.trim().to_string(), value.to_string());
            }
        }
        Self { file_vars }
    }

    /// Get a variable: process environment first, then the `.env` file
    pub fn get(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| self.file_vars.get(key).cloned())
    }

    /// Get a variable with a default value
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// `true` when the variable is set to "true" (trimmed, case-insensitive)
    pub fn flag(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Addon flag supporting both `NAME_ENABLED` and legacy `ENABLE_NAME`
    pub fn addon_flag(&self, name: &str) -> bool {
        self.flag(&format!("{name}_ENABLED")) || self.flag(&format!("ENABLE_{name}"))
    }
}

/// Cluster-level configuration resolved from the environment
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub cluster_name: String,
    pub k8s_version: String,
    pub kubeconfig_path: PathBuf,
    pub kind_config: Option<String>,
    pub registry_port: u16,

    pub metallb_enabled: bool,
    pub ingress_enabled: bool,
    pub registry_enabled: bool,
    pub metrics_enabled: bool,
    pub vault_enabled: bool,
    pub flux_enabled: bool,
}

impl ClusterConfig {
    pub fn from_env(env: &Environment) -> Result<Self> {
        let registry_port = env
            .get_or("REGISTRY_PORT", "5002")
            .trim()
            .parse()
            .unwrap_or(5002);

        Ok(Self {
            cluster_name: env.get_or("CLUSTER_NAME", "hostk8s"),
            k8s_version: env.get_or("K8S_VERSION", "v1.34.0"),
            kubeconfig_path: PathBuf::from(env.get_or("KUBECONFIG_PATH", "data/kubeconfig/config")),
            kind_config: env.get("KIND_CONFIG").filter(|v| !v.is_empty()),
            registry_port,
            metallb_enabled: env.addon_flag("METALLB"),
            // Ingress is on by default; only INGRESS_DISABLED turns it off
            ingress_enabled: !env.flag("INGRESS_DISABLED"),
            registry_enabled: env.addon_flag("REGISTRY"),
            metrics_enabled: !env.flag("METRICS_DISABLED"),
            vault_enabled: env.addon_flag("VAULT"),
            flux_enabled: env.addon_flag("FLUX"),
        })
    }

    /// The Docker container name of the control plane node
    pub fn control_plane_container(&self) -> String {
        format!("{}-control-plane", self.cluster_name)
    }
}

/// GitOps repository configuration resolved from the environment
#[derive(Debug, Clone)]
pub struct GitOpsConfig {
    pub gitops_repo: String,
    pub gitops_branch: String,
    pub components_repo: String,
    pub components_branch: String,
}

impl GitOpsConfig {
    pub fn from_env(env: &Environment) -> Self {
        let gitops_repo = env.get_or("GITOPS_REPO", DEFAULT_GITOPS_REPO);
        let gitops_branch = env.get_or("GITOPS_BRANCH", "main");
        Self {
            components_repo: env.get_or("COMPONENTS_REPO", &gitops_repo),
            components_branch: env.get_or("COMPONENTS_BRANCH", &gitops_branch),
            gitops_repo,
            gitops_branch,
        }
    }

    /// Basename of the repository URL without a trailing `.git`
    pub fn repo_name(&self) -> &str {
        let trimmed = self.gitops_repo.trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_from(content: &str) -> Environment {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        Environment::load_from(file.path())
    }

    #[test]
    fn test_env_file_parsing() {
        let env = env_from(
            "# comment\nCLUSTER_NAME=demo\nK8S_VERSION = v1.30.0 # inline comment\nQUOTED='hello'\n\nBROKEN_LINE\n",
        );
        assert_eq!(env.get("CLUSTER_NAME").as_deref(), Some("demo"));
        assert_eq!(env.get("K8S_VERSION").as_deref(), Some("v1.30.0"));
        assert_eq!(env.get("QUOTED").as_deref(), Some("hello"));
        assert_eq!(env.get("BROKEN_LINE"), None);
    }

    #[test]
    fn test_missing_env_file_is_empty() {
        let env = Environment::load_from(Path::new("/nonexistent/.env"));
        assert_eq!(env.get("CLUSTER_NAME"), None);
        assert_eq!(env.get_or("CLUSTER_NAME", "hostk8s"), "hostk8s");
    }

    #[test]
    fn test_addon_flags_both_forms() {
        let env = env_from("REGISTRY_ENABLED=true\nENABLE_VAULT= true \nENABLE_FLUX=false\n");
        assert!(env.addon_flag("REGISTRY"));
        assert!(env.addon_flag("VAULT"));
        assert!(!env.addon_flag("FLUX"));
        assert!(!env.addon_flag("METALLB"));
    }

    #[test]
    fn test_cluster_config_defaults() {
        let env = env_from("");
        let config = ClusterConfig::from_env(&env).unwrap();
        assert_eq!(config.cluster_name, "hostk8s");
        assert_eq!(config.registry_port, 5002);
        assert!(config.ingress_enabled);
        assert!(config.metrics_enabled);
        assert!(!config.vault_enabled);
        assert_eq!(config.control_plane_container(), "hostk8s-control-plane");
    }

    #[test]
    fn test_repo_name() {
        let mut gitops = GitOpsConfig {
            gitops_repo: "https://github.com/acme/platform.git".to_string(),
            gitops_branch: "main".to_string(),
            components_repo: String::new(),
            components_branch: String::new(),
        };
        assert_eq!(gitops.repo_name(), "platform");

        gitops.gitops_repo = "https://community.opengroup.org/danielscholl/hostk8s".to_string();
        assert_eq!(gitops.repo_name(), "hostk8s");
    }
}
