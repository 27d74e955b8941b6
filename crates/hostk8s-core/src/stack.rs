//! Stack directory conventions and manifest variable substitution
//!
//! A stack is a directory under `software/stacks/<name>` bundling a Flux
//! GitRepository source and ordered Kustomizations. Extension stacks live
//! under `software/stacks/extension/<name>` and reference an external
//! repository. Stack YAML files may contain `${VAR}` placeholders that are
//! expanded before `kubectl apply`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::config::GitOpsConfig;

/// Prefix marking a stack that lives in an external repository
pub const EXTENSION_PREFIX: &str = "extension/";

/// The last path segment of a stack name (`foundation/elastic` -> `elastic`)
pub fn short_name(stack: &str) -> &str {
    stack.rsplit('/').next().unwrap_or(stack)
}

/// Whether the stack is an extension stack
pub fn is_extension(stack: &str) -> bool {
    stack.starts_with(EXTENSION_PREFIX)
}

/// Well-known file locations for a stack within a project root
#[derive(Debug, Clone)]
pub struct StackPaths {
    root: PathBuf,
    stack: String,
}

impl StackPaths {
    pub fn new(root: impl Into<PathBuf>, stack: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            stack: stack.into(),
        }
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join("software/stacks").join(&self.stack)
    }

    pub fn stack_yaml(&self) -> PathBuf {
        self.dir().join("stack.yaml")
    }

    pub fn secrets_contract(&self) -> PathBuf {
        self.dir().join("hostk8s.secrets.yaml")
    }

    pub fn storage_contract(&self) -> PathBuf {
        self.dir().join("hostk8s.storage.yaml")
    }

    pub fn external_secrets_manifest(&self) -> PathBuf {
        self.dir().join("manifests/external-secrets.yaml")
    }

    /// Shared bootstrap Kustomization applied for non-extension stacks
    pub fn bootstrap_yaml(&self) -> PathBuf {
        self.root.join("software/stacks/bootstrap.yaml")
    }

    /// GitRepository template for the stack itself
    pub fn source_stack_yaml(&self) -> PathBuf {
        self.root.join("software/stacks/source-stack.yaml")
    }

    /// GitRepository template for the shared components repository
    pub fn source_component_yaml(&self) -> PathBuf {
        self.root.join("software/stacks/source-component.yaml")
    }

    /// Whether the stack references shared components
    pub fn uses_components(&self) -> bool {
        std::fs::read_to_string(self.stack_yaml())
            .map(|content| content.contains("./software/components/"))
            .unwrap_or(false)
    }

    /// List stack directory names under `software/stacks/`
    pub fn available(root: &Path) -> Vec<String> {
        let stacks_dir = root.join("software/stacks");
        let Ok(entries) = std::fs::read_dir(stacks_dir) else {
            return Vec::new();
        };
        let mut stacks: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        stacks.sort();
        stacks
    }
}

/// Variables substituted into stack manifest templates
#[derive(Debug, Clone)]
pub struct StackVars {
    pub repo_name: String,
    pub gitops_repo: String,
    pub gitops_branch: String,
    pub software_stack: String,
    pub software_stack_path: String,
    pub components_repo: String,
    pub components_branch: String,
}

impl StackVars {
    pub fn new(gitops: &GitOpsConfig, stack: &str) -> Self {
        Self {
            repo_name: gitops.repo_name().to_string(),
            gitops_repo: gitops.gitops_repo.clone(),
            gitops_branch: gitops.gitops_branch.clone(),
            software_stack: short_name(stack).to_string(),
            software_stack_path: stack.to_string(),
            components_repo: gitops.components_repo.clone(),
            components_branch: gitops.components_branch.clone(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "REPO_NAME" => Some(&self.repo_name),
            "GITOPS_REPO" => Some(&self.gitops_repo),
            "GITOPS_BRANCH" => Some(&self.gitops_branch),
            "SOFTWARE_STACK" => Some(&self.software_stack),
            "SOFTWARE_STACK_PATH" => Some(&self.software_stack_path),
            "COMPONENTS_REPO" => Some(&self.components_repo),
            "COMPONENTS_BRANCH" => Some(&self.components_branch),
            _ => None,
        }
    }

    /// Expand `${VAR}` placeholders, leaving unknown variables untouched
    pub fn substitute(&self, input: &str) -> String {
        static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        let re = PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

        re.replace_all(input, |caps: &Captures| {
            self.lookup(&caps[1])
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
    }

    /// Whether a manifest needs substitution before applying
    pub fn needs_substitution(content: &str) -> bool {
        content.contains("${")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> StackVars {
        StackVars {
            repo_name: "hostk8s".to_string(),
            gitops_repo: "https://example.com/acme/hostk8s".to_string(),
            gitops_branch: "main".to_string(),
            software_stack: "elastic".to_string(),
            software_stack_path: "foundation/elastic".to_string(),
            components_repo: "https://example.com/acme/components".to_string(),
            components_branch: "dev".to_string(),
        }
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("sample"), "sample");
        assert_eq!(short_name("foundation/elastic"), "elastic");
        assert_eq!(short_name("extension/my-stack"), "my-stack");
    }

    #[test]
    fn test_is_extension() {
        assert!(is_extension("extension/my-stack"));
        assert!(!is_extension("sample"));
    }

    #[test]
    fn test_substitution() {
        let out = vars().substitute("path: ./software/stacks/${SOFTWARE_STACK_PATH}\nbranch: ${GITOPS_BRANCH}");
        assert_eq!(out, "path: ./software/stacks/foundation/elastic\nbranch: main");
    }

    #[test]
    fn test_unknown_vars_left_intact() {
        let out = vars().substitute("value: ${NOT_A_STACK_VAR}");
        assert_eq!(out, "value: ${NOT_A_STACK_VAR}");
    }

    #[test]
    fn test_needs_substitution() {
        assert!(StackVars::needs_substitution("url: ${GITOPS_REPO}"));
        assert!(!StackVars::needs_substitution("url: https://example.com"));
    }

    #[test]
    fn test_stack_paths() {
        let paths = StackPaths::new("/work", "sample");
        assert_eq!(paths.dir(), Path::new("/work/software/stacks/sample"));
        assert_eq!(
            paths.secrets_contract(),
            Path::new("/work/software/stacks/sample/hostk8s.secrets.yaml")
        );
        assert_eq!(
            paths.external_secrets_manifest(),
            Path::new("/work/software/stacks/sample/manifests/external-secrets.yaml")
        );
    }
}
