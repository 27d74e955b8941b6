//! Software stack deployment
//!
//! Applies the root GitOps objects for a stack (GitRepository sources and
//! the bootstrap Kustomization) and hands the rest to Flux. Removal deletes
//! the labeled kustomizations and sources, with a refcount on the shared
//! `flux-system` GitRepository.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hostk8s_core::logging as log;
use hostk8s_core::stack::{self, StackPaths, StackVars};
use hostk8s_core::GitOpsConfig;

use crate::cluster::ClusterManager;
use crate::error::{KubeError, Result};
use crate::flux::FluxManager;
use crate::tools::{Tool, ToolRunner};

/// GitRepository name used for extension stacks
pub const EXTENSION_SOURCE: &str = "extension-stack-system";

const GITREPO_SYNC_TIMEOUT: Duration = Duration::from_secs(60);
const GITREPO_SYNC_INTERVAL: Duration = Duration::from_secs(2);

/// Deploys and removes software stacks through Flux
pub struct StackDeployer {
    root: PathBuf,
    cluster: ClusterManager,
    gitops: GitOpsConfig,
}

impl StackDeployer {
    pub fn new(root: impl Into<PathBuf>, cluster: ClusterManager, gitops: GitOpsConfig) -> Self {
        Self {
            root: root.into(),
            cluster,
            gitops,
        }
    }

    fn runner(&self) -> &ToolRunner {
        self.cluster.runner()
    }

    async fn require_ready_cluster(&self) -> Result<()> {
        let name = &self.cluster.config().cluster_name;
        if !self.cluster.exists().await? {
            return Err(KubeError::ClusterMissing { name: name.clone() });
        }
        self.cluster.ensure_kubeconfig().await?;
        if !self.cluster.is_ready().await? {
            return Err(KubeError::ClusterNotReady { name: name.clone() });
        }
        Ok(())
    }

    /// Deploy a stack, installing Flux first when it is absent
    pub async fn deploy(&self, stack: &str) -> Result<()> {
        self.require_ready_cluster().await?;

        let flux = FluxManager::new(self.runner().clone());
        if !flux.is_installed().await? {
            log::info("[Stack] Flux not found. Installing Flux first");
            flux.install().await?;
        } else {
            log::info("[Stack] Flux is already installed and running");
        }

        let paths = StackPaths::new(&self.root, stack);
        let vars = StackVars::new(&self.gitops, stack);

        if paths.uses_components() {
            self.apply_stack_yaml(
                &paths.source_component_yaml(),
                "Configuring component GitRepository",
                &vars,
            )
            .await?;
        }

        self.apply_stack_yaml(
            &paths.source_stack_yaml(),
            &format!("Configuring GitOps repository for stack: {stack}"),
            &vars,
        )
        .await?;

        if stack::is_extension(stack) {
            log::info("[Stack] Setting up GitOps bootstrap configuration for extension stack");
            let bootstrap = extension_bootstrap(stack);
            if let Ok(out) = self.runner().try_apply_stdin(&bootstrap).await
                && !out.success()
            {
                log::warn("Failed to create extension bootstrap configuration");
                log::debug(out.stderr.trim());
            }
        } else {
            self.apply_stack_yaml(
                &paths.bootstrap_yaml(),
                "Setting up GitOps bootstrap configuration",
                &vars,
            )
            .await?;
        }

        self.wait_for_gitrepository_sync().await?;

        log::success(format!("[Stack] Software stack '{stack}' deployment initiated"));
        log::info("[Stack] Flux will reconcile the stack (check with `hostk8s status`)");
        Ok(())
    }

    /// Apply a stack YAML file, substituting `${VAR}` templates when present
    async fn apply_stack_yaml(
        &self,
        yaml_file: &Path,
        description: &str,
        vars: &StackVars,
    ) -> Result<()> {
        if !yaml_file.exists() {
            log::error(format!("Stack configuration not found: {}", yaml_file.display()));
            let available = StackPaths::available(&self.root);
            if !available.is_empty() {
                log::error("Available stacks:");
                for name in available {
                    log::error(format!("  {name}"));
                }
            }
            return Err(KubeError::StackConfigNotFound {
                path: yaml_file.to_path_buf(),
            });
        }

        log::info(description);

        let mut content = std::fs::read_to_string(yaml_file)?;
        if yaml_file.to_string_lossy().contains("extension/")
            || StackVars::needs_substitution(&content)
        {
            log::debug("[Stack] Processing template variables for stack file");
            content = vars.substitute(&content);
        }

        let out = self.runner().try_apply_stdin(&content).await?;
        if !out.success() {
            log::warn(format!("Failed to apply {description}"));
            log::debug(out.stderr.trim());
        }
        Ok(())
    }

    /// Poll GitRepository Ready conditions, downgrading a timeout to a warning
    async fn wait_for_gitrepository_sync(&self) -> Result<()> {
        log::info("[Stack] Waiting for GitRepository to sync");

        let mut remaining = GITREPO_SYNC_TIMEOUT;
        loop {
            let out = self
                .runner()
                .try_run(
                    Tool::Kubectl,
                    [
                        "get",
                        "gitrepository",
                        "-n",
                        "flux-system",
                        "-o",
                        "jsonpath={.items[*].status.conditions[?(@.type==\"Ready\")].status}",
                    ],
                )
                .await?;
            if out.success() && out.stdout.contains("True") {
                log::info("[Stack] GitRepository synced successfully");
                return Ok(());
            }

            if remaining.is_zero() {
                log::warn("GitRepository sync timed out, but continuing");
                return Ok(());
            }
            tokio::time::sleep(GITREPO_SYNC_INTERVAL).await;
            remaining = remaining.saturating_sub(GITREPO_SYNC_INTERVAL);
        }
    }

    /// Remove a stack's kustomizations and sources
    pub async fn remove(&self, stack: &str) -> Result<()> {
        self.require_ready_cluster().await?;

        let name_only = stack::short_name(stack);
        log::info(format!("[Stack] Checking for stack '{stack}' kustomizations"));

        let label = format!("hostk8s.stack={name_only}");
        let listed = self
            .runner()
            .try_run(
                Tool::Kubectl,
                [
                    "get",
                    "kustomizations",
                    "-n",
                    "flux-system",
                    "-l",
                    label.as_str(),
                    "--no-headers",
                    "-o",
                    "custom-columns=NAME:.metadata.name",
                ],
            )
            .await?;
        let found = listed.success() && !listed.stdout.trim().is_empty();
        if !found {
            log::info(format!("[Stack] No kustomizations found for stack '{stack}'"));
            log::info("[Stack] Nothing to remove - stack is already clean");
            return Ok(());
        }

        log::info(format!(
            "[Stack] Found kustomizations for stack '{stack}' - proceeding with removal"
        ));

        // Bootstrap first so Flux stops recreating the rest
        let bootstrap = format!("bootstrap-{name_only}");
        let exists = self
            .runner()
            .try_run(
                Tool::Kubectl,
                [
                    "get",
                    "kustomization",
                    bootstrap.as_str(),
                    "-n",
                    "flux-system",
                    "--no-headers",
                ],
            )
            .await?;
        if exists.success() {
            log::info(format!("[Stack] Removing bootstrap kustomization: {bootstrap}"));
            let _ = self
                .runner()
                .try_run(
                    Tool::Kubectl,
                    ["delete", "kustomization", bootstrap.as_str(), "-n", "flux-system"],
                )
                .await;
        }

        log::info(format!("[Stack] Removing all kustomizations for stack '{stack}'"));
        let _ = self
            .runner()
            .try_run(
                Tool::Kubectl,
                ["delete", "kustomizations", "-n", "flux-system", "-l", label.as_str()],
            )
            .await;

        if stack::is_extension(stack) {
            log::info("[Stack] Cleaning up extension GitRepository");
            let _ = self
                .runner()
                .try_run(
                    Tool::Kubectl,
                    ["delete", "gitrepository", EXTENSION_SOURCE, "-n", "flux-system"],
                )
                .await;
        } else {
            let source = format!("flux-system-{name_only}");
            log::info(format!(
                "[Stack] Cleaning up stack-specific GitRepository: {source}"
            ));
            let _ = self
                .runner()
                .try_run(
                    Tool::Kubectl,
                    ["delete", "gitrepository", source.as_str(), "-n", "flux-system"],
                )
                .await;

            self.cleanup_shared_source().await?;
        }

        log::success(format!("[Stack] Software stack '{stack}' removal initiated"));
        log::info("[Stack] Flux will complete the cleanup automatically (may take 1-2 minutes)");
        Ok(())
    }

    /// Drop the shared flux-system source once no component kustomizations remain
    async fn cleanup_shared_source(&self) -> Result<()> {
        log::info("[Stack] Checking if flux-system GitRepository is still needed");
        let remaining = self
            .runner()
            .try_run(
                Tool::Kubectl,
                [
                    "get",
                    "kustomizations",
                    "-n",
                    "flux-system",
                    "-l",
                    "hostk8s.type=component",
                    "--no-headers",
                ],
            )
            .await?;
        let count = if remaining.success() {
            remaining.stdout.lines().filter(|l| !l.trim().is_empty()).count()
        } else {
            0
        };

        if count == 0 {
            log::info("[Stack] No component kustomizations remaining, removing shared GitRepository");
            let _ = self
                .runner()
                .try_run(
                    Tool::Kubectl,
                    ["delete", "gitrepository", "flux-system", "-n", "flux-system"],
                )
                .await;
        } else {
            log::info(format!(
                "[Stack] Found {count} component kustomization(s) remaining, keeping shared GitRepository"
            ));
        }
        Ok(())
    }
}

/// Bootstrap Kustomization synthesized for extension stacks
fn extension_bootstrap(stack: &str) -> String {
    format!(
        r#"apiVersion: kustomize.toolkit.fluxcd.io/v1
kind: Kustomization
metadata:
  name: bootstrap-stack
  namespace: flux-system
spec:
  interval: 1m
  retryInterval: 30s
  timeout: 5m
  sourceRef:
    kind: GitRepository
    name: {EXTENSION_SOURCE}
  path: ./software/stacks/{stack}
  targetNamespace: flux-system
  prune: true
  wait: false
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_bootstrap_points_at_extension_source() {
        let yaml = extension_bootstrap("extension/my-stack");
        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(doc["metadata"]["name"], "bootstrap-stack");
        assert_eq!(doc["spec"]["sourceRef"]["name"], EXTENSION_SOURCE);
        assert_eq!(doc["spec"]["path"], "./software/stacks/extension/my-stack");
        assert_eq!(doc["spec"]["prune"], true);
    }
}
