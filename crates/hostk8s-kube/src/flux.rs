//! Flux GitOps operations
//!
//! Installs the Flux controllers and drives reconciliation through the
//! `flux` CLI. Dependency ordering between kustomizations is Flux's job;
//! this module only pokes sources and kustomizations and reads back their
//! Ready conditions.

use hostk8s_core::logging as log;
use serde::{Deserialize, Serialize};

use crate::error::{KubeError, Result};
use crate::tools::{Tool, ToolRunner};

/// The kustomization every stack bootstrap creates
pub const BOOTSTRAP_KUSTOMIZATION: &str = "bootstrap-stack";

/// Ready state of a Flux source or kustomization
#[derive(Debug, Clone, Serialize)]
pub struct FluxResourceStatus {
    pub name: String,
    /// `None` when no Ready condition has been reported yet
    pub ready: Option<bool>,
    pub suspended: bool,
    pub message: String,
}

/// Outcome of a best-effort bulk operation
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: Vec<String>,
}

impl BulkOutcome {
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<FluxObject>,
}

#[derive(Debug, Deserialize)]
struct FluxObject {
    metadata: ObjectMeta,
    #[serde(default)]
    spec: ObjectSpec,
    #[serde(default)]
    status: ObjectStatus,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectSpec {
    #[serde(default)]
    suspend: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectStatus {
    #[serde(default)]
    conditions: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
    #[serde(default)]
    message: String,
}

impl FluxObject {
    fn into_status(self) -> FluxResourceStatus {
        let ready = self
            .status
            .conditions
            .iter()
            .find(|c| c.kind == "Ready");
        FluxResourceStatus {
            name: self.metadata.name,
            ready: ready.map(|c| c.status == "True"),
            suspended: self.spec.suspend,
            message: ready.map(|c| c.message.clone()).unwrap_or_default(),
        }
    }
}

/// Drives Flux through its CLI
pub struct FluxManager {
    runner: ToolRunner,
}

impl FluxManager {
    pub fn new(runner: ToolRunner) -> Self {
        Self { runner }
    }

    /// Whether the flux CLI is on PATH
    pub async fn cli_available(&self) -> bool {
        self.runner.available(Tool::Flux).await
    }

    /// Whether the Flux controllers run in the cluster
    pub async fn is_installed(&self) -> Result<bool> {
        let out = self
            .runner
            .try_run(
                Tool::Kubectl,
                ["get", "deployment", "-n", "flux-system", "source-controller"],
            )
            .await?;
        Ok(out.success())
    }

    /// Install the Flux controllers and wait for them to come up
    pub async fn install(&self) -> Result<()> {
        if !self.cli_available().await {
            return Err(KubeError::ToolMissing {
                tool: Tool::Flux.binary().to_string(),
                hint: Tool::Flux.install_hint().to_string(),
            });
        }

        log::info("[Flux] Installing Flux controllers");
        self.runner
            .run(
                Tool::Flux,
                [
                    "install",
                    "--components-extra=image-reflector-controller,image-automation-controller",
                    "--network-policy=false",
                    "--watch-all-namespaces=true",
                ],
            )
            .await?;

        log::info("[Flux] Waiting for Flux controllers to be ready");
        let wait = self
            .runner
            .try_run(
                Tool::Kubectl,
                [
                    "wait",
                    "--for=condition=available",
                    "deployment",
                    "-l",
                    "app.kubernetes.io/part-of=flux",
                    "-n",
                    "flux-system",
                    "--timeout=600s",
                ],
            )
            .await?;
        if !wait.success() {
            log::warn("Flux controllers still initializing, continuing setup...");
        }
        Ok(())
    }

    /// Force reconciliation of one GitRepository
    pub async fn sync_repository(&self, name: &str) -> Result<()> {
        log::info(format!("Syncing GitRepository: {name}"));
        self.runner
            .run(Tool::Flux, ["reconcile", "source", "git", name])
            .await?;
        log::success(format!("Successfully synced {name}"));
        Ok(())
    }

    /// Force reconciliation of one Kustomization
    pub async fn sync_kustomization(&self, name: &str, with_source: bool) -> Result<()> {
        log::info(format!("Syncing Kustomization: {name}"));
        let mut args = vec!["reconcile", "kustomization", name];
        if with_source {
            args.push("--with-source");
        }
        self.runner.run(Tool::Flux, args).await?;
        log::success(format!("Successfully synced {name}"));
        Ok(())
    }

    /// Sync a stack: the flux-system source, then the bootstrap kustomization
    pub async fn sync_stack(&self, stack: &str) -> Result<()> {
        log::info(format!("Syncing stack: {stack}"));

        log::info("  Syncing flux-system repository");
        self.runner
            .run(Tool::Flux, ["reconcile", "source", "git", "flux-system"])
            .await?;

        log::info(format!("  Syncing {BOOTSTRAP_KUSTOMIZATION} kustomization"));
        self.runner
            .run(
                Tool::Flux,
                [
                    "reconcile",
                    "kustomization",
                    BOOTSTRAP_KUSTOMIZATION,
                    "--with-source",
                ],
            )
            .await?;
        log::success(format!("Successfully synced stack: {stack}"));
        Ok(())
    }

    /// All GitRepository names known to Flux
    pub async fn git_repositories(&self) -> Result<Vec<String>> {
        let out = self
            .runner
            .try_run(Tool::Flux, ["get", "sources", "git", "--no-header"])
            .await?;
        if !out.success() {
            return Ok(Vec::new());
        }
        Ok(first_columns(&out.stdout))
    }

    /// Kustomizations that drive stacks (`bootstrap-stack` or `*stack`)
    pub async fn stack_kustomizations(&self) -> Result<Vec<String>> {
        let out = self
            .runner
            .try_run(Tool::Flux, ["get", "kustomizations", "--no-header"])
            .await?;
        if !out.success() {
            return Ok(Vec::new());
        }
        Ok(first_columns(&out.stdout)
            .into_iter()
            .filter(|name| name == BOOTSTRAP_KUSTOMIZATION || name.ends_with("stack"))
            .collect())
    }

    /// Reconcile every GitRepository, then every stack kustomization
    pub async fn sync_all(&self) -> Result<BulkOutcome> {
        log::info("Syncing all GitRepositories and stack kustomizations...");

        let repos = self.git_repositories().await?;
        if repos.is_empty() {
            log::warn("No GitRepositories found");
            return Ok(BulkOutcome::default());
        }

        let mut outcome = BulkOutcome::default();
        for repo in &repos {
            log::info(format!("  Syncing repository: {repo}"));
            match self
                .runner
                .try_run(Tool::Flux, ["reconcile", "source", "git", repo.as_str()])
                .await
            {
                Ok(out) if out.success() => outcome.succeeded += 1,
                _ => outcome.failed.push(repo.clone()),
            }
        }

        for kust in self.stack_kustomizations().await? {
            log::info(format!("  Syncing stack kustomization: {kust}"));
            match self
                .runner
                .try_run(
                    Tool::Flux,
                    ["reconcile", "kustomization", kust.as_str(), "--with-source"],
                )
                .await
            {
                Ok(out) if out.success() => outcome.succeeded += 1,
                _ => outcome.failed.push(kust),
            }
        }

        if !outcome.all_ok() {
            log::error(format!("Failed to sync: {}", outcome.failed.join(", ")));
        } else {
            log::success("All repositories and stack kustomizations synced successfully");
        }
        Ok(outcome)
    }

    /// Suspend every GitRepository source
    pub async fn suspend_all(&self) -> Result<BulkOutcome> {
        self.toggle_all("suspend", "suspended").await
    }

    /// Resume every GitRepository source
    pub async fn resume_all(&self) -> Result<BulkOutcome> {
        self.toggle_all("resume", "resumed").await
    }

    async fn toggle_all(&self, verb: &str, past: &str) -> Result<BulkOutcome> {
        let repos = self.git_repositories().await?;
        if repos.is_empty() {
            log::warn("No GitRepository sources found");
            return Ok(BulkOutcome::default());
        }

        let mut outcome = BulkOutcome::default();
        for repo in repos {
            match self
                .runner
                .try_run(Tool::Flux, [verb, "source", "git", repo.as_str()])
                .await
            {
                Ok(out) if out.success() => outcome.succeeded += 1,
                _ => {
                    log::error(format!("  Failed to {verb} {repo}"));
                    outcome.failed.push(repo);
                }
            }
        }

        if outcome.all_ok() {
            log::success(format!(
                "Successfully {past} {} GitRepository sources",
                outcome.succeeded
            ));
        }
        Ok(outcome)
    }

    /// Tail the Flux controller logs, optionally scoped to one kustomization
    pub async fn logs(&self, kustomization: Option<&str>) -> Result<()> {
        let mut args = vec!["logs", "--follow", "--tail", "20"];
        if let Some(name) = kustomization {
            args.extend(["--kind", "Kustomization", "--name", name]);
        }
        self.runner.run(Tool::Flux, args).await?;
        Ok(())
    }

    /// Typed GitRepository statuses from the API
    pub async fn git_repository_status(&self) -> Result<Vec<FluxResourceStatus>> {
        self.object_status("gitrepositories").await
    }

    /// Typed Kustomization statuses from the API
    pub async fn kustomization_status(&self) -> Result<Vec<FluxResourceStatus>> {
        self.object_status("kustomizations").await
    }

    async fn object_status(&self, kind: &str) -> Result<Vec<FluxResourceStatus>> {
        let out = self
            .runner
            .try_run(
                Tool::Kubectl,
                ["get", kind, "-n", "flux-system", "-o", "json"],
            )
            .await?;
        if !out.success() {
            return Ok(Vec::new());
        }
        let list: ObjectList = serde_json::from_str(&out.stdout)?;
        Ok(list.items.into_iter().map(FluxObject::into_status).collect())
    }
}

fn first_columns(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_columns_takes_names() {
        let out = "flux-system\tTrue\tstored artifact\nextension-stack-system True ok\n";
        assert_eq!(
            first_columns(out),
            vec!["flux-system".to_string(), "extension-stack-system".to_string()]
        );
    }

    #[test]
    fn ready_condition_parsed_from_json() {
        let json = r#"{
            "items": [{
                "metadata": {"name": "flux-system"},
                "spec": {"suspend": false},
                "status": {"conditions": [
                    {"type": "Ready", "status": "True", "message": "stored artifact for revision 'main@sha1:abc'"}
                ]}
            }]
        }"#;
        let list: ObjectList = serde_json::from_str(json).unwrap();
        let status = list.items.into_iter().next().unwrap().into_status();
        assert_eq!(status.name, "flux-system");
        assert_eq!(status.ready, Some(true));
        assert!(!status.suspended);
        assert!(status.message.contains("stored artifact"));
    }

    #[test]
    fn missing_conditions_mean_unknown() {
        let json = r#"{"items": [{"metadata": {"name": "pending"}}]}"#;
        let list: ObjectList = serde_json::from_str(json).unwrap();
        let status = list.items.into_iter().next().unwrap().into_status();
        assert_eq!(status.ready, None);
    }
}
