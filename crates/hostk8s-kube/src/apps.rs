//! Individual application deployment
//!
//! Deploys single apps from `software/apps/<name>/`, dispatching on what the
//! app directory contains: a Helm chart, a kustomization, or a plain
//! `app.yaml`.

use std::path::PathBuf;

use hostk8s_core::apps::{self, DeploymentType};
use hostk8s_core::logging as log;

use crate::error::{KubeError, Result};
use crate::tools::{Tool, ToolRunner};

/// Namespaces that are never cleaned up
const PROTECTED_NAMESPACES: &[&str] = &[
    "default",
    "kube-system",
    "kube-public",
    "kube-node-lease",
    "flux-system",
    "hostk8s",
];

/// Deploys and removes individual applications
pub struct AppDeployer {
    root: PathBuf,
    runner: ToolRunner,
}

impl AppDeployer {
    pub fn new(root: impl Into<PathBuf>, runner: ToolRunner) -> Self {
        Self {
            root: root.into(),
            runner,
        }
    }

    fn resolve(&self, app: &str) -> Result<(DeploymentType, PathBuf)> {
        match apps::app_deployment_type(&self.root, app) {
            Some(kind) => Ok((kind, apps::app_dir(&self.root, app))),
            None => {
                log::error(format!("App not found: {app}"));
                let available = apps::list_available_apps(&self.root);
                if !available.is_empty() {
                    log::info("Available apps:");
                    for name in available {
                        log::info(format!("  {name}"));
                    }
                }
                Err(KubeError::AppNotFound {
                    app: app.to_string(),
                })
            }
        }
    }

    /// Deploy an app into the given namespace
    pub async fn deploy(&self, app: &str, namespace: &str) -> Result<()> {
        let (kind, app_dir) = self.resolve(app)?;
        self.ensure_namespace(namespace).await?;

        match kind {
            DeploymentType::Helm => {
                log::info(format!("Deploying {app} via Helm to namespace: {namespace}"));
                let dir = app_dir.display().to_string();
                let mut args = vec![
                    "upgrade",
                    "--install",
                    app,
                    dir.as_str(),
                    "--namespace",
                    namespace,
                    "--create-namespace",
                ];
                let custom_values = app_dir.join("custom_values.yaml");
                let custom = custom_values.display().to_string();
                if custom_values.exists() {
                    log::info(format!("Using custom values: {custom}"));
                    args.extend(["-f", custom.as_str()]);
                }
                let dev_values = app_dir.join("values/development.yaml");
                let dev = dev_values.display().to_string();
                if dev_values.exists() {
                    log::info(format!("Using development values: {dev}"));
                    args.extend(["-f", dev.as_str()]);
                }
                self.runner.run(Tool::Helm, args).await?;
                log::success(format!("{app} deployed successfully via Helm to {namespace}"));
            }
            DeploymentType::Kustomize => {
                log::info(format!(
                    "Deploying {app} via Kustomization to namespace: {namespace}"
                ));
                let dir = app_dir.display().to_string();
                self.runner
                    .run(
                        Tool::Kubectl,
                        ["apply", "-k", dir.as_str(), "-n", namespace],
                    )
                    .await?;
                log::success(format!(
                    "{app} deployed successfully via Kustomization to {namespace}"
                ));
            }
            DeploymentType::Legacy => {
                log::info(format!("Deploying {app} via app.yaml to namespace: {namespace}"));
                let app_file = app_dir.join("app.yaml").display().to_string();
                self.runner
                    .run(
                        Tool::Kubectl,
                        ["apply", "-f", app_file.as_str(), "-n", namespace],
                    )
                    .await?;
                log::success(format!("{app} deployed successfully via app.yaml to {namespace}"));
            }
        }
        Ok(())
    }

    /// Remove an app, then clean up its namespace when empty
    pub async fn remove(&self, app: &str, namespace: &str) -> Result<()> {
        let (kind, app_dir) = self.resolve(app)?;

        match kind {
            DeploymentType::Helm => {
                log::info(format!("Removing {app} via Helm from namespace: {namespace}"));
                let listed = self
                    .runner
                    .try_run(Tool::Helm, ["list", "-q", "-n", namespace])
                    .await?;
                if listed.success() && listed.stdout.lines().any(|l| l.trim() == app) {
                    self.runner
                        .run(Tool::Helm, ["uninstall", app, "-n", namespace])
                        .await?;
                    log::success(format!("{app} removed successfully via Helm from {namespace}"));
                } else {
                    log::warn(format!("Release '{app}' not found in namespace '{namespace}'"));
                }
            }
            DeploymentType::Kustomize => {
                log::info(format!(
                    "Removing {app} via Kustomization from namespace: {namespace}"
                ));
                let dir = app_dir.display().to_string();
                let _ = self
                    .runner
                    .try_run(
                        Tool::Kubectl,
                        ["delete", "-k", dir.as_str(), "-n", namespace],
                    )
                    .await;
                log::success(format!("{app} removed via Kustomization from {namespace}"));
            }
            DeploymentType::Legacy => {
                log::info(format!("Removing {app} via app.yaml from namespace: {namespace}"));
                let app_file = app_dir.join("app.yaml").display().to_string();
                let _ = self
                    .runner
                    .try_run(
                        Tool::Kubectl,
                        ["delete", "-f", app_file.as_str(), "-n", namespace],
                    )
                    .await;
                log::success(format!("{app} removed via app.yaml from {namespace}"));
            }
        }

        self.cleanup_namespace_if_empty(namespace).await;
        Ok(())
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        if namespace == "default" {
            return Ok(());
        }
        let existing = self
            .runner
            .try_run(Tool::Kubectl, ["get", "namespace", namespace])
            .await?;
        if existing.success() {
            log::debug(format!("Namespace {namespace} already exists"));
            return Ok(());
        }

        log::info(format!("Creating namespace: {namespace}"));
        self.runner
            .run(Tool::Kubectl, ["create", "namespace", namespace])
            .await?;
        // Label so removal knows we own it
        let _ = self
            .runner
            .try_run(
                Tool::Kubectl,
                ["label", "namespace", namespace, "hostk8s.created=true"],
            )
            .await;
        log::success(format!("Namespace {namespace} created"));
        Ok(())
    }

    /// Remove a namespace we created once it holds no managed resources
    async fn cleanup_namespace_if_empty(&self, namespace: &str) {
        if PROTECTED_NAMESPACES.contains(&namespace) {
            return;
        }

        let created = self
            .runner
            .try_run(
                Tool::Kubectl,
                [
                    "get",
                    "namespace",
                    namespace,
                    "-o",
                    "jsonpath={.metadata.labels.hostk8s\\.created}",
                ],
            )
            .await;
        let ours = matches!(&created, Ok(out) if out.success() && out.stdout.trim() == "true");
        if !ours {
            log::debug(format!("Not removing namespace {namespace} (not created by HostK8s)"));
            return;
        }

        let resources = self
            .runner
            .try_run(
                Tool::Kubectl,
                [
                    "get",
                    "all,ingress,configmap,secret",
                    "-l",
                    "hostk8s.app",
                    "-n",
                    namespace,
                    "--no-headers",
                ],
            )
            .await;
        let count = match &resources {
            Ok(out) if out.success() => {
                out.stdout.lines().filter(|l| !l.trim().is_empty()).count()
            }
            _ => return,
        };

        if count == 0 {
            log::info(format!("Removing empty namespace: {namespace}"));
            match self
                .runner
                .try_run(Tool::Kubectl, ["delete", "namespace", namespace])
                .await
            {
                Ok(out) if out.success() => {
                    log::success(format!("Namespace {namespace} removed"));
                }
                _ => log::warn(format!("Failed to remove namespace: {namespace}")),
            }
        } else {
            log::debug(format!(
                "Not removing namespace {namespace} (contains {count} resources)"
            ));
        }
    }
}
