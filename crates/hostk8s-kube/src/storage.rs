//! Storage contract realization
//!
//! Turns a stack's `hostk8s.storage.yaml` into StorageClasses, hostPath
//! PersistentVolumes, and prepared directories inside the Kind node. PVs
//! use `Retain` so data survives stack removal; cleanup deletes the PV
//! objects but never the directories.

use std::path::PathBuf;

use hostk8s_core::logging as log;
use hostk8s_core::stack::StackPaths;
use hostk8s_core::storage::{DirectorySpec, StorageContract};
use serde_json::json;

use crate::cluster::ClusterManager;
use crate::error::{KubeError, Result};
use crate::tools::{Tool, ToolRunner};

/// Realizes storage contracts against the cluster
pub struct StorageManager {
    root: PathBuf,
    runner: ToolRunner,
    control_plane: String,
}

impl StorageManager {
    pub fn new(root: impl Into<PathBuf>, cluster: &ClusterManager) -> Self {
        Self {
            root: root.into(),
            runner: cluster.runner().clone(),
            control_plane: cluster.config().control_plane_container(),
        }
    }

    fn contract_path(&self, stack: &str) -> PathBuf {
        StackPaths::new(&self.root, stack).storage_contract()
    }

    /// Set up storage for a stack from its contract; a missing contract is a no-op
    pub async fn setup(&self, stack: &str) -> Result<()> {
        let contract_file = self.contract_path(stack);
        if !contract_file.exists() {
            log::debug(format!(
                "[Storage] No storage contract found for stack '{stack}' - skipping storage management"
            ));
            return Ok(());
        }

        log::info(format!("[Storage] Processing storage contract for stack '{stack}'"));
        let contract = StorageContract::load(&contract_file, stack)?;

        self.create_storage_classes(&contract).await?;

        let directories = &contract.spec.directories;
        let mut configured = 0usize;
        for directory in directories {
            if self.process_directory(directory, stack).await {
                configured += 1;
            } else {
                log::error(format!("Failed to process directory '{}'", directory.name));
            }
        }

        if configured != directories.len() {
            return Err(KubeError::Storage(format!(
                "only {configured}/{} directories processed successfully",
                directories.len()
            )));
        }

        log::success(format!("[Storage] Storage setup completed for stack '{stack}'"));
        log::info(format!("[Storage] {configured} storage directories configured"));
        Ok(())
    }

    async fn create_storage_classes(&self, contract: &StorageContract) -> Result<()> {
        let mut created = 0usize;
        for class in contract.storage_classes() {
            self.create_storage_class(class).await?;
            created += 1;
        }
        log::info(format!("[Storage] {created} StorageClasses ready"));
        Ok(())
    }

    async fn create_storage_class(&self, name: &str) -> Result<()> {
        let existing = self
            .runner
            .try_run(Tool::Kubectl, ["get", "storageclass", name])
            .await?;
        if existing.success() {
            log::debug(format!("[Storage] StorageClass '{name}' already exists"));
            return Ok(());
        }

        let manifest = json!({
            "apiVersion": "storage.k8s.io/v1",
            "kind": "StorageClass",
            "metadata": { "name": name },
            "provisioner": "kubernetes.io/no-provisioner",
            "reclaimPolicy": "Retain",
            "volumeBindingMode": "WaitForFirstConsumer",
            "allowVolumeExpansion": false,
        });
        let yaml = serde_yaml::to_string(&manifest)?;

        let out = self.runner.try_apply_stdin(&yaml).await?;
        if !out.success() {
            return Err(KubeError::Storage(format!(
                "failed to create StorageClass '{name}': {}",
                out.stderr.trim()
            )));
        }
        log::debug(format!("[Storage] Created StorageClass '{name}'"));
        Ok(())
    }

    async fn process_directory(&self, directory: &DirectorySpec, stack: &str) -> bool {
        if let Err(e) = self.create_persistent_volume(directory, stack).await {
            log::error(format!(
                "[Storage] Failed to create PersistentVolume for '{}': {e}",
                directory.name
            ));
            return false;
        }
        self.prepare_node_directory(directory).await;
        log::info(format!(
            "[Storage] Directory '{}' configured at '{}'",
            directory.name, directory.path
        ));
        true
    }

    async fn create_persistent_volume(
        &self,
        directory: &DirectorySpec,
        stack: &str,
    ) -> Result<()> {
        let pv_name = directory.pv_name(stack);

        let existing = self
            .runner
            .try_run(Tool::Kubectl, ["get", "pv", pv_name.as_str()])
            .await?;
        if existing.success() {
            log::debug(format!("[Storage] PersistentVolume '{pv_name}' already exists"));
            return Ok(());
        }

        let manifest = json!({
            "apiVersion": "v1",
            "kind": "PersistentVolume",
            "metadata": {
                "name": pv_name,
                "labels": {
                    "hostk8s.stack": stack,
                    "hostk8s.storage.name": directory.name,
                },
            },
            "spec": {
                "capacity": { "storage": directory.size },
                "accessModes": directory.access_modes,
                "persistentVolumeReclaimPolicy": "Retain",
                "storageClassName": directory.storage_class,
                "hostPath": {
                    "path": directory.path,
                    "type": "DirectoryOrCreate",
                },
            },
        });
        let yaml = serde_yaml::to_string(&manifest)?;

        let out = self.runner.try_apply_stdin(&yaml).await?;
        if !out.success() {
            return Err(KubeError::Storage(format!(
                "failed to create PersistentVolume '{pv_name}': {}",
                out.stderr.trim()
            )));
        }
        log::debug(format!("[Storage] Created PersistentVolume '{pv_name}'"));
        Ok(())
    }

    /// Create the directory inside the Kind node with owner and mode applied
    async fn prepare_node_directory(&self, directory: &DirectorySpec) {
        let present = self
            .runner
            .try_run(Tool::Docker, ["inspect", self.control_plane.as_str()])
            .await;
        if !matches!(present, Ok(out) if out.success()) {
            log::debug("[Storage] Kind node not running, skipping directory setup");
            return;
        }

        let commands = [
            format!("mkdir -p {}", directory.path),
            // chown may fail for users unknown to the node image
            format!("chown {} {} || true", directory.owner, directory.path),
            format!("chmod {} {}", directory.permissions, directory.path),
        ];
        for cmd in &commands {
            let _ = self
                .runner
                .try_run(
                    Tool::Docker,
                    ["exec", self.control_plane.as_str(), "sh", "-c", cmd.as_str()],
                )
                .await;
        }
    }

    /// Delete the PVs labeled for a stack; data directories are preserved
    pub async fn cleanup(&self, stack: &str) -> Result<()> {
        log::info(format!("[Storage] Cleaning up storage for stack '{stack}'"));

        let label = format!("hostk8s.stack={stack}");
        let listed = self
            .runner
            .try_run(
                Tool::Kubectl,
                ["get", "pv", "-l", label.as_str(), "-o", "name"],
            )
            .await?;

        if listed.success() {
            let names: Vec<&str> = listed
                .stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect();
            for name in &names {
                let _ = self.runner.try_run(Tool::Kubectl, ["delete", *name]).await;
            }
            if !names.is_empty() {
                log::info(format!("[Storage] Removed {} PersistentVolumes", names.len()));
            }
        }

        log::success(format!("[Storage] Storage cleanup completed for stack '{stack}'"));
        Ok(())
    }

    /// Summarize storage contracts, for one stack or every stack that has one
    pub async fn list(&self, stack: Option<&str>) -> Result<()> {
        log::info("[Storage] Storage Contract Summary");

        let stacks = match stack {
            Some(name) => vec![name.to_string()],
            None => StackPaths::available(&self.root)
                .into_iter()
                .filter(|name| self.contract_path(name).exists())
                .collect(),
        };

        for name in stacks {
            self.list_stack(&name).await?;
        }
        Ok(())
    }

    async fn list_stack(&self, stack: &str) -> Result<()> {
        let contract_file = self.contract_path(stack);
        if !contract_file.exists() {
            log::info(format!("[Storage] Stack '{stack}': No storage contract"));
            return Ok(());
        }

        let contract = StorageContract::load(&contract_file, stack)?;
        let directories = &contract.spec.directories;
        log::info(format!(
            "[Storage] Stack '{stack}': {} directories",
            directories.len()
        ));

        for directory in directories {
            let pv_name = directory.pv_name(stack);
            let exists = self
                .runner
                .try_run(Tool::Kubectl, ["get", "pv", pv_name.as_str()])
                .await?;
            let status = if exists.success() { "Ready" } else { "Missing" };
            log::info(format!(
                "  {}: {} at {} - {status}",
                directory.name, directory.size, directory.path
            ));
        }
        Ok(())
    }
}
