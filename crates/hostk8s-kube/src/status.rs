//! Cluster status collection
//!
//! Gathers a typed snapshot of the cluster for the `status` command: node
//! readiness, the registry container, Flux resources, and deployed apps.
//! Rendering belongs to the CLI; this module only collects.

use hostk8s_core::logging as log;
use serde::{Deserialize, Serialize};

use crate::cluster::{ClusterManager, REGISTRY_CONTAINER};
use crate::error::Result;
use crate::flux::{FluxManager, FluxResourceStatus};
use crate::tools::{Tool, ToolRunner};

/// One node's readiness
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    pub name: String,
    pub ready: bool,
    pub version: String,
}

/// A deployment that belongs to a HostK8s app
#[derive(Debug, Clone, Serialize)]
pub struct AppStatus {
    pub name: String,
    pub namespace: String,
    pub ready_replicas: i64,
    pub replicas: i64,
}

/// Full snapshot rendered by `hostk8s status`
#[derive(Debug, Default, Serialize)]
pub struct ClusterStatus {
    pub cluster_name: String,
    pub running: bool,
    pub nodes: Vec<NodeStatus>,
    pub registry_running: bool,
    pub flux_installed: bool,
    pub git_repositories: Vec<FluxResourceStatus>,
    pub kustomizations: Vec<FluxResourceStatus>,
    pub apps: Vec<AppStatus>,
}

#[derive(Debug, Deserialize)]
struct NodeList {
    #[serde(default)]
    items: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct Node {
    metadata: NodeMeta,
    #[serde(default)]
    status: NodeStatusJson,
}

#[derive(Debug, Deserialize)]
struct NodeMeta {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct NodeStatusJson {
    #[serde(default)]
    conditions: Vec<NodeCondition>,
    #[serde(default, rename = "nodeInfo")]
    node_info: NodeInfo,
}

#[derive(Debug, Deserialize)]
struct NodeCondition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
}

#[derive(Debug, Default, Deserialize)]
struct NodeInfo {
    #[serde(default, rename = "kubeletVersion")]
    kubelet_version: String,
}

#[derive(Debug, Deserialize)]
struct DeploymentList {
    #[serde(default)]
    items: Vec<Deployment>,
}

#[derive(Debug, Deserialize)]
struct Deployment {
    metadata: DeploymentMeta,
    #[serde(default)]
    status: DeploymentStatusJson,
}

#[derive(Debug, Deserialize)]
struct DeploymentMeta {
    name: String,
    #[serde(default)]
    namespace: String,
}

#[derive(Debug, Default, Deserialize)]
struct DeploymentStatusJson {
    #[serde(default, rename = "readyReplicas")]
    ready_replicas: i64,
    #[serde(default)]
    replicas: i64,
}

/// Collects the status snapshot
pub struct StatusCollector {
    cluster: ClusterManager,
}

impl StatusCollector {
    pub fn new(cluster: ClusterManager) -> Self {
        Self { cluster }
    }

    fn runner(&self) -> &ToolRunner {
        self.cluster.runner()
    }

    pub async fn collect(&self) -> Result<ClusterStatus> {
        let mut status = ClusterStatus {
            cluster_name: self.cluster.config().cluster_name.clone(),
            ..ClusterStatus::default()
        };

        if !self.cluster.exists().await? {
            return Ok(status);
        }
        status.running = self.cluster.is_ready().await?;
        if !status.running {
            return Ok(status);
        }

        status.nodes = self.collect_nodes().await?;
        status.registry_running = self.registry_running().await;

        let flux = FluxManager::new(self.runner().clone());
        status.flux_installed = flux.is_installed().await?;
        if status.flux_installed {
            status.git_repositories = flux.git_repository_status().await?;
            status.kustomizations = flux.kustomization_status().await?;
        }

        status.apps = self.collect_apps().await?;
        Ok(status)
    }

    async fn collect_nodes(&self) -> Result<Vec<NodeStatus>> {
        let out = self
            .runner()
            .try_run(Tool::Kubectl, ["get", "nodes", "-o", "json"])
            .await?;
        if !out.success() {
            return Ok(Vec::new());
        }

        let list: NodeList = serde_json::from_str(&out.stdout)?;
        Ok(list
            .items
            .into_iter()
            .map(|node| {
                let ready = node
                    .status
                    .conditions
                    .iter()
                    .any(|c| c.kind == "Ready" && c.status == "True");
                NodeStatus {
                    name: node.metadata.name,
                    ready,
                    version: node.status.node_info.kubelet_version,
                }
            })
            .collect())
    }

    async fn registry_running(&self) -> bool {
        let status = self
            .runner()
            .try_run(
                Tool::Docker,
                ["inspect", "-f", "{{.State.Status}}", REGISTRY_CONTAINER],
            )
            .await;
        matches!(status, Ok(out) if out.success() && out.stdout.trim() == "running")
    }

    /// Deployments carrying either the GitOps or the manual app label
    async fn collect_apps(&self) -> Result<Vec<AppStatus>> {
        let mut apps = Vec::new();
        for label in ["hostk8s.application", "hostk8s.app"] {
            let out = self
                .runner()
                .try_run(
                    Tool::Kubectl,
                    ["get", "deployments", "-A", "-l", label, "-o", "json"],
                )
                .await?;
            if !out.success() {
                log::debug(format!("Could not list deployments for label {label}"));
                continue;
            }
            let list: DeploymentList = serde_json::from_str(&out.stdout)?;
            for deployment in list.items {
                apps.push(AppStatus {
                    name: deployment.metadata.name,
                    namespace: deployment.metadata.namespace,
                    ready_replicas: deployment.status.ready_replicas,
                    replicas: deployment.status.replicas,
                });
            }
        }
        apps.sort_by(|a, b| (a.namespace.clone(), a.name.clone()).cmp(&(b.namespace.clone(), b.name.clone())));
        apps.dedup_by(|a, b| a.name == b.name && a.namespace == b.namespace);
        Ok(apps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_readiness_parsed() {
        let json = r#"{
            "items": [{
                "metadata": {"name": "hostk8s-control-plane"},
                "status": {
                    "conditions": [
                        {"type": "MemoryPressure", "status": "False"},
                        {"type": "Ready", "status": "True"}
                    ],
                    "nodeInfo": {"kubeletVersion": "v1.34.0"}
                }
            }]
        }"#;
        let list: NodeList = serde_json::from_str(json).unwrap();
        let node = &list.items[0];
        assert_eq!(node.metadata.name, "hostk8s-control-plane");
        assert!(node.status.conditions.iter().any(|c| c.kind == "Ready" && c.status == "True"));
        assert_eq!(node.status.node_info.kubelet_version, "v1.34.0");
    }

    #[test]
    fn deployment_replicas_default_to_zero() {
        let json = r#"{"items": [{"metadata": {"name": "web", "namespace": "sample"}}]}"#;
        let list: DeploymentList = serde_json::from_str(json).unwrap();
        assert_eq!(list.items[0].status.ready_replicas, 0);
        assert_eq!(list.items[0].status.replicas, 0);
    }
}
