//! Kind cluster lifecycle
//!
//! Creates and tears down the local Kind cluster, including the optional
//! local container registry and the `/mnt/pv` storage mount inside the
//! control plane node. Everything here shells out; nothing talks to the
//! Kubernetes API directly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hostk8s_core::ClusterConfig;
use hostk8s_core::logging as log;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use crate::error::{KubeError, Result};
use crate::kubeconfig;
use crate::tools::{Tool, ToolRunner};

/// Local registry container name
pub const REGISTRY_CONTAINER: &str = "hostk8s-registry";

/// Docker volume backing persistent storage
const PV_VOLUME: &str = "hostk8s-pv-data";

/// Universal storage mount point inside the Kind node
const PV_MOUNT: &str = "/mnt/pv";

const NODE_WAIT_ATTEMPTS: u32 = 30;
const NODE_WAIT_INTERVAL: Duration = Duration::from_secs(10);

/// Registry config with CORS headers for browser-based UIs
const REGISTRY_CONFIG: &str = "\
version: 0.1
log:
  fields:
    service: registry
storage:
  filesystem:
    rootdirectory: /var/lib/registry
http:
  addr: :5000
  headers:
    Access-Control-Allow-Origin: ['*']
    Access-Control-Allow-Methods: ['HEAD', 'GET', 'OPTIONS', 'DELETE']
    Access-Control-Allow-Headers: ['Authorization', 'Accept']
    Access-Control-Max-Age: [1728000]
    Access-Control-Allow-Credentials: [true]
";

/// Subset of `docker system info --format json` we care about
#[derive(Debug, Deserialize)]
struct DockerSystemInfo {
    #[serde(rename = "MemTotal", default)]
    mem_total: u64,
    #[serde(rename = "NCPU", default)]
    ncpu: u32,
}

/// Manages the Kind cluster and its host-side companions
pub struct ClusterManager {
    root: PathBuf,
    config: ClusterConfig,
    runner: ToolRunner,
}

impl ClusterManager {
    pub fn new(root: impl Into<PathBuf>, config: ClusterConfig) -> Self {
        let root = root.into();
        // KUBECONFIG env and the dev-container mount take precedence; the
        // configured path is where a fresh cluster's kubeconfig lands.
        let kubeconfig = kubeconfig::detect(&root).unwrap_or_else(|_| {
            if config.kubeconfig_path.is_absolute() {
                config.kubeconfig_path.clone()
            } else {
                root.join(&config.kubeconfig_path)
            }
        });
        Self {
            root,
            config,
            runner: ToolRunner::with_kubeconfig(kubeconfig),
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn runner(&self) -> &ToolRunner {
        &self.runner
    }

    fn kubeconfig_path(&self) -> PathBuf {
        match self.runner.kubeconfig() {
            Some(path) => path.to_path_buf(),
            None => self.root.join(&self.config.kubeconfig_path),
        }
    }

    /// Re-export the kubeconfig from Kind when the file is missing
    ///
    /// The file can disappear while the cluster keeps running (a `data/`
    /// wipe, a fresh worktree); Kind can always write a new one.
    pub async fn ensure_kubeconfig(&self) -> Result<()> {
        let path = self.kubeconfig_path();
        if path.exists() {
            return Ok(());
        }

        log::info("Setting up kubeconfig");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path_arg = path.display().to_string();
        self.runner
            .run(
                Tool::Kind,
                [
                    "export",
                    "kubeconfig",
                    "--name",
                    self.config.cluster_name.as_str(),
                    "--kubeconfig",
                    path_arg.as_str(),
                ],
            )
            .await?;
        Ok(())
    }

    /// Verify the required external tools are installed and Docker runs
    pub async fn check_dependencies(&self) -> Result<()> {
        let mut missing = Vec::new();
        for tool in [Tool::Kind, Tool::Kubectl, Tool::Helm, Tool::Docker] {
            if !self.runner.available(tool).await {
                missing.push(tool.binary());
            }
        }
        if !missing.is_empty() {
            return Err(KubeError::InvalidConfig(format!(
                "missing required tools: {}. Run `hostk8s prepare` for details",
                missing.join(", ")
            )));
        }

        let info = self.runner.try_run(Tool::Docker, ["info"]).await?;
        if !info.success() {
            return Err(KubeError::InvalidConfig(
                "Docker is not running. Please start Docker first".to_string(),
            ));
        }
        Ok(())
    }

    /// Warn when Docker's resource allocation is below the recommended floor
    pub async fn validate_docker_resources(&self) {
        log::debug("[Cluster] Checking Docker resource allocation");

        let output = match self
            .runner
            .try_run(Tool::Docker, ["system", "info", "--format", "json"])
            .await
        {
            Ok(out) if out.success() => out,
            _ => {
                log::warn("Could not retrieve Docker system information");
                return;
            }
        };

        let Ok(info) = serde_json::from_str::<DockerSystemInfo>(&output.stdout) else {
            log::warn("Could not retrieve Docker system information");
            return;
        };

        let memory_gb = info.mem_total as f64 / (1024u64.pow(3)) as f64;
        log::debug(format!(
            "[Cluster] Docker resources: {memory_gb:.1}GB memory, {} CPUs",
            info.ncpu
        ));

        if memory_gb < 4.0 {
            log::warn(format!(
                "Docker has only {memory_gb:.1}GB memory allocated. Recommend 4GB+ for better performance"
            ));
        }
        if info.ncpu < 2 {
            log::warn(format!(
                "Docker has only {} CPUs allocated. Recommend 2+ for better performance",
                info.ncpu
            ));
        }
    }

    /// Whether the Kind cluster exists
    pub async fn exists(&self) -> Result<bool> {
        let output = self.runner.try_run(Tool::Kind, ["get", "clusters"]).await?;
        if !output.success() {
            return Ok(false);
        }
        Ok(output
            .stdout
            .lines()
            .any(|line| line.trim() == self.config.cluster_name))
    }

    /// Whether the API server answers `kubectl cluster-info`
    pub async fn is_ready(&self) -> Result<bool> {
        let output = self.runner.try_run(Tool::Kubectl, ["cluster-info"]).await?;
        Ok(output.success())
    }

    /// Resolve which Kind configuration file to use
    ///
    /// Priority: CLI argument (extension then standard form), `KIND_CONFIG`
    /// env (extension, explicit yaml, or short name), then the checked-in
    /// `kind-config.yaml` / `kind-custom.yaml` defaults. `None` means Kind's
    /// built-in defaults.
    pub fn resolve_kind_config(&self, config_arg: Option<&str>) -> Option<PathBuf> {
        let kubernetes_dir = self.root.join("infra/kubernetes");

        if let Some(arg) = config_arg {
            let extension = kubernetes_dir.join(format!("extension/kind-{arg}.yaml"));
            if extension.exists() {
                log::info(format!("Using extension config: kind-{arg}.yaml"));
                return Some(extension);
            }
            let standard = kubernetes_dir.join(format!("kind-{arg}.yaml"));
            if standard.exists() {
                log::info(format!("Using config: kind-{arg}.yaml"));
                return Some(standard);
            }
            log::warn(format!("Config 'kind-{arg}.yaml' not found"));
        }

        if let Some(kind_config) = &self.config.kind_config {
            let path = if let Some(name) = kind_config.strip_prefix("extension/") {
                kubernetes_dir.join(format!("extension/kind-{name}.yaml"))
            } else if kind_config.ends_with(".yaml") {
                kubernetes_dir.join(kind_config)
            } else {
                kubernetes_dir.join(format!("kind-{kind_config}.yaml"))
            };
            if path.exists() {
                log::info(format!("Using config from KIND_CONFIG: {kind_config}"));
                return Some(path);
            }
            log::warn(format!("Kind config '{kind_config}' not found"));
        }

        let default = kubernetes_dir.join("kind-config.yaml");
        if default.exists() {
            log::info("Using default config: kind-config.yaml");
            return Some(default);
        }

        let custom = kubernetes_dir.join("kind-custom.yaml");
        if custom.exists() {
            log::info("Using custom config: kind-custom.yaml");
            return Some(custom);
        }

        None
    }

    /// Create the cluster and its host-side companions
    pub async fn create(&self, config_arg: Option<&str>) -> Result<()> {
        log::info("[Cluster] Starting HostK8s cluster setup");

        self.check_dependencies().await?;
        self.validate_docker_resources().await;

        if self.exists().await? {
            return Err(KubeError::ClusterExists {
                name: self.config.cluster_name.clone(),
            });
        }

        let config_path = self.resolve_kind_config(config_arg);
        log::debug(format!(
            "[Cluster] Name: {}, Kubernetes: {}, Config: {}",
            self.config.cluster_name,
            self.config.k8s_version,
            config_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "Kind defaults".to_string())
        ));

        // Registry first so the container can join the kind network
        if self.config.registry_enabled
            && let Err(e) = self.setup_registry().await
        {
            log::warn(format!("[Cluster] Registry setup failed, continuing: {e}"));
        }

        self.create_cluster(config_path.as_deref()).await?;

        log::info("[Cluster] Setting up kubeconfig");
        let context = format!("kind-{}", self.config.cluster_name);
        self.runner
            .try_run(Tool::Kubectl, ["config", "use-context", context.as_str()])
            .await?;

        self.wait_for_nodes_ready().await?;
        self.setup_core_namespace().await;
        self.setup_persistent_storage().await;

        log::info(format!(
            "[Cluster] Kind cluster '{}' is ready!",
            self.config.cluster_name
        ));
        Ok(())
    }

    async fn create_cluster(&self, config_path: Option<&Path>) -> Result<()> {
        log::info(format!(
            "[Cluster] Creating Kind cluster '{}'",
            self.config.cluster_name
        ));

        let kubeconfig = self.kubeconfig_path();
        if let Some(parent) = kubeconfig.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let image = format!("kindest/node:{}", self.config.k8s_version);
        let mut args = vec![
            "create".to_string(),
            "cluster".to_string(),
            "--name".to_string(),
            self.config.cluster_name.clone(),
            "--quiet".to_string(),
        ];
        if let Some(path) = config_path {
            args.push("--config".to_string());
            args.push(path.display().to_string());
        }
        args.push("--image".to_string());
        args.push(image);
        args.push("--kubeconfig".to_string());
        args.push(kubeconfig.display().to_string());

        self.runner.run(Tool::Kind, &args).await?;
        Ok(())
    }

    /// Poll `kubectl wait` until every node reports Ready
    pub async fn wait_for_nodes_ready(&self) -> Result<()> {
        log::info("[Cluster] Waiting for cluster nodes to be ready");

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(Duration::from_millis(120));

        for attempt in 1..=NODE_WAIT_ATTEMPTS {
            spinner.set_message(format!(
                "waiting for nodes (attempt {attempt}/{NODE_WAIT_ATTEMPTS})"
            ));

            let result = self
                .runner
                .try_run(
                    Tool::Kubectl,
                    [
                        "wait",
                        "--for=condition=Ready",
                        "nodes",
                        "--all",
                        "--timeout=10s",
                    ],
                )
                .await?;

            if result.success() {
                spinner.finish_and_clear();
                log::success("[Cluster] All nodes are ready");
                return Ok(());
            }

            if attempt < NODE_WAIT_ATTEMPTS {
                tokio::time::sleep(NODE_WAIT_INTERVAL).await;
            }
        }

        spinner.finish_and_clear();
        Err(KubeError::NodesNotReady {
            attempts: NODE_WAIT_ATTEMPTS,
        })
    }

    async fn setup_core_namespace(&self) {
        log::info("[Cluster] Setting up core hostk8s namespace");
        match self
            .runner
            .try_run(Tool::Kubectl, ["create", "namespace", "hostk8s"])
            .await
        {
            Ok(out) if out.success() => log::info("[Cluster] HostK8s namespace ready"),
            Ok(out) if out.stderr.contains("AlreadyExists") => {
                log::debug("[Cluster] HostK8s namespace already exists");
            }
            Ok(out) => log::warn(format!(
                "Could not create namespace: {}",
                out.stderr.trim()
            )),
            Err(e) => log::warn(format!("Could not create namespace: {e}")),
        }
    }

    /// Ensure the Docker volume and the `/mnt/pv` mount point exist
    async fn setup_persistent_storage(&self) {
        let inspect = self
            .runner
            .try_run(Tool::Docker, ["volume", "inspect", PV_VOLUME])
            .await;
        match inspect {
            Ok(out) if out.success() => {
                log::debug(format!("[Cluster] Docker volume '{PV_VOLUME}' already exists"));
            }
            Ok(_) => match self
                .runner
                .try_run(Tool::Docker, ["volume", "create", PV_VOLUME])
                .await
            {
                Ok(out) if out.success() => {
                    log::info(format!("[Cluster] Created Docker volume '{PV_VOLUME}'"));
                }
                _ => {
                    log::warn(format!("[Cluster] Failed to create Docker volume '{PV_VOLUME}'"));
                    return;
                }
            },
            Err(e) => {
                log::warn(format!("[Cluster] Storage setup warning: {e}"));
                return;
            }
        }

        let container = self.config.control_plane_container();
        let present = self
            .runner
            .try_run(Tool::Docker, ["inspect", container.as_str()])
            .await;
        if !matches!(present, Ok(out) if out.success()) {
            log::debug("[Cluster] Kind cluster not ready yet, skipping directory setup");
            return;
        }

        for cmd in [format!("mkdir -p {PV_MOUNT}"), format!("chmod 755 {PV_MOUNT}")] {
            let _ = self
                .runner
                .try_run(Tool::Docker, ["exec", container.as_str(), "sh", "-c", cmd.as_str()])
                .await;
        }
        log::debug("[Cluster] Universal storage mount point configured");
    }

    /// Delete the cluster, preserving the kubeconfig
    pub async fn delete(&self) -> Result<()> {
        log::info("[Cluster] Stopping HostK8s cluster");

        if !self.exists().await? {
            log::warn(format!(
                "[Cluster] Cluster '{}' does not exist",
                self.config.cluster_name
            ));
            return Ok(());
        }

        log::info(format!(
            "[Cluster] Deleting Kind cluster '{}'",
            self.config.cluster_name
        ));
        self.runner
            .run(
                Tool::Kind,
                ["delete", "cluster", "--name", self.config.cluster_name.as_str()],
            )
            .await?;

        self.remove_registry_container().await;
        Ok(())
    }

    /// Remove the registry container when present
    pub async fn remove_registry_container(&self) {
        let inspect = self
            .runner
            .try_run(Tool::Docker, ["inspect", REGISTRY_CONTAINER])
            .await;
        if matches!(inspect, Ok(out) if out.success()) {
            log::info(format!(
                "[Cluster] Removing registry container '{REGISTRY_CONTAINER}'"
            ));
            let _ = self
                .runner
                .try_run(Tool::Docker, ["rm", "-f", REGISTRY_CONTAINER])
                .await;
        }
    }

    /// Start the local registry container, reusing one that already runs
    pub async fn setup_registry(&self) -> Result<()> {
        log::info("[Cluster] Setting up local container registry");

        let data_dir = self.root.join("data/registry/docker");
        std::fs::create_dir_all(&data_dir)?;
        let config_file = self.write_registry_config()?;

        let inspect = self
            .runner
            .try_run(Tool::Docker, ["inspect", REGISTRY_CONTAINER])
            .await?;
        if inspect.success() {
            let status = self
                .runner
                .try_run(
                    Tool::Docker,
                    ["inspect", "-f", "{{.State.Status}}", REGISTRY_CONTAINER],
                )
                .await?;
            if status.success() && status.stdout.trim() == "running" {
                log::info(format!("[Cluster] Registry '{REGISTRY_CONTAINER}' already running"));
                self.connect_registry_to_kind().await;
                return Ok(());
            }
            log::info("[Cluster] Registry exists but not running, removing");
            let _ = self
                .runner
                .try_run(Tool::Docker, ["rm", "-f", REGISTRY_CONTAINER])
                .await;
        }

        let port_mapping = format!("{}:5000", self.config.registry_port);
        let data_mount = format!("{}:/var/lib/registry", data_dir.display());
        let config_mount = format!("{}:/etc/docker/registry/config.yml", config_file.display());
        self.runner
            .run(
                Tool::Docker,
                [
                    "run",
                    "-d",
                    "--restart=always",
                    "-p",
                    port_mapping.as_str(),
                    "-v",
                    data_mount.as_str(),
                    "-v",
                    config_mount.as_str(),
                    "--name",
                    REGISTRY_CONTAINER,
                    "registry:2",
                ],
            )
            .await?;
        log::info("[Cluster] Registry container created");

        self.connect_registry_to_kind().await;
        Ok(())
    }

    fn write_registry_config(&self) -> Result<PathBuf> {
        let config_file = self.root.join("data/registry-config.yml");
        if !config_file.exists() {
            log::debug("[Cluster] Creating registry configuration file");
            if let Some(parent) = config_file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&config_file, REGISTRY_CONFIG)?;
        }
        Ok(config_file)
    }

    async fn connect_registry_to_kind(&self) {
        #[derive(Deserialize)]
        struct Network {
            #[serde(rename = "Name", default)]
            name: String,
        }

        let list = match self
            .runner
            .try_run(Tool::Docker, ["network", "ls", "--format", "json"])
            .await
        {
            Ok(out) if out.success() => out,
            _ => {
                log::warn("[Cluster] Could not connect registry to Kind network");
                return;
            }
        };

        // One JSON object per line
        let kind_network = list.stdout.lines().find_map(|line| {
            serde_json::from_str::<Network>(line)
                .ok()
                .filter(|n| n.name.contains("kind"))
                .map(|n| n.name)
        });

        if let Some(network) = kind_network {
            log::info(format!("[Cluster] Connecting registry to network: {network}"));
            let _ = self
                .runner
                .try_run(
                    Tool::Docker,
                    ["network", "connect", network.as_str(), REGISTRY_CONTAINER],
                )
                .await;
            log::info("[Cluster] Registry connected to Kind network");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostk8s_core::Environment;

    fn manager_with_root(root: &Path) -> ClusterManager {
        let env = Environment::load_from(&root.join(".env"));
        let config = ClusterConfig::from_env(&env).unwrap();
        ClusterManager::new(root, config)
    }

    #[test]
    fn kind_config_resolution_prefers_argument() {
        let dir = tempfile::tempdir().unwrap();
        let kubernetes = dir.path().join("infra/kubernetes");
        std::fs::create_dir_all(kubernetes.join("extension")).unwrap();
        std::fs::write(kubernetes.join("kind-minimal.yaml"), "kind: Cluster\n").unwrap();
        std::fs::write(kubernetes.join("kind-config.yaml"), "kind: Cluster\n").unwrap();

        let manager = manager_with_root(dir.path());
        let resolved = manager.resolve_kind_config(Some("minimal")).unwrap();
        assert!(resolved.ends_with("kind-minimal.yaml"));
    }

    #[test]
    fn kind_config_falls_back_to_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let kubernetes = dir.path().join("infra/kubernetes");
        std::fs::create_dir_all(&kubernetes).unwrap();
        std::fs::write(kubernetes.join("kind-config.yaml"), "kind: Cluster\n").unwrap();

        let manager = manager_with_root(dir.path());
        let resolved = manager.resolve_kind_config(None).unwrap();
        assert!(resolved.ends_with("kind-config.yaml"));
    }

    #[test]
    fn kind_config_none_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_root(dir.path());
        assert!(manager.resolve_kind_config(None).is_none());
    }

    #[test]
    fn runner_picks_up_existing_host_kubeconfig() {
        let dir = tempfile::tempdir().unwrap();
        let kube_dir = dir.path().join("data/kubeconfig");
        std::fs::create_dir_all(&kube_dir).unwrap();
        std::fs::write(kube_dir.join("config"), "apiVersion: v1\n").unwrap();

        let manager = manager_with_root(dir.path());
        assert_eq!(
            manager.runner().kubeconfig(),
            Some(kube_dir.join("config").as_path())
        );
    }

    #[test]
    fn runner_falls_back_to_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_root(dir.path());
        assert_eq!(
            manager.runner().kubeconfig(),
            Some(dir.path().join("data/kubeconfig/config").as_path())
        );
    }

    #[tokio::test]
    async fn ensure_kubeconfig_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let kube_dir = dir.path().join("data/kubeconfig");
        std::fs::create_dir_all(&kube_dir).unwrap();
        std::fs::write(kube_dir.join("config"), "apiVersion: v1\n").unwrap();

        // No kind binary is invoked when the file is already there
        let manager = manager_with_root(dir.path());
        manager.ensure_kubeconfig().await.unwrap();
        assert_eq!(
            std::fs::read_to_string(kube_dir.join("config")).unwrap(),
            "apiVersion: v1\n"
        );
    }

    #[test]
    fn registry_config_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_root(dir.path());

        let path = manager.write_registry_config().unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Access-Control-Allow-Origin"));

        // A second call leaves the existing file alone
        std::fs::write(&path, "version: 0.1\n").unwrap();
        manager.write_registry_config().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "version: 0.1\n");
    }
}
