//! Cluster addons
//!
//! Installers for what a default cluster carries beyond Kind itself:
//! Gateway API CRDs (always), the metrics server and the NGINX ingress
//! controller (on unless disabled), and the opt-in Vault addon with the
//! External Secrets Operator. MetalLB is flag-plumbed only; deploy it
//! through a software stack.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hostk8s_core::logging as log;
use hostk8s_core::{ClusterConfig, Environment};

use crate::error::{KubeError, Result};
use crate::tools::{Tool, ToolRunner};

/// Namespace shared by the hostk8s-managed addons
const ADDON_NAMESPACE: &str = "hostk8s";

/// Namespace the Vault addon installs into
const VAULT_NAMESPACE: &str = "hostk8s";

/// Dev-mode root token, shared with the Vault client defaults
const VAULT_DEV_TOKEN: &str = "hostk8s";

/// Gateway API release applied on every cluster
const GATEWAY_API_VERSION: &str = "v1.3.0";

/// NGINX Ingress chart pinned here; `INGRESS_VERSION` overrides
const DEFAULT_INGRESS_CHART_VERSION: &str = "4.13.2";

fn gateway_api_manifest_url() -> String {
    format!(
        "https://github.com/kubernetes-sigs/gateway-api/releases/download/{GATEWAY_API_VERSION}/standard-install.yaml"
    )
}

async fn add_helm_repo(runner: &ToolRunner, name: &str, url: &str) -> Result<()> {
    let out = runner.try_run(Tool::Helm, ["repo", "add", name, url]).await?;
    if !out.success() && !out.stderr.contains("already exists") {
        log::warn(format!("Failed to add helm repo '{name}'"));
    }
    let _ = runner.try_run(Tool::Helm, ["repo", "update"]).await;
    Ok(())
}

/// Installs the Gateway API CRDs, foundational on every cluster
pub struct GatewayApiAddon {
    runner: ToolRunner,
}

impl GatewayApiAddon {
    pub fn new(runner: ToolRunner) -> Self {
        Self { runner }
    }

    pub async fn is_installed(&self) -> Result<bool> {
        let out = self
            .runner
            .try_run(
                Tool::Kubectl,
                ["get", "crd", "gateways.gateway.networking.k8s.io"],
            )
            .await?;
        Ok(out.success())
    }

    pub async fn install(&self) -> Result<()> {
        if self.is_installed().await? {
            log::info("[Gateway API] Gateway API CRDs already installed");
            return Ok(());
        }

        log::info(format!(
            "[Gateway API] Installing Gateway API {GATEWAY_API_VERSION} CRDs"
        ));
        let url = gateway_api_manifest_url();
        self.runner
            .run(Tool::Kubectl, ["apply", "-f", url.as_str()])
            .await?;

        for crd in [
            "gateways.gateway.networking.k8s.io",
            "httproutes.gateway.networking.k8s.io",
            "gatewayclasses.gateway.networking.k8s.io",
        ] {
            let out = self.runner.try_run(Tool::Kubectl, ["get", "crd", crd]).await?;
            if !out.success() {
                log::warn(format!("[Gateway API] CRD not found after install: {crd}"));
            }
        }
        log::info("[Gateway API] Gateway API CRDs installed");
        Ok(())
    }
}

/// Installs the metrics server into kube-system from the checked-in manifest
pub struct MetricsAddon {
    runner: ToolRunner,
    manifest: PathBuf,
}

impl MetricsAddon {
    pub fn new(root: impl AsRef<Path>, runner: ToolRunner) -> Self {
        Self {
            runner,
            manifest: root.as_ref().join("infra/manifests/metrics-server.yaml"),
        }
    }

    pub async fn is_installed(&self) -> Result<bool> {
        let out = self
            .runner
            .try_run(
                Tool::Kubectl,
                ["get", "deployment", "metrics-server", "-n", "kube-system"],
            )
            .await?;
        Ok(out.success())
    }

    pub async fn install(&self) -> Result<()> {
        if self.is_installed().await? {
            log::info("[Metrics] Metrics Server already installed");
            return Ok(());
        }

        if !self.manifest.exists() {
            return Err(KubeError::InvalidConfig(format!(
                "metrics-server manifest not found: {}",
                self.manifest.display()
            )));
        }

        log::info("[Metrics] Installing Metrics Server");
        let manifest_arg = self.manifest.display().to_string();
        self.runner
            .run(Tool::Kubectl, ["apply", "-f", manifest_arg.as_str()])
            .await?;

        log::info("[Metrics] Waiting for Metrics Server to be ready");
        let wait = self
            .runner
            .try_run(
                Tool::Kubectl,
                [
                    "wait",
                    "--namespace",
                    "kube-system",
                    "--for=condition=available",
                    "deployment/metrics-server",
                    "--timeout=120s",
                ],
            )
            .await?;
        if !wait.success() {
            log::warn("Metrics Server deployment not ready within 2 minutes");
            return Ok(());
        }

        self.wait_for_metrics_api().await;
        log::info("[Cluster] Metrics Server addon ready");
        Ok(())
    }

    /// The aggregated API lags behind the deployment; poll `kubectl top`
    async fn wait_for_metrics_api(&self) {
        log::info("[Metrics] Waiting for Metrics API to be available");
        for attempt in 1..=20u32 {
            if let Ok(out) = self.runner.try_run(Tool::Kubectl, ["top", "nodes"]).await
                && out.success()
            {
                return;
            }
            if attempt == 20 {
                log::warn("Metrics API not available after 20 attempts");
                return;
            }
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
    }
}

/// Installs the NGINX ingress controller via Helm with Kind NodePort wiring
pub struct IngressAddon {
    runner: ToolRunner,
    chart_version: String,
}

impl IngressAddon {
    pub fn new(runner: ToolRunner, env: &Environment) -> Self {
        Self {
            runner,
            chart_version: env.get_or("INGRESS_VERSION", DEFAULT_INGRESS_CHART_VERSION),
        }
    }

    pub fn chart_version(&self) -> &str {
        &self.chart_version
    }

    pub async fn is_installed(&self) -> Result<bool> {
        let releases = self
            .runner
            .try_run(Tool::Helm, ["list", "-q", "-n", ADDON_NAMESPACE])
            .await?;
        if releases.success()
            && releases.stdout.lines().any(|l| l.trim() == "ingress-nginx")
        {
            return Ok(true);
        }
        let deployment = self
            .runner
            .try_run(
                Tool::Kubectl,
                [
                    "get",
                    "deployment",
                    "ingress-nginx-controller",
                    "-n",
                    ADDON_NAMESPACE,
                ],
            )
            .await?;
        Ok(deployment.success())
    }

    pub async fn install(&self) -> Result<()> {
        if self.is_installed().await? {
            log::info("[Ingress] NGINX Ingress Controller already installed");
            return Ok(());
        }

        add_helm_repo(
            &self.runner,
            "ingress-nginx",
            "https://kubernetes.github.io/ingress-nginx",
        )
        .await?;

        log::info(format!(
            "[Ingress] Installing NGINX Ingress Controller (chart version: {})",
            self.chart_version
        ));
        self.runner
            .run(
                Tool::Helm,
                [
                    "upgrade",
                    "--install",
                    "ingress-nginx",
                    "ingress-nginx/ingress-nginx",
                    "--namespace",
                    ADDON_NAMESPACE,
                    "--create-namespace",
                    "--version",
                    self.chart_version.as_str(),
                    "--set",
                    "controller.service.type=NodePort",
                    "--set",
                    "controller.service.nodePorts.http=30080",
                    "--set",
                    "controller.service.nodePorts.https=30443",
                    "--set",
                    "controller.admissionWebhooks.enabled=true",
                ],
            )
            .await?;

        log::info("[Ingress] Waiting for NGINX Ingress Controller to be ready");
        let wait = self
            .runner
            .try_run(
                Tool::Kubectl,
                [
                    "wait",
                    "--namespace",
                    ADDON_NAMESPACE,
                    "--for=condition=available",
                    "deployment/ingress-nginx-controller",
                    "--timeout=300s",
                ],
            )
            .await?;
        if !wait.success() {
            log::warn("Ingress deployment not ready within timeout");
            return Ok(());
        }
        log::info("[Ingress] NGINX Ingress Controller ready");
        Ok(())
    }
}

/// Installs the Vault addon
pub struct VaultAddon {
    runner: ToolRunner,
}

impl VaultAddon {
    pub fn new(runner: ToolRunner) -> Self {
        Self { runner }
    }

    /// Whether a vault release already exists in the addon namespace
    pub async fn is_installed(&self) -> Result<bool> {
        let out = self
            .runner
            .try_run(Tool::Helm, ["list", "-q", "-n", VAULT_NAMESPACE])
            .await?;
        Ok(out.success() && out.stdout.lines().any(|l| l.trim() == "vault"))
    }

    /// Install Vault in dev mode plus the External Secrets Operator
    pub async fn install(&self) -> Result<()> {
        if self.is_installed().await? {
            log::info("[Vault] Vault already installed");
            return Ok(());
        }

        add_helm_repo(&self.runner, "hashicorp", "https://helm.releases.hashicorp.com").await?;

        log::info("[Vault] Installing Vault");
        let dev_token = format!("server.dev.devRootToken={VAULT_DEV_TOKEN}");
        self.runner
            .run(
                Tool::Helm,
                [
                    "upgrade",
                    "--install",
                    "vault",
                    "hashicorp/vault",
                    "--namespace",
                    VAULT_NAMESPACE,
                    "--create-namespace",
                    "--set",
                    "server.dev.enabled=true",
                    "--set",
                    dev_token.as_str(),
                    "--set",
                    "injector.enabled=false",
                    "--set",
                    "server.resources.requests.memory=64Mi",
                    "--set",
                    "server.resources.requests.cpu=10m",
                    "--set",
                    "server.resources.limits.memory=128Mi",
                    "--set",
                    "server.resources.limits.cpu=100m",
                    "--set",
                    "ui.enabled=true",
                    "--set",
                    "ui.serviceType=ClusterIP",
                    "--wait",
                    "--timeout",
                    "5m",
                ],
            )
            .await?;
        log::info("[Vault] Vault installed successfully");

        self.install_external_secrets_operator().await;
        self.create_cluster_secret_store().await;
        log::success("[Vault] Vault addon ready");
        Ok(())
    }

    async fn install_external_secrets_operator(&self) {
        log::info("[Vault] Installing External Secrets Operator");

        if add_helm_repo(
            &self.runner,
            "external-secrets",
            "https://charts.external-secrets.io",
        )
        .await
        .is_err()
        {
            log::warn("Failed to install External Secrets Operator");
            return;
        }

        let result = self
            .runner
            .try_run(
                Tool::Helm,
                [
                    "upgrade",
                    "--install",
                    "external-secrets",
                    "external-secrets/external-secrets",
                    "--namespace",
                    VAULT_NAMESPACE,
                    "--set",
                    "installCRDs=true",
                    "--set",
                    "webhook.port=9443",
                    "--set",
                    "resources.requests.memory=32Mi",
                    "--set",
                    "resources.requests.cpu=10m",
                    "--set",
                    "resources.limits.memory=64Mi",
                    "--set",
                    "resources.limits.cpu=50m",
                    "--wait",
                    "--timeout",
                    "2m",
                ],
            )
            .await;
        if !matches!(result, Ok(out) if out.success()) {
            log::warn("Failed to install External Secrets Operator");
        }
    }

    /// Wire External Secrets to Vault via a ClusterSecretStore
    async fn create_cluster_secret_store(&self) {
        log::info("[Vault] Creating Vault ClusterSecretStore");

        let manifest = format!(
            r#"apiVersion: external-secrets.io/v1
kind: ClusterSecretStore
metadata:
  name: vault-backend
spec:
  provider:
    vault:
      server: "http://vault.{VAULT_NAMESPACE}.svc.cluster.local:8200"
      path: "secret"
      version: "v2"
      auth:
        tokenSecretRef:
          name: vault-token
          key: token
          namespace: {VAULT_NAMESPACE}
---
apiVersion: v1
kind: Secret
metadata:
  name: vault-token
  namespace: {VAULT_NAMESPACE}
type: Opaque
stringData:
  token: "{VAULT_DEV_TOKEN}"
"#
        );

        match self.runner.try_apply_stdin(&manifest).await {
            Ok(out) if out.success() => {}
            Ok(out) => {
                log::warn("Failed to create ClusterSecretStore");
                log::debug(out.stderr.trim());
            }
            Err(e) => log::warn(format!("Failed to create ClusterSecretStore: {e}")),
        }
    }
}

/// Log the addon flags that have no installer here
pub fn report_unmanaged_addons(config: &ClusterConfig) {
    if config.metallb_enabled {
        log::info("[Cluster] MetalLB flag set - deploy it through a software stack");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_api_url_pins_release() {
        let url = gateway_api_manifest_url();
        assert!(url.contains(GATEWAY_API_VERSION));
        assert!(url.ends_with("standard-install.yaml"));
    }

    #[test]
    fn ingress_chart_version_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(file, "INGRESS_VERSION=9.9.9").unwrap();
        let env = Environment::load_from(file.path());

        let addon = IngressAddon::new(ToolRunner::new(), &env);
        assert_eq!(addon.chart_version(), "9.9.9");
    }

    #[test]
    fn ingress_chart_version_default() {
        let env = Environment::load_from(Path::new("/nonexistent/.env"));
        let addon = IngressAddon::new(ToolRunner::new(), &env);
        assert_eq!(addon.chart_version(), DEFAULT_INGRESS_CHART_VERSION);
    }

    #[test]
    fn metrics_manifest_under_root() {
        let addon = MetricsAddon::new("/work", ToolRunner::new());
        assert_eq!(
            addon.manifest,
            Path::new("/work/infra/manifests/metrics-server.yaml")
        );
    }
}
