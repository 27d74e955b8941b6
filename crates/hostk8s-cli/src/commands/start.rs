//! Start command - create the cluster and enabled addons

use hostk8s_core::logging as log;
use hostk8s_kube::{addons, FluxManager, GatewayApiAddon, IngressAddon, MetricsAddon, VaultAddon};

use crate::context::AppContext;
use crate::error::{CliError, Result};

/// Run the start command
pub async fn run(config_arg: Option<&str>) -> Result<()> {
    let ctx = AppContext::load()?;
    let cluster = ctx.cluster();

    if cluster.exists().await? {
        if cluster.is_ready().await? {
            log::info(format!(
                "Cluster '{}' is already running",
                ctx.config.cluster_name
            ));
            return Ok(());
        }
        return Err(CliError::cluster_with_help(
            format!(
                "Cluster '{}' exists but is not accessible",
                ctx.config.cluster_name
            ),
            "run `hostk8s restart` to recreate it",
        ));
    }

    cluster.create(config_arg).await?;
    install_addons(&ctx).await;

    log::success(format!("Cluster '{}' is ready", ctx.config.cluster_name));
    log::info("Run `hostk8s status` to see cluster details");
    Ok(())
}

/// Install enabled addons, logging failures without aborting
///
/// The cluster is usable without its addons; a broken Vault install should
/// not take down a freshly created cluster.
pub async fn install_addons(ctx: &AppContext) {
    // Gateway API CRDs are foundational, not an opt-in addon
    let gateway = GatewayApiAddon::new(ctx.runner());
    if let Err(e) = gateway.install().await {
        log::warn(format!("Gateway API setup failed: {e}"));
    }

    if ctx.config.metrics_enabled {
        let metrics = MetricsAddon::new(&ctx.root, ctx.runner());
        if let Err(e) = metrics.install().await {
            log::warn(format!("Metrics Server setup failed: {e}"));
        }
    }

    if ctx.config.ingress_enabled {
        let ingress = IngressAddon::new(ctx.runner(), &ctx.env);
        if let Err(e) = ingress.install().await {
            log::warn(format!("Ingress setup failed: {e}"));
        }
    }

    if ctx.config.flux_enabled {
        let flux = FluxManager::new(ctx.runner());
        match flux.is_installed().await {
            Ok(true) => log::debug("Flux already installed"),
            Ok(false) => {
                if let Err(e) = flux.install().await {
                    log::warn(format!("Flux install failed: {e}"));
                }
            }
            Err(e) => log::warn(format!("Could not check Flux install state: {e}")),
        }
    }

    if ctx.config.vault_enabled {
        let vault = VaultAddon::new(ctx.runner());
        match vault.is_installed().await {
            Ok(true) => log::debug("Vault already installed"),
            Ok(false) => {
                if let Err(e) = vault.install().await {
                    log::warn(format!("Vault install failed: {e}"));
                }
            }
            Err(e) => log::warn(format!("Could not check Vault install state: {e}")),
        }
    }

    addons::report_unmanaged_addons(&ctx.config);
}
