//! Sync command - force Flux reconciliation

use hostk8s_core::logging as log;
use hostk8s_kube::KubeError;

use crate::context::AppContext;
use crate::error::{CliError, Result};

/// Run the sync command
pub async fn run(
    stack: Option<&str>,
    repo: Option<&str>,
    kustomization: Option<&str>,
    with_source: bool,
) -> Result<()> {
    let ctx = AppContext::load()?;
    let flux = ctx.flux();

    if [stack.is_some(), repo.is_some(), kustomization.is_some()]
        .iter()
        .filter(|set| **set)
        .count()
        > 1
    {
        return Err(CliError::usage(
            "Only one of --stack, --repo or --kustomization may be given",
            "run `hostk8s sync` without flags to reconcile everything",
        ));
    }

    if !flux.is_installed().await? {
        return Err(KubeError::FluxNotInstalled.into());
    }

    if let Some(stack) = stack {
        flux.sync_stack(stack).await?;
        return Ok(());
    }
    if let Some(repo) = repo {
        flux.sync_repository(repo).await?;
        return Ok(());
    }
    if let Some(kustomization) = kustomization {
        flux.sync_kustomization(kustomization, with_source).await?;
        return Ok(());
    }

    let outcome = flux.sync_all().await?;
    if !outcome.all_ok() {
        return Err(CliError::other(format!(
            "{} resource(s) failed to reconcile: {}",
            outcome.failed.len(),
            outcome.failed.join(", ")
        )));
    }
    log::success(format!("Reconciled {} resource(s)", outcome.succeeded));
    Ok(())
}
