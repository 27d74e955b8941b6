//! Suspend/resume commands - pause GitOps reconciliation

use hostk8s_core::logging as log;
use hostk8s_kube::KubeError;

use crate::context::AppContext;
use crate::error::{CliError, Result};

/// Run the suspend (or resume) command
pub async fn run(suspend: bool) -> Result<()> {
    let ctx = AppContext::load()?;
    let flux = ctx.flux();

    if !flux.is_installed().await? {
        return Err(KubeError::FluxNotInstalled.into());
    }

    let outcome = if suspend {
        flux.suspend_all().await?
    } else {
        flux.resume_all().await?
    };

    let verb = if suspend { "suspended" } else { "resumed" };
    if !outcome.all_ok() {
        return Err(CliError::other(format!(
            "{} source(s) could not be {verb}: {}",
            outcome.failed.len(),
            outcome.failed.join(", ")
        )));
    }
    log::success(format!("{} source(s) {verb}", outcome.succeeded));
    Ok(())
}
