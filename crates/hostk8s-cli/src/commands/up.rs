//! Up command - start the cluster if needed, then deploy a stack
//!
//! Secrets and storage are prepared before the stack is applied so that
//! ExternalSecrets and PersistentVolumeClaims bind as soon as Flux
//! reconciles the stack. Failures in either are logged and skipped; the
//! stack deployment itself decides success.

use hostk8s_core::logging as log;
use hostk8s_kube::StorageManager;

use crate::commands::{secrets, start};
use crate::context::AppContext;
use crate::error::Result;

/// Run the up command
pub async fn run(stack_arg: Option<&str>) -> Result<()> {
    let ctx = AppContext::load()?;
    let stack = ctx.resolve_stack(stack_arg);

    let cluster = ctx.cluster();
    if !cluster.exists().await? {
        log::info("No cluster found, starting one...");
        cluster.create(None).await?;
        start::install_addons(&ctx).await;
    } else if ctx.config.flux_enabled || ctx.config.vault_enabled {
        // Running cluster may predate the current addon flags
        start::install_addons(&ctx).await;
    }

    if let Err(e) = secrets::add_for_stack(&ctx, &stack).await {
        log::warn(format!("[Secrets] Skipping secrets for '{stack}': {e}"));
    }

    let storage = StorageManager::new(&ctx.root, &ctx.cluster());
    if let Err(e) = storage.setup(&stack).await {
        log::warn(format!("[Storage] Skipping storage for '{stack}': {e}"));
    }

    ctx.stacks().deploy(&stack).await?;
    Ok(())
}
