//! Down command - remove a stack with its secrets and storage

use hostk8s_core::logging as log;
use hostk8s_kube::StorageManager;

use crate::commands::secrets;
use crate::context::AppContext;
use crate::error::Result;

/// Run the down command
pub async fn run(stack_arg: Option<&str>) -> Result<()> {
    let ctx = AppContext::load()?;
    let stack = ctx.resolve_stack(stack_arg);

    if !ctx.cluster().exists().await? {
        log::warn(format!(
            "Cluster '{}' does not exist, nothing to remove",
            ctx.config.cluster_name
        ));
        return Ok(());
    }

    ctx.stacks().remove(&stack).await?;

    if let Err(e) = secrets::remove_for_stack(&ctx, &stack).await {
        log::warn(format!("[Secrets] Secret cleanup for '{stack}' failed: {e}"));
    }

    let storage = StorageManager::new(&ctx.root, &ctx.cluster());
    if let Err(e) = storage.cleanup(&stack).await {
        log::warn(format!("[Storage] Storage cleanup for '{stack}' failed: {e}"));
    }

    log::success(format!("Stack '{stack}' removed"));
    Ok(())
}
