//! Storage command - contract-driven persistent storage

use hostk8s_kube::StorageManager;

use crate::context::AppContext;
use crate::error::Result;

/// Run `storage setup`
pub async fn setup(stack_arg: Option<&str>) -> Result<()> {
    let ctx = AppContext::load()?;
    let stack = ctx.resolve_stack(stack_arg);
    StorageManager::new(&ctx.root, &ctx.cluster())
        .setup(&stack)
        .await?;
    Ok(())
}

/// Run `storage cleanup`
pub async fn cleanup(stack_arg: Option<&str>) -> Result<()> {
    let ctx = AppContext::load()?;
    let stack = ctx.resolve_stack(stack_arg);
    StorageManager::new(&ctx.root, &ctx.cluster())
        .cleanup(&stack)
        .await?;
    Ok(())
}

/// Run `storage list`
pub async fn list(stack_arg: Option<&str>) -> Result<()> {
    let ctx = AppContext::load()?;
    StorageManager::new(&ctx.root, &ctx.cluster())
        .list(stack_arg)
        .await?;
    Ok(())
}
