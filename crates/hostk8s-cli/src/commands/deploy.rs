//! Deploy command - deploy an individual app

use hostk8s_kube::AppDeployer;

use crate::context::AppContext;
use crate::error::Result;

/// Run the deploy command
pub async fn run(app: &str, namespace: &str) -> Result<()> {
    let ctx = AppContext::load()?;
    AppDeployer::new(&ctx.root, ctx.runner())
        .deploy(app, namespace)
        .await?;
    Ok(())
}
