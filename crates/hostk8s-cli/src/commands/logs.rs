//! Logs command - tail Flux controller logs

use crate::context::AppContext;
use crate::error::Result;

/// Run the logs command
pub async fn run(kustomization: Option<&str>) -> Result<()> {
    let ctx = AppContext::load()?;
    ctx.flux().logs(kustomization).await?;
    Ok(())
}
