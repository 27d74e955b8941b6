//! Stop command - delete the cluster, keep local state

use crate::context::AppContext;
use crate::error::Result;

/// Run the stop command
pub async fn run() -> Result<()> {
    let ctx = AppContext::load()?;
    ctx.cluster().delete().await?;
    Ok(())
}
