//! Restart command - stop and start for a quick development cycle

use hostk8s_core::logging as log;

use crate::commands::{start, stop};
use crate::context::AppContext;
use crate::error::{CliError, Result};

/// Run the restart command
pub async fn run(config_arg: Option<&str>) -> Result<()> {
    let ctx = AppContext::load()?;

    log::info("Stopping existing cluster...");
    stop::run().await?;

    // The delete must actually have taken effect before recreating
    if ctx.cluster().exists().await? {
        return Err(CliError::cluster(format!(
            "Cluster '{}' still exists after shutdown",
            ctx.config.cluster_name
        )));
    }

    log::info("Starting fresh cluster...");
    start::run(config_arg).await?;

    log::success("Cluster restart complete");
    Ok(())
}
