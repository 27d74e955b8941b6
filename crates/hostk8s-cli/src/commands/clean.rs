//! Clean command - delete the cluster and wipe local state

use hostk8s_core::logging as log;

use crate::context::AppContext;
use crate::error::Result;

/// Run the clean command
pub async fn run() -> Result<()> {
    let ctx = AppContext::load()?;

    let cluster = ctx.cluster();
    cluster.delete().await?;
    // delete() skips the registry when the cluster is already gone
    cluster.remove_registry_container().await;

    let data_dir = ctx.root.join("data");
    if data_dir.exists() {
        log::info(format!("Removing {}", data_dir.display()));
        std::fs::remove_dir_all(&data_dir)?;
    }

    log::success("Cluster deleted and local state wiped");
    Ok(())
}
