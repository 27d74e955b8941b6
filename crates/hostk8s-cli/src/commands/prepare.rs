//! Prepare command - preflight check for required tools

use console::style;
use hostk8s_kube::{Tool, ToolRunner};

use crate::error::{CliError, Result};

const REQUIRED: [Tool; 5] = [Tool::Docker, Tool::Kind, Tool::Kubectl, Tool::Helm, Tool::Flux];

/// Run the prepare command
pub async fn run() -> Result<()> {
    let runner = ToolRunner::new();
    let mut missing = Vec::new();

    println!("{}", style("REQUIRED TOOLS").bold().underlined());
    for tool in REQUIRED {
        if runner.available(tool).await {
            println!("  {} {}", style("✓").green(), tool);
        } else {
            println!(
                "  {} {} {}",
                style("✗").red(),
                tool,
                style(format!("({})", tool.install_hint())).dim()
            );
            missing.push(tool);
        }
    }

    // A present docker binary is not enough; the daemon must answer
    if !missing.contains(&Tool::Docker) {
        let info = runner.try_run(Tool::Docker, ["info"]).await?;
        if !info.success() {
            println!(
                "  {} docker daemon is not running",
                style("✗").red()
            );
            return Err(CliError::tool(
                "Docker daemon is not running",
                "start Docker Desktop or the docker service, then retry",
            ));
        }
    }

    if missing.is_empty() {
        println!("\n{} All required tools are installed", style("✓").green());
        Ok(())
    } else {
        let names: Vec<&str> = missing.iter().map(|t| t.binary()).collect();
        Err(CliError::tool(
            format!("Missing required tools: {}", names.join(", ")),
            "install the tools listed above, then run `hostk8s prepare` again",
        ))
    }
}
