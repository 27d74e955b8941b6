//! Status command - show cluster, addon and GitOps status

use console::style;
use hostk8s_kube::{FluxResourceStatus, StatusCollector};

use crate::context::AppContext;
use crate::error::{CliError, Result};

/// Run the status command
pub async fn run(output_json: bool) -> Result<()> {
    let ctx = AppContext::load()?;
    let status = StatusCollector::new(ctx.cluster()).collect().await?;

    if output_json {
        let json = serde_json::to_string_pretty(&status)
            .map_err(|e| CliError::other(e.to_string()))?;
        println!("{json}");
        return Ok(());
    }

    println!("{}", style("CLUSTER").bold().underlined());
    println!("  Name:     {}", style(&status.cluster_name).cyan());
    let state = if status.running {
        style("running").green()
    } else {
        style("not running").red()
    };
    println!("  Status:   {state}");

    if !status.running {
        println!(
            "\n{} Run {} to create the cluster",
            style("→").blue(),
            style("hostk8s start").cyan()
        );
        return Ok(());
    }

    for node in &status.nodes {
        let mark = if node.ready {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!("  {} {} ({})", mark, node.name, style(&node.version).dim());
    }

    println!("\n{}", style("ADDONS").bold().underlined());
    print_flag("Registry", status.registry_running);
    print_flag("Flux", status.flux_installed);

    if status.flux_installed {
        println!("\n{}", style("GITOPS").bold().underlined());
        print_flux_section("GitRepositories", &status.git_repositories);
        print_flux_section("Kustomizations", &status.kustomizations);
    }

    println!("\n{}", style("APPLICATIONS").bold().underlined());
    if status.apps.is_empty() {
        println!("  {}", style("none deployed").dim());
    }
    for app in &status.apps {
        let ready = app.ready_replicas >= app.replicas && app.replicas > 0;
        let mark = if ready {
            style("✓").green()
        } else {
            style("✗").yellow()
        };
        println!(
            "  {} {}/{} ({}/{} ready)",
            mark,
            style(&app.namespace).dim(),
            app.name,
            app.ready_replicas,
            app.replicas
        );
    }

    Ok(())
}

fn print_flag(name: &str, enabled: bool) {
    let state = if enabled {
        style("running").green()
    } else {
        style("not installed").dim()
    };
    println!("  {name}:  {state}");
}

fn print_flux_section(title: &str, resources: &[FluxResourceStatus]) {
    println!("  {}", style(title).bold());
    if resources.is_empty() {
        println!("    {}", style("none").dim());
        return;
    }
    for resource in resources {
        let mark = match (resource.suspended, resource.ready) {
            (true, _) => style("⏸").yellow(),
            (false, Some(true)) => style("✓").green(),
            (false, Some(false)) => style("✗").red(),
            (false, None) => style("?").dim(),
        };
        if resource.message.is_empty() {
            println!("    {} {}", mark, resource.name);
        } else {
            println!(
                "    {} {} {}",
                mark,
                resource.name,
                style(&resource.message).dim()
            );
        }
    }
}
