//! Secrets command - contract-driven secret management
//!
//! With Vault enabled, secrets flow through the Vault pipeline and come back
//! into the cluster via ExternalSecrets. Without Vault they are resolved
//! locally and applied as plain Kubernetes secrets.

use hostk8s_core::logging as log;
use hostk8s_core::{SecretContract, StackPaths};
use hostk8s_kube::{SecretApplier, Tool};
use hostk8s_vault::{SecretPipeline, VaultClient};

use crate::context::AppContext;
use crate::error::Result;

/// Run `secrets add`
pub async fn add(stack_arg: Option<&str>) -> Result<()> {
    let ctx = AppContext::load()?;
    let stack = ctx.resolve_stack(stack_arg);
    add_for_stack(&ctx, &stack).await
}

/// Run `secrets remove`
pub async fn remove(stack_arg: Option<&str>) -> Result<()> {
    let ctx = AppContext::load()?;
    let stack = ctx.resolve_stack(stack_arg);
    remove_for_stack(&ctx, &stack).await
}

/// Run `secrets list`
pub async fn list(stack_arg: Option<&str>) -> Result<()> {
    let ctx = AppContext::load()?;

    if ctx.config.vault_enabled {
        let client = VaultClient::from_env(&ctx.env)?;
        let pipeline = SecretPipeline::new(&ctx.root, client);
        let paths = pipeline.list(stack_arg).await?;
        if paths.is_empty() {
            log::info("No secrets stored in Vault");
        } else {
            for path in paths {
                println!("{path}");
            }
        }
        return Ok(());
    }

    // Direct mode: managed secrets carry the hostk8s.io/managed label
    let mut args = vec!["get", "secrets", "-A", "-o", "wide"];
    let selector;
    if let Some(stack) = stack_arg {
        selector = format!("hostk8s.io/managed=true,hostk8s.io/contract={stack}");
        args.extend(["-l", selector.as_str()]);
    } else {
        args.extend(["-l", "hostk8s.io/managed=true"]);
    }
    let output = ctx.runner().run(Tool::Kubectl, args).await?;
    print!("{}", output.stdout);
    Ok(())
}

/// Process a stack's secret contract, shared with `up`
pub async fn add_for_stack(ctx: &AppContext, stack: &str) -> Result<()> {
    if ctx.config.vault_enabled {
        let client = VaultClient::from_env(&ctx.env)?;
        SecretPipeline::new(&ctx.root, client).add(stack).await?;
        return Ok(());
    }

    let contract_path = StackPaths::new(&ctx.root, stack).secrets_contract();
    if !contract_path.exists() {
        log::info(format!("[Secrets] No secret contract for stack '{stack}'"));
        return Ok(());
    }
    let contract = SecretContract::load(&contract_path)?;
    SecretApplier::new(ctx.runner())
        .apply_contract(&contract, stack)
        .await?;
    Ok(())
}

/// Remove a stack's secrets, shared with `down`
pub async fn remove_for_stack(ctx: &AppContext, stack: &str) -> Result<()> {
    if ctx.config.vault_enabled {
        let client = VaultClient::from_env(&ctx.env)?;
        SecretPipeline::new(&ctx.root, client).remove(stack).await?;
        return Ok(());
    }

    let contract_path = StackPaths::new(&ctx.root, stack).secrets_contract();
    if !contract_path.exists() {
        log::info(format!("[Secrets] No secret contract for stack '{stack}'"));
        return Ok(());
    }
    let contract = SecretContract::load(&contract_path)?;
    SecretApplier::new(ctx.runner())
        .remove_contract(&contract)
        .await?;
    Ok(())
}
