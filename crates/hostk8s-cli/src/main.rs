//! HostK8s CLI - host-mode Kubernetes development platform

use clap::{Parser, Subcommand};

mod commands;
mod context;
mod error;
mod exit_codes;

#[derive(Parser)]
#[command(name = "hostk8s")]
#[command(author = "HostK8s Contributors")]
#[command(version)]
#[command(about = "Kind clusters with GitOps stacks, one command at a time", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that required tools are installed
    Prepare,

    /// Create the cluster and enabled addons
    Start {
        /// Kind config name (e.g. "minimal" or "extension/my-config")
        config: Option<String>,
    },

    /// Delete the cluster, keeping kubeconfig and data
    Stop,

    /// Stop then start the cluster
    Restart {
        /// Kind config name passed to start
        config: Option<String>,
    },

    /// Start if needed, then deploy a software stack
    Up {
        /// Stack name (defaults to SOFTWARE_STACK, then "sample")
        stack: Option<String>,
    },

    /// Remove a software stack and its secrets and storage
    Down {
        /// Stack name (defaults to SOFTWARE_STACK, then "sample")
        stack: Option<String>,
    },

    /// Delete the cluster and wipe all local state under data/
    Clean,

    /// Show cluster, addon and GitOps status
    Status {
        /// Output status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Deploy an individual app from software/apps/
    Deploy {
        /// App name
        app: String,

        /// Target namespace
        #[arg(default_value = "default")]
        namespace: String,
    },

    /// Remove an individual app
    Remove {
        /// App name
        app: String,

        /// Target namespace
        #[arg(default_value = "default")]
        namespace: String,
    },

    /// Force Flux reconciliation
    Sync {
        /// Reconcile one stack (its source, then its bootstrap kustomization)
        #[arg(long)]
        stack: Option<String>,

        /// Reconcile one GitRepository
        #[arg(long)]
        repo: Option<String>,

        /// Reconcile one Kustomization
        #[arg(long)]
        kustomization: Option<String>,

        /// Also reconcile the kustomization's source
        #[arg(long)]
        with_source: bool,
    },

    /// Suspend all GitRepository sources
    Suspend,

    /// Resume all GitRepository sources
    Resume,

    /// Build and push an application from src/
    Build {
        /// Path to application directory (e.g. src/registry-demo)
        app_path: Option<String>,

        /// List buildable applications
        #[arg(short, long)]
        list: bool,
    },

    /// Tail Flux controller logs
    Logs {
        /// Follow a single Kustomization
        kustomization: Option<String>,
    },

    /// Manage stack secrets (Vault or direct apply)
    Secrets {
        #[command(subcommand)]
        action: SecretsAction,
    },

    /// Manage stack persistent storage
    Storage {
        #[command(subcommand)]
        action: StorageAction,
    },
}

#[derive(Subcommand)]
enum SecretsAction {
    /// Resolve a stack's secret contract and store the secrets
    Add { stack: Option<String> },
    /// Remove a stack's secrets
    Remove { stack: Option<String> },
    /// List managed secrets
    List { stack: Option<String> },
}

#[derive(Subcommand)]
enum StorageAction {
    /// Realize a stack's storage contract
    Setup { stack: Option<String> },
    /// Remove a stack's PersistentVolumes (data is preserved)
    Cleanup { stack: Option<String> },
    /// Show storage contract status
    List { stack: Option<String> },
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();

    // Set debug level
    if cli.debug {
        // SAFETY: We're the only thread touching the environment at this point
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }

    let result = run(cli).await;
    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> error::Result<()> {
    match cli.command {
        Commands::Prepare => commands::prepare::run().await,

        Commands::Start { config } => commands::start::run(config.as_deref()).await,

        Commands::Stop => commands::stop::run().await,

        Commands::Restart { config } => commands::restart::run(config.as_deref()).await,

        Commands::Up { stack } => commands::up::run(stack.as_deref()).await,

        Commands::Down { stack } => commands::down::run(stack.as_deref()).await,

        Commands::Clean => commands::clean::run().await,

        Commands::Status { json } => commands::status::run(json).await,

        Commands::Deploy { app, namespace } => commands::deploy::run(&app, &namespace).await,

        Commands::Remove { app, namespace } => commands::remove::run(&app, &namespace).await,

        Commands::Sync {
            stack,
            repo,
            kustomization,
            with_source,
        } => {
            commands::sync::run(
                stack.as_deref(),
                repo.as_deref(),
                kustomization.as_deref(),
                with_source,
            )
            .await
        }

        Commands::Suspend => commands::suspend::run(true).await,

        Commands::Resume => commands::suspend::run(false).await,

        Commands::Build { app_path, list } => commands::build::run(app_path.as_deref(), list).await,

        Commands::Logs { kustomization } => commands::logs::run(kustomization.as_deref()).await,

        Commands::Secrets { action } => match action {
            SecretsAction::Add { stack } => commands::secrets::add(stack.as_deref()).await,
            SecretsAction::Remove { stack } => commands::secrets::remove(stack.as_deref()).await,
            SecretsAction::List { stack } => commands::secrets::list(stack.as_deref()).await,
        },

        Commands::Storage { action } => match action {
            StorageAction::Setup { stack } => commands::storage::setup(stack.as_deref()).await,
            StorageAction::Cleanup { stack } => commands::storage::cleanup(stack.as_deref()).await,
            StorageAction::List { stack } => commands::storage::list(stack.as_deref()).await,
        },
    }
}
