//! Shared command context
//!
//! Every command starts from the same place: the project root (current
//! directory), the merged `.env`/process environment, and the cluster and
//! GitOps configuration derived from it.

use std::path::PathBuf;

use hostk8s_core::{ClusterConfig, Environment, GitOpsConfig};
use hostk8s_kube::{ClusterManager, FluxManager, StackDeployer, ToolRunner};

use crate::error::Result;

pub struct AppContext {
    pub root: PathBuf,
    pub env: Environment,
    pub config: ClusterConfig,
    pub gitops: GitOpsConfig,
}

impl AppContext {
    pub fn load() -> Result<Self> {
        let root = std::env::current_dir()?;
        let env = Environment::load();
        let config = ClusterConfig::from_env(&env)?;
        let gitops = GitOpsConfig::from_env(&env);
        Ok(Self {
            root,
            env,
            config,
            gitops,
        })
    }

    pub fn cluster(&self) -> ClusterManager {
        ClusterManager::new(&self.root, self.config.clone())
    }

    /// Runner bound to the cluster's kubeconfig
    pub fn runner(&self) -> ToolRunner {
        self.cluster().runner().clone()
    }

    pub fn flux(&self) -> FluxManager {
        FluxManager::new(self.runner())
    }

    pub fn stacks(&self) -> StackDeployer {
        StackDeployer::new(&self.root, self.cluster(), self.gitops.clone())
    }

    /// Stack name from an argument or SOFTWARE_STACK, defaulting to `sample`
    pub fn resolve_stack(&self, arg: Option<&str>) -> String {
        match arg {
            Some(stack) => stack.to_string(),
            None => self.env.get_or("SOFTWARE_STACK", "sample"),
        }
    }
}
