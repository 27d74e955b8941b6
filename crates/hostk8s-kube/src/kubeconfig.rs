//! Kubeconfig detection
//!
//! Resolution order: explicit `KUBECONFIG`, then the container mount used
//! when the tooling runs inside a dev container, then the host path Kind
//! writes to under `data/`.

use std::path::{Path, PathBuf};

use crate::error::{KubeError, Result};

/// Kubeconfig path used when running inside a container
const CONTAINER_KUBECONFIG: &str = "/kubeconfig/config";

/// Kubeconfig path relative to the project root on the host
pub const HOST_KUBECONFIG: &str = "data/kubeconfig/config";

/// Locate the kubeconfig for the running cluster
///
/// A non-empty `KUBECONFIG` wins even when the file does not exist yet;
/// the user picked the location, tooling fills it in.
pub fn detect(root: &Path) -> Result<PathBuf> {
    if let Ok(env_path) = std::env::var("KUBECONFIG")
        && !env_path.trim().is_empty()
    {
        return Ok(PathBuf::from(env_path));
    }

    let container = PathBuf::from(CONTAINER_KUBECONFIG);
    if container.exists() {
        return Ok(container);
    }

    let host = root.join(HOST_KUBECONFIG);
    if host.exists() {
        return Ok(host);
    }

    Err(KubeError::KubeconfigNotFound {
        searched: host.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_path_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let kube_dir = dir.path().join("data/kubeconfig");
        std::fs::create_dir_all(&kube_dir).unwrap();
        std::fs::write(kube_dir.join("config"), "apiVersion: v1\n").unwrap();

        let found = detect(dir.path()).unwrap();
        assert_eq!(found, dir.path().join(HOST_KUBECONFIG));
    }

    #[test]
    fn missing_everywhere_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = detect(dir.path()).unwrap_err();
        assert!(matches!(err, KubeError::KubeconfigNotFound { .. }));
    }
}
