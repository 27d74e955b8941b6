//! Application discovery under `software/apps/`
//!
//! An app directory is recognized by one of three marker files, which also
//! selects how it is deployed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// How an application directory is deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentType {
    /// `Chart.yaml` present: `helm upgrade --install`
    Helm,
    /// `kustomization.yaml` present: `kubectl apply -k`
    Kustomize,
    /// `app.yaml` present: `kubectl apply -f`
    Legacy,
}

/// Directory of an application within the project root
pub fn app_dir(root: &Path, app: &str) -> PathBuf {
    root.join("software/apps").join(app)
}

/// Detect the deployment type of an application, if it exists
pub fn app_deployment_type(root: &Path, app: &str) -> Option<DeploymentType> {
    let dir = app_dir(root, app);
    if dir.join("Chart.yaml").exists() {
        Some(DeploymentType::Helm)
    } else if dir.join("kustomization.yaml").exists() {
        Some(DeploymentType::Kustomize)
    } else if dir.join("app.yaml").exists() {
        Some(DeploymentType::Legacy)
    } else {
        None
    }
}

/// List all application names under `software/apps/`, sorted
pub fn list_available_apps(root: &Path) -> Vec<String> {
    let apps_dir = root.join("software/apps");
    if !apps_dir.exists() {
        return Vec::new();
    }

    let mut apps = BTreeSet::new();
    for entry in WalkDir::new(&apps_dir).into_iter().filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy();
        if (name == "Chart.yaml" || name == "kustomization.yaml" || name == "app.yaml")
            && let Some(parent) = entry.path().parent()
            && let Some(app) = parent.file_name()
        {
            apps.insert(app.to_string_lossy().into_owned());
        }
    }
    apps.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let apps = dir.path().join("software/apps");
        std::fs::create_dir_all(apps.join("voting-app")).unwrap();
        std::fs::write(apps.join("voting-app/Chart.yaml"), "name: voting-app\n").unwrap();
        std::fs::create_dir_all(apps.join("simple")).unwrap();
        std::fs::write(apps.join("simple/kustomization.yaml"), "resources: []\n").unwrap();
        std::fs::create_dir_all(apps.join("legacy-web")).unwrap();
        std::fs::write(apps.join("legacy-web/app.yaml"), "kind: Deployment\n").unwrap();
        std::fs::create_dir_all(apps.join("not-an-app")).unwrap();
        dir
    }

    #[test]
    fn test_list_available_apps() {
        let dir = fixture();
        let apps = list_available_apps(dir.path());
        assert_eq!(apps, vec!["legacy-web", "simple", "voting-app"]);
    }

    #[test]
    fn test_deployment_type_detection() {
        let dir = fixture();
        assert_eq!(
            app_deployment_type(dir.path(), "voting-app"),
            Some(DeploymentType::Helm)
        );
        assert_eq!(
            app_deployment_type(dir.path(), "simple"),
            Some(DeploymentType::Kustomize)
        );
        assert_eq!(
            app_deployment_type(dir.path(), "legacy-web"),
            Some(DeploymentType::Legacy)
        );
        assert_eq!(app_deployment_type(dir.path(), "not-an-app"), None);
        assert_eq!(app_deployment_type(dir.path(), "missing"), None);
    }

    #[test]
    fn test_missing_apps_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_available_apps(dir.path()).is_empty());
    }
}
