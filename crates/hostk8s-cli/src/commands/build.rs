//! Build command - build and push applications from src/
//!
//! Applications declare their build with either a `docker-bake.hcl`
//! (preferred) or a `docker-compose.yml`. Images push to the local registry
//! the compose/bake files point at, with BUILD_DATE and BUILD_VERSION
//! injected for image metadata.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::Utc;
use hostk8s_core::logging as log;
use tokio::process::Command;
use walkdir::WalkDir;

use crate::context::AppContext;
use crate::error::{CliError, Result};

const BUILD_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildFile {
    Bake,
    Compose,
}

impl BuildFile {
    fn file_name(&self) -> &'static str {
        match self {
            Self::Bake => "docker-bake.hcl",
            Self::Compose => "docker-compose.yml",
        }
    }
}

/// Run the build command
pub async fn run(app_path: Option<&str>, list: bool) -> Result<()> {
    let ctx = AppContext::load()?;

    if list {
        list_applications(&ctx.root);
        return Ok(());
    }

    let Some(app_path) = app_path else {
        return Err(CliError::usage(
            "Application path is required",
            "e.g. `hostk8s build src/registry-demo`, or `hostk8s build --list`",
        ));
    };

    let cluster = ctx.cluster();
    if !cluster.exists().await? || !cluster.is_ready().await? {
        return Err(CliError::cluster_with_help(
            "Cluster is not running; the registry is unavailable for pushes",
            "run `hostk8s start` first",
        ));
    }

    let (dir, build_file) = validate_path(&ctx.root, app_path)?;
    log::info(format!("[Build] Building application: {}", dir.display()));

    let build_date = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    log::info(format!("[Build] Build date: {build_date}"));
    log::info(format!("[Build] Version: {BUILD_VERSION}"));

    match build_file {
        BuildFile::Bake => {
            log::info("[Build] Using docker-bake.hcl for build and push...");
            run_docker(&dir, &build_date, &["buildx", "bake", "--push"]).await?;
        }
        BuildFile::Compose => {
            log::info("[Build] Using docker-compose.yml for build and push...");
            run_docker(&dir, &build_date, &["compose", "build"]).await?;
            log::info("[Build] Pushing to registry...");
            run_docker(&dir, &build_date, &["compose", "push"]).await?;
        }
    }

    log::success("[Build] Build and push complete");
    Ok(())
}

/// Find buildable application directories under src/
fn find_applications(root: &Path) -> Vec<(PathBuf, BuildFile)> {
    let src = root.join("src");
    if !src.exists() {
        return Vec::new();
    }

    let mut bake_dirs = Vec::new();
    let mut compose_dirs = Vec::new();
    for entry in WalkDir::new(&src).into_iter().filter_map(|e| e.ok()) {
        let Some(parent) = entry.path().parent() else {
            continue;
        };
        match entry.file_name().to_str() {
            Some("docker-bake.hcl") => bake_dirs.push(parent.to_path_buf()),
            Some("docker-compose.yml") => compose_dirs.push(parent.to_path_buf()),
            _ => {}
        }
    }

    let mut applications: Vec<(PathBuf, BuildFile)> = bake_dirs
        .iter()
        .map(|dir| (dir.clone(), BuildFile::Bake))
        .collect();
    // Compose is the fallback; skip directories that also carry a bake file
    applications.extend(
        compose_dirs
            .into_iter()
            .filter(|dir| !bake_dirs.contains(dir))
            .map(|dir| (dir, BuildFile::Compose)),
    );
    applications.sort_by(|a, b| a.0.cmp(&b.0));
    applications
}

fn list_applications(root: &Path) {
    let applications = find_applications(root);
    if applications.is_empty() {
        log::info("No applications found in src/");
        return;
    }
    log::info("Available applications:");
    for (dir, build_file) in applications {
        let shown = dir.strip_prefix(root).unwrap_or(&dir);
        log::info(format!("  {} ({})", shown.display(), build_file.file_name()));
    }
}

fn validate_path(root: &Path, app_path: &str) -> Result<(PathBuf, BuildFile)> {
    let dir = root.join(app_path);
    if !dir.is_dir() {
        list_applications(root);
        return Err(CliError::usage(
            format!("Directory not found: {app_path}"),
            "pick one of the applications listed above",
        ));
    }

    if dir.join(BuildFile::Bake.file_name()).exists() {
        Ok((dir, BuildFile::Bake))
    } else if dir.join(BuildFile::Compose.file_name()).exists() {
        Ok((dir, BuildFile::Compose))
    } else {
        Err(CliError::usage(
            format!("No docker-bake.hcl or docker-compose.yml found in {app_path}"),
            format!("expected {app_path}/docker-bake.hcl or {app_path}/docker-compose.yml"),
        ))
    }
}

/// Run docker in the app directory, streaming output to the terminal
async fn run_docker(dir: &Path, build_date: &str, args: &[&str]) -> Result<()> {
    log::info(format!("[Build] Running: docker {}", args.join(" ")));

    let status = Command::new("docker")
        .args(args)
        .current_dir(dir)
        .env("BUILD_DATE", build_date)
        .env("BUILD_VERSION", BUILD_VERSION)
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CliError::tool(
                "docker not found",
                "ensure Docker is installed and in PATH",
            ),
            _ => CliError::from(e),
        })?;

    if !status.success() {
        return Err(CliError::other(format!(
            "Docker command failed with exit code {}: docker {}",
            status.code().unwrap_or(-1),
            args.join(" ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_applications_prefers_bake() {
        let root = tempfile::tempdir().unwrap();
        let app_a = root.path().join("src/app-a");
        let app_b = root.path().join("src/app-b");
        std::fs::create_dir_all(&app_a).unwrap();
        std::fs::create_dir_all(&app_b).unwrap();
        std::fs::write(app_a.join("docker-bake.hcl"), "").unwrap();
        std::fs::write(app_a.join("docker-compose.yml"), "").unwrap();
        std::fs::write(app_b.join("docker-compose.yml"), "").unwrap();

        let found = find_applications(root.path());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], (app_a, BuildFile::Bake));
        assert_eq!(found[1], (app_b, BuildFile::Compose));
    }

    #[test]
    fn test_find_applications_without_src() {
        let root = tempfile::tempdir().unwrap();
        assert!(find_applications(root.path()).is_empty());
    }

    #[test]
    fn test_validate_path_errors() {
        let root = tempfile::tempdir().unwrap();
        assert!(validate_path(root.path(), "src/missing").is_err());

        let empty = root.path().join("src/empty");
        std::fs::create_dir_all(&empty).unwrap();
        assert!(validate_path(root.path(), "src/empty").is_err());
    }
}
