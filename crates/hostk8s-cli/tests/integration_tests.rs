//! Integration tests for CLI commands
//!
//! Only commands that never touch a cluster or external tools are exercised
//! here; everything else needs Docker and Kind.

use std::path::Path;
use std::process::Command;

/// Helper to run hostk8s with a working directory
fn hostk8s_in(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_hostk8s"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to execute hostk8s")
}

fn hostk8s(args: &[&str]) -> std::process::Output {
    hostk8s_in(Path::new("."), args)
}

mod cli_surface {
    use super::*;

    #[test]
    fn test_help_lists_subcommands() {
        let output = hostk8s(&["--help"]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        for subcommand in ["start", "stop", "up", "down", "status", "sync", "build"] {
            assert!(stdout.contains(subcommand), "help is missing {subcommand}");
        }
    }

    #[test]
    fn test_version() {
        let output = hostk8s(&["--version"]);
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("hostk8s"));
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        let output = hostk8s(&["teleport"]);
        assert!(!output.status.success());
    }

    #[test]
    fn test_secrets_requires_action() {
        let output = hostk8s(&["secrets"]);
        assert!(!output.status.success());
    }
}

mod sync_command {
    use super::*;

    #[test]
    fn test_conflicting_selectors_rejected() {
        let output = hostk8s(&["sync", "--stack", "sample", "--repo", "flux-system"]);
        assert!(!output.status.success());
        assert_eq!(output.status.code(), Some(64));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Only one of"));
    }
}

mod build_command {
    use super::*;

    #[test]
    fn test_list_with_no_src_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = hostk8s_in(dir.path(), &["build", "--list"]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("No applications found in src/"));
    }

    #[test]
    fn test_list_finds_applications() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("src/demo");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join("docker-compose.yml"), "services: {}\n").unwrap();

        let output = hostk8s_in(dir.path(), &["build", "--list"]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("src/demo"));
        assert!(stdout.contains("docker-compose.yml"));
    }

    #[test]
    fn test_path_required_without_list() {
        let dir = tempfile::tempdir().unwrap();
        let output = hostk8s_in(dir.path(), &["build"]);
        assert!(!output.status.success());
        assert_eq!(output.status.code(), Some(64));
    }
}
