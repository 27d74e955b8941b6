//! External tool invocation
//!
//! Everything HostK8s does against a cluster goes through the CLIs of the
//! tools it wraps (`kind`, `kubectl`, `flux`, `helm`, `docker`). The
//! [`ToolRunner`] spawns them with `KUBECONFIG` injected and turns missing
//! binaries and non-zero exits into typed errors with install hints.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{KubeError, Result};

/// The external tools HostK8s orchestrates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Kind,
    Kubectl,
    Flux,
    Helm,
    Docker,
}

impl Tool {
    /// The binary name on PATH
    pub fn binary(&self) -> &'static str {
        match self {
            Tool::Kind => "kind",
            Tool::Kubectl => "kubectl",
            Tool::Flux => "flux",
            Tool::Helm => "helm",
            Tool::Docker => "docker",
        }
    }

    /// Hint shown when the binary is missing
    pub fn install_hint(&self) -> &'static str {
        match self {
            Tool::Kind => "Install kind: https://kind.sigs.k8s.io/docs/user/quick-start/",
            Tool::Kubectl => "Install kubectl: https://kubernetes.io/docs/tasks/tools/",
            Tool::Flux => "Install the flux CLI: https://fluxcd.io/flux/installation/",
            Tool::Helm => "Install helm: https://helm.sh/docs/intro/install/",
            Tool::Docker => "Install Docker and make sure the daemon is running",
        }
    }

    /// Arguments that make the tool print a version and exit
    fn version_args(&self) -> &'static [&'static str] {
        match self {
            Tool::Kind => &["version"],
            Tool::Kubectl => &["version", "--client"],
            Tool::Flux => &["version", "--client"],
            Tool::Helm => &["version", "--short"],
            Tool::Docker => &["--version"],
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary())
    }
}

/// Captured output of a finished tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Spawns external tools with a consistent environment
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    kubeconfig: Option<PathBuf>,
}

impl ToolRunner {
    /// A runner without a kubeconfig, for tools that do not need one
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner that exports `KUBECONFIG` to every spawned process
    pub fn with_kubeconfig(kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            kubeconfig: Some(kubeconfig.into()),
        }
    }

    pub fn kubeconfig(&self) -> Option<&Path> {
        self.kubeconfig.as_deref()
    }

    /// Run a tool and fail on a non-zero exit
    pub async fn run<I, S>(&self, tool: Tool, args: I) -> Result<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (output, rendered) = self.spawn(tool, args, None).await?;
        if !output.success() {
            return Err(KubeError::ToolFailed {
                tool: tool.binary().to_string(),
                args: rendered,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// Run a tool, returning the output even on a non-zero exit
    ///
    /// Only a missing binary or a spawn failure is an error here. Callers
    /// use this for best-effort steps and for probes where a non-zero exit
    /// is an answer, not a failure.
    pub async fn try_run<I, S>(&self, tool: Tool, args: I) -> Result<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (output, _) = self.spawn(tool, args, None).await?;
        Ok(output)
    }

    /// Pipe a manifest to `kubectl apply -f -`
    pub async fn apply_stdin(&self, manifest: &str) -> Result<ToolOutput> {
        let (output, rendered) = self
            .spawn(Tool::Kubectl, ["apply", "-f", "-"], Some(manifest))
            .await?;
        if !output.success() {
            return Err(KubeError::ToolFailed {
                tool: Tool::Kubectl.binary().to_string(),
                args: rendered,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// Pipe a manifest to `kubectl apply -f -`, tolerating failure
    pub async fn try_apply_stdin(&self, manifest: &str) -> Result<ToolOutput> {
        let (output, _) = self
            .spawn(Tool::Kubectl, ["apply", "-f", "-"], Some(manifest))
            .await?;
        Ok(output)
    }

    /// Whether the tool's binary is on PATH and answers a version probe
    pub async fn available(&self, tool: Tool) -> bool {
        matches!(self.try_run(tool, tool.version_args()).await, Ok(out) if out.success())
    }

    async fn spawn<I, S>(
        &self,
        tool: Tool,
        args: I,
        stdin: Option<&str>,
    ) -> Result<(ToolOutput, String)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<std::ffi::OsString> =
            args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let rendered = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");

        let mut cmd = Command::new(tool.binary());
        cmd.args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(kubeconfig) = &self.kubeconfig {
            cmd.env("KUBECONFIG", kubeconfig);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                KubeError::ToolMissing {
                    tool: tool.binary().to_string(),
                    hint: tool.install_hint().to_string(),
                }
            } else {
                KubeError::Io(e)
            }
        })?;

        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input.as_bytes()).await?;
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        Ok((
            ToolOutput {
                code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            rendered,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_binary_names() {
        assert_eq!(Tool::Kind.binary(), "kind");
        assert_eq!(Tool::Kubectl.binary(), "kubectl");
        assert_eq!(Tool::Docker.binary(), "docker");
    }

    #[tokio::test]
    async fn missing_binary_maps_to_tool_missing() {
        // "kind" is almost certainly absent in CI; if it is present the
        // spawn succeeds and the test still passes through the Ok arm.
        let runner = ToolRunner::new();
        match runner.try_run(Tool::Kind, ["get", "clusters"]).await {
            Err(KubeError::ToolMissing { tool, .. }) => assert_eq!(tool, "kind"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => {}
        }
    }
}
