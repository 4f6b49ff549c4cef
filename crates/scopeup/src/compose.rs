//! Thin wrapper over the container-orchestration CLI.
//!
//! Everything that shells out to `docker compose` goes through a
//! [`ComposeRunner`], so tests can swap the program for a shell script and
//! exercise the full lifecycle without docker.

use std::path::Path;

use anyhow::Context;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct ComposeRunner {
    program: String,
    base_args: Vec<String>,
}

impl Default for ComposeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ComposeRunner {
    pub fn new() -> Self {
        Self {
            program: "docker".to_string(),
            base_args: vec!["compose".to_string()],
        }
    }

    /// Replaces the docker CLI with an arbitrary program. The subcommand
    /// (`up`/`down`) is still appended, which a shell script sees as `$0`.
    pub fn with_program(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    /// Builds a command for `<program> <base_args> <subcommand>` with the
    /// working directory set to the workspace.
    pub fn command(&self, subcommand: &str, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args).arg(subcommand).current_dir(dir);
        cmd
    }

    /// Runs `compose down` in the workspace and waits for it to finish.
    pub async fn down(&self, dir: &Path) -> anyhow::Result<()> {
        let status = self
            .command("down", dir)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .with_context(|| format!("run {} down in {}", self.program, dir.display()))?;
        if !status.success() {
            anyhow::bail!("failed to remove explorer containers: {status}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn down_succeeds_with_benign_program() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ComposeRunner::with_program("true", vec![]);
        runner.down(dir.path()).await.unwrap();
    }

    #[tokio::test]
    async fn down_reports_nonzero_status() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ComposeRunner::with_program("false", vec![]);
        let err = runner.down(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("failed to remove"));
    }
}
