//! Shell-execution capability.
//!
//! The catalog and the runner never talk to Docker directly; they go
//! through the [`Shell`] trait so the container runtime is a pluggable
//! collaborator and the callers are testable without one.

use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Signal used for every deadline kill. SIGKILL cannot be trapped or
/// ignored by the target process.
pub const KILL: i32 = 9;

/// Exit status reported for a process terminated by `signal`.
pub const fn fatal_error(signal: i32) -> i32 {
    128 + signal
}

/// Combined output of one shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    /// Captured stdout followed by stderr.
    pub text: String,
    /// Exit status; `128 + N` when the process died from signal `N`.
    pub status: i32,
}

/// Runs one command line and returns its combined output.
///
/// A non-zero status is a normal outcome, not an `Err` — test suites fail
/// all the time. `Err` means the command could not be spawned at all.
#[async_trait]
pub trait Shell: Send + Sync {
    async fn run(&self, command: &str) -> Result<ShellOutput>;
}

#[async_trait]
impl<T: Shell + ?Sized> Shell for &T {
    async fn run(&self, command: &str) -> Result<ShellOutput> {
        (**self).run(command).await
    }
}

/// Shell that executes commands on the host via `/bin/sh -c`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl SystemShell {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Shell for SystemShell {
    async fn run(&self, command: &str) -> Result<ShellOutput> {
        debug!(command, "Running shell command");

        let output = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to spawn shell command: {command}"))?;

        let status = exit_status(&output.status);
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        debug!(status, "Shell command completed");
        Ok(ShellOutput { text, status })
    }
}

#[cfg(unix)]
fn exit_status(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .unwrap_or_else(|| status.signal().map_or(-1, fatal_error))
}

#[cfg(not(unix))]
fn exit_status(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_error_is_128_plus_signal() {
        assert_eq!(fatal_error(KILL), 137);
        assert_eq!(fatal_error(15), 143);
    }

    #[tokio::test]
    async fn system_shell_captures_stdout() {
        let output = SystemShell::new().run("printf hello").await.unwrap();
        assert_eq!(output.text, "hello");
        assert_eq!(output.status, 0);
    }

    #[tokio::test]
    async fn system_shell_reports_exit_status() {
        let output = SystemShell::new().run("exit 7").await.unwrap();
        assert_eq!(output.status, 7);
    }

    #[tokio::test]
    async fn system_shell_captures_stderr_after_stdout() {
        let output = SystemShell::new()
            .run("printf out; printf err >&2")
            .await
            .unwrap();
        assert_eq!(output.text, "outerr");
    }

    #[tokio::test]
    async fn system_shell_reads_files_like_the_cid_recovery_path() {
        let dir = tempfile::tempdir().unwrap();
        let cid_file = dir.path().join("run.cid");
        std::fs::write(&cid_file, "cid123\n").unwrap();

        let output = SystemShell::new()
            .run(&format!("cat {}", cid_file.display()))
            .await
            .unwrap();

        assert_eq!(output.text.trim(), "cid123");
        assert_eq!(output.status, 0);
    }

    #[tokio::test]
    async fn spy_shell_records_and_replays() {
        use spy::SpyShell;

        let shell = SpyShell::new();
        shell.stub("blah", 2);

        let first = shell.run("docker images").await.unwrap();
        assert_eq!(first.text, "blah");
        assert_eq!(first.status, 2);

        // Un-stubbed commands succeed with empty output
        let second = shell.run("docker stop abc").await.unwrap();
        assert_eq!(second.text, "");
        assert_eq!(second.status, 0);

        assert_eq!(shell.spied(), vec!["docker images", "docker stop abc"]);
    }

    #[tokio::test]
    async fn spy_shell_replays_scripted_failures() {
        use spy::SpyShell;

        let shell = SpyShell::new();
        shell.stub_err("bash: fork: Resource temporarily unavailable");

        let result = shell.run("docker run whatever").await;
        assert!(result.is_err());
        assert_eq!(shell.spied(), vec!["docker run whatever"]);
    }
}
