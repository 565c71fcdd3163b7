//! Bounded execution of one command inside one disposable container.
//!
//! Every invocation gets its own container and its own cid file; no state
//! is shared across runs. Whatever the outcome — completion, failure,
//! deadline kill — the container is stopped and removed before `run`
//! returns. Timing out is a normal, reportable outcome here, not an error.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::catalog::ImageName;
use crate::command::{DockerRunCommand, VolumeMount, SANDBOX_MOUNT};
use crate::shell::{fatal_error, Shell, KILL};

/// A (language, test framework) toolchain: its container image and the
/// host directory holding the toolchain files.
#[derive(Debug, Clone)]
pub struct Language {
    pub image_name: ImageName,
    pub path: PathBuf,
}

/// One learner's writable work area, tied to the language it runs under.
/// Mounted read-write at `/sandbox` inside the container.
#[derive(Debug, Clone)]
pub struct Sandbox {
    pub path: PathBuf,
    pub language: Language,
}

/// A cid-file path for one invocation; never reused across runs.
pub fn unique_cid_file(dir: &Path) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("runner_{}_{n}.cid", std::process::id()))
}

/// Runs test commands in freshly mounted, network-less containers and
/// guarantees their teardown.
#[derive(Debug)]
pub struct DockerRunner<S> {
    shell: S,
    cid_file: PathBuf,
}

impl<S: Shell> DockerRunner<S> {
    pub fn new(shell: S, cid_file: impl Into<PathBuf>) -> Self {
        Self {
            shell,
            cid_file: cid_file.into(),
        }
    }

    /// Hook: a learner's avatar has been started. The base runner does
    /// nothing; variants may override behaviour around it.
    pub fn started(&self) {}

    /// Hook: the tests are about to run. The base runner does nothing.
    pub fn pre_test(&self) {}

    /// Execute `command` inside a container for `sandbox`, bounded by
    /// `max_seconds`.
    ///
    /// Returns the combined captured output verbatim, or the literal
    /// `"Unable to complete the tests in <max_seconds> seconds."` when the
    /// deadline killed the run. `Err` only when the shell capability could
    /// not execute the command at all; cleanup still runs first.
    #[instrument(
        skip(self, sandbox, command),
        fields(image = %sandbox.language.image_name)
    )]
    pub async fn run(&self, sandbox: &Sandbox, command: &str, max_seconds: u64) -> Result<String> {
        // Idempotent pre-clean so a stale id can never leak into this run
        self.shell
            .run(&format!("rm -f {}", self.cid_file.display()))
            .await?;

        let docker_run = DockerRunCommand::new(sandbox.language.image_name.clone(), &self.cid_file)
            .mount(VolumeMount::read_only_at_self(&sandbox.language.path))
            .mount(VolumeMount::read_write(&sandbox.path, SANDBOX_MOUNT))
            .compose(command, max_seconds);

        let outcome = self.shell.run(&docker_run).await;
        self.release_container().await;

        let outcome = outcome?;
        if outcome.status == fatal_error(KILL) {
            debug!("Run killed by the deadline");
            Ok(format!(
                "Unable to complete the tests in {max_seconds} seconds."
            ))
        } else {
            debug!(status = outcome.status, "Run completed");
            Ok(outcome.text)
        }
    }

    /// Stop and remove the container, if the cid file names one. The file
    /// is empty when the container never started or the kill landed before
    /// `docker run` wrote the id. Best-effort: failures are logged, never
    /// escalated into the run's result.
    async fn release_container(&self) {
        let cid = match self
            .shell
            .run(&format!("cat {}", self.cid_file.display()))
            .await
        {
            Ok(output) if output.status == 0 => output.text.trim().to_string(),
            Ok(_) => String::new(),
            Err(e) => {
                warn!(error = %e, "Could not read the cid file");
                return;
            }
        };

        if cid.is_empty() {
            debug!("No container id recorded; nothing to release");
            return;
        }

        if let Err(e) = self.shell.run(&format!("docker stop {cid}")).await {
            warn!(container = %cid, error = %e, "docker stop failed");
        }
        if let Err(e) = self.shell.run(&format!("docker rm {cid}")).await {
            warn!(container = %cid, error = %e, "docker rm failed");
        }
    }
}
