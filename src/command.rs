//! Structured composition of the bounded `docker run` command line.
//!
//! The invocation carries two nested deadlines: the inner `timeout` bounds
//! the test command itself at exactly `max_seconds`, the outer one bounds
//! the whole container invocation at `max_seconds + 5`. The outer guard
//! only ever fires if the inner one failed to terminate the process.

use std::path::{Path, PathBuf};

use crate::catalog::ImageName;
use crate::shell::KILL;

/// Unprivileged in-container account every run executes as.
pub const CONTAINER_USER: &str = "www-data";

/// Fixed in-container mount point and working directory for the sandbox.
pub const SANDBOX_MOUNT: &str = "/sandbox";

/// Safety margin of the outer timeout over the inner one, in seconds.
pub const OUTER_MARGIN_SECONDS: u64 = 5;

/// Quote for POSIX shells: wrap in single quotes, escaping embedded ones.
#[must_use]
pub fn quoted(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Wrap `command` in a GNU `timeout` that SIGKILLs after `seconds`.
/// SIGKILL because the target must not be able to trap the deadline.
#[must_use]
pub fn timeout_killing(seconds: u64, command: &str) -> String {
    format!("timeout --signal={KILL} {seconds}s {command}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    ReadOnly,
    ReadWrite,
}

impl MountMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "ro",
            Self::ReadWrite => "rw",
        }
    }
}

/// One `-v host:container:mode` volume mount.
#[derive(Debug, Clone)]
pub struct VolumeMount {
    host: PathBuf,
    container: String,
    mode: MountMode,
}

impl VolumeMount {
    pub fn read_only(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            mode: MountMode::ReadOnly,
        }
    }

    pub fn read_write(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            mode: MountMode::ReadWrite,
        }
    }

    /// Mount a host directory read-only at the same path inside the
    /// container, so toolchain paths are identical on both sides.
    pub fn read_only_at_self(host: impl AsRef<Path>) -> Self {
        let host = host.as_ref();
        Self::read_only(host, host.display().to_string())
    }

    fn render(&self) -> String {
        format!(
            "-v {}",
            quoted(&format!(
                "{}:{}:{}",
                self.host.display(),
                self.container,
                self.mode.as_str()
            ))
        )
    }
}

/// Builder for one disposable-container invocation.
///
/// Fixed policy, not configurable: unprivileged user, no network, the
/// container id recorded to the cid file by `docker run` itself (so the
/// id survives a kill of the outer process), workdir `/sandbox`.
#[derive(Debug, Clone)]
pub struct DockerRunCommand {
    image: ImageName,
    cid_file: PathBuf,
    mounts: Vec<VolumeMount>,
}

impl DockerRunCommand {
    pub fn new(image: ImageName, cid_file: impl Into<PathBuf>) -> Self {
        Self {
            image,
            cid_file: cid_file.into(),
            mounts: Vec::new(),
        }
    }

    #[must_use]
    pub fn mount(mut self, mount: VolumeMount) -> Self {
        self.mounts.push(mount);
        self
    }

    /// The full command line: `command` under an inner timeout of exactly
    /// `max_seconds`, the whole `docker run` under an outer timeout of
    /// `max_seconds + 5`, combined output captured at both layers.
    #[must_use]
    pub fn compose(&self, command: &str, max_seconds: u64) -> String {
        let inner = timeout_killing(max_seconds, &format!("{command} 2>&1"));

        let mut parts = vec![
            format!("docker run --user={CONTAINER_USER}"),
            format!("--cidfile={}", quoted(&self.cid_file.display().to_string())),
            "--net=none".to_string(),
        ];
        parts.extend(self.mounts.iter().map(VolumeMount::render));
        parts.push(format!("-w {SANDBOX_MOUNT}"));
        parts.push(self.image.to_string());
        parts.push(format!("/bin/bash -c {} 2>&1", quoted(&inner)));

        timeout_killing(max_seconds + OUTER_MARGIN_SECONDS, &parts.join(" "))
    }
}
