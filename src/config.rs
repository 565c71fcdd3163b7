//! Runner configuration.
//!
//! Optionally supplied as JSON through the `DOCKER_TEST_RUNNER_CONFIG`
//! environment variable; every field has a default, so an unset variable
//! means a default configuration, not an error.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable holding the JSON configuration.
pub const CONFIG_ENV_VAR: &str = "DOCKER_TEST_RUNNER_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Image namespace the catalog filters on.
    #[serde(default = "default_namespace")]
    pub image_namespace: String,

    /// Directory where per-run cid files are created.
    #[serde(default = "default_cid_dir")]
    pub cid_dir: PathBuf,

    /// Default deadline for a run, in seconds.
    #[serde(default = "default_max_seconds")]
    pub max_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_namespace: default_namespace(),
            cid_dir: default_cid_dir(),
            max_seconds: default_max_seconds(),
        }
    }
}

impl Config {
    /// Load from `DOCKER_TEST_RUNNER_CONFIG` when set, defaults otherwise.
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(json) => serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse {CONFIG_ENV_VAR}")),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Create a config from a JSON string (for testing).
    #[cfg(test)]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse JSON")
    }
}

fn default_namespace() -> String {
    "cyberdojo".into()
}

fn default_cid_dir() -> PathBuf {
    std::env::temp_dir()
}

const fn default_max_seconds() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_applies_all_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.image_namespace, "cyberdojo");
        assert_eq!(config.cid_dir, std::env::temp_dir());
        assert_eq!(config.max_seconds, 10);
    }

    #[test]
    fn fields_override_defaults() {
        let config = Config::from_json(
            r#"{
                "image_namespace": "acme",
                "cid_dir": "/var/run/test-runner",
                "max_seconds": 30
            }"#,
        )
        .unwrap();

        assert_eq!(config.image_namespace, "acme");
        assert_eq!(config.cid_dir, PathBuf::from("/var/run/test-runner"));
        assert_eq!(config.max_seconds, 30);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(Config::from_json("not json").is_err());
    }

    #[test]
    fn default_matches_empty_json() {
        let config = Config::default();
        assert_eq!(config.image_namespace, "cyberdojo");
        assert_eq!(config.max_seconds, 10);
    }
}
