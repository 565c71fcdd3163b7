//! Image catalog — startup discovery of runnable container images.
//!
//! Queries Docker once at construction: first an availability probe, then
//! a listing of local images filtered to the configured namespace. The
//! resulting snapshot is immutable for the process lifetime; images added
//! or removed on the host afterwards are not reflected.

use std::fmt;

use thiserror::Error;
use tracing::info;

use crate::shell::Shell;

/// Catalog construction errors. Unavailability of the runtime is fatal —
/// the system is useless without it, so we fail at startup, no retry.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("docker is not installed or the daemon is not reachable")]
    RuntimeUnavailable,

    #[error(transparent)]
    Shell(#[from] anyhow::Error),
}

/// Name of a locally available container image.
///
/// Format: `<namespace>/<language>-<version>_<testframework>`,
/// e.g. `cyberdojo/python-3.3.5_pytest`. One name identifies one runnable
/// (language, test framework) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageName(String);

impl ImageName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into namespace, language and test-framework parts, dropping
    /// the version segment. `None` when the name does not follow the
    /// `<namespace>/<language>-<version>_<testframework>` format.
    fn parts(&self) -> Option<ImageNameParts<'_>> {
        let (namespace, rest) = self.0.split_once('/')?;
        let (stem, test_framework) = rest.rsplit_once('_')?;
        let language = match stem.rsplit_once('-') {
            Some((language, version)) if version.starts_with(|c: char| c.is_ascii_digit()) => {
                language
            }
            _ => stem,
        };
        Some(ImageNameParts {
            namespace,
            language,
            test_framework,
        })
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ImageName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[derive(Debug)]
struct ImageNameParts<'a> {
    namespace: &'a str,
    language: &'a str,
    test_framework: &'a str,
}

/// Immutable snapshot of the images runnable on this host.
#[derive(Debug, Clone)]
pub struct ImageCatalog {
    namespace: String,
    image_names: Vec<ImageName>,
}

impl ImageCatalog {
    /// Probe the runtime and list local images under `namespace`.
    ///
    /// Fails with [`CatalogError::RuntimeUnavailable`] when the probe
    /// reports Docker missing; no listing query is attempted in that case.
    pub async fn discover(shell: &dyn Shell, namespace: &str) -> Result<Self, CatalogError> {
        let probe = shell.run("docker info > /dev/null 2>&1").await?;
        if probe.status != 0 {
            return Err(CatalogError::RuntimeUnavailable);
        }

        let listing = shell.run("docker images").await?;
        let image_names = parse_listing(&listing.text, namespace);

        info!(namespace, count = image_names.len(), "Discovered runnable images");
        Ok(Self {
            namespace: namespace.to_string(),
            image_names,
        })
    }

    /// The discovered names: stable order, no duplicates.
    #[must_use]
    pub fn image_names(&self) -> &[ImageName] {
        &self.image_names
    }

    /// Whether `image_name` is locally available.
    #[must_use]
    pub fn contains(&self, image_name: &ImageName) -> bool {
        self.image_names.binary_search(image_name).is_ok()
    }

    /// Whether some local image serves this language/test-framework pair.
    ///
    /// Pure membership test against the construction-time snapshot — no
    /// runtime query. Matching is version-agnostic and ignores case and
    /// punctuation, so `("Python", "py.test")` matches
    /// `cyberdojo/python-3.3.5_pytest`.
    #[must_use]
    pub fn runnable(&self, language: &str, test_framework: &str) -> bool {
        let language = normalized(language);
        let test_framework = normalized(test_framework);

        self.image_names.iter().any(|name| {
            name.parts().is_some_and(|parts| {
                parts.namespace == self.namespace
                    && normalized(parts.language) == language
                    && normalized(parts.test_framework) == test_framework
            })
        })
    }
}

fn parse_listing(text: &str, namespace: &str) -> Vec<ImageName> {
    let prefix = format!("{namespace}/");
    let mut names: Vec<ImageName> = text
        .lines()
        .filter(|line| line.starts_with(prefix.as_str()))
        .filter_map(|line| line.split_whitespace().next())
        .map(ImageName::new)
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Lowercase with punctuation stripped, so display names like `py.test`
/// line up with image-name segments like `pytest`.
fn normalized(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '+' || *c == '#')
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::spy::SpyShell;

    const DOCKER_IMAGES_OUTPUT: &str = "\
REPOSITORY                      TAG     IMAGE ID      CREATED       VIRTUAL SIZE
cyberdojo/rust-1.0.0_test       latest  6c51f1cc1b02  4 weeks ago   750.1 MB
cyberdojo/python-3.3.5_pytest   latest  1c51f1cc1b02  4 weeks ago   885.9 MB
ubuntu                          14.04   8a51f1cc1b02  5 weeks ago   188.3 MB
";

    async fn discovered(shell: &SpyShell) -> ImageCatalog {
        shell.stub("", 0); // docker info
        shell.stub(DOCKER_IMAGES_OUTPUT, 0); // docker images
        ImageCatalog::discover(shell, "cyberdojo").await.unwrap()
    }

    #[tokio::test]
    async fn discover_fails_when_docker_is_not_installed() {
        let shell = SpyShell::new();
        shell.stub("sh: docker: command not found", 127);

        let result = ImageCatalog::discover(&shell, "cyberdojo").await;
        assert!(matches!(result, Err(CatalogError::RuntimeUnavailable)));

        // No listing query after a failed probe
        assert_eq!(shell.spied().len(), 1);
    }

    #[tokio::test]
    async fn discover_probes_then_lists() {
        let shell = SpyShell::new();
        discovered(&shell).await;

        let spied = shell.spied();
        assert!(spied[0].starts_with("docker info"), "docker info");
        assert!(spied[1].starts_with("docker images"), "docker images");
    }

    #[tokio::test]
    async fn image_names_are_sorted_and_namespace_filtered() {
        let shell = SpyShell::new();
        let catalog = discovered(&shell).await;

        let expected = vec![
            ImageName::from("cyberdojo/python-3.3.5_pytest"),
            ImageName::from("cyberdojo/rust-1.0.0_test"),
        ];
        assert_eq!(catalog.image_names(), expected.as_slice());
    }

    #[tokio::test]
    async fn image_names_deduplicate_multiple_tags() {
        let shell = SpyShell::new();
        shell.stub("", 0);
        shell.stub(
            "REPOSITORY TAG IMAGE ID CREATED VIRTUAL SIZE\n\
             cyberdojo/rust-1.0.0_test latest 6c51 4 weeks ago 750.1 MB\n\
             cyberdojo/rust-1.0.0_test 1.0 7c51 6 weeks ago 750.1 MB\n",
            0,
        );
        let catalog = ImageCatalog::discover(&shell, "cyberdojo").await.unwrap();
        assert_eq!(catalog.image_names().len(), 1);
    }

    #[tokio::test]
    async fn runnable_determines_membership() {
        let shell = SpyShell::new();
        let catalog = discovered(&shell).await;

        assert!(!catalog.runnable("C", "assert"));
        assert!(catalog.runnable("Python", "py.test"));
        assert!(catalog.runnable("Rust", "test"));
    }

    #[tokio::test]
    async fn runnable_is_idempotent_and_queries_nothing() {
        let shell = SpyShell::new();
        let catalog = discovered(&shell).await;
        let queries_before = shell.spied().len();

        assert!(catalog.runnable("Python", "py.test"));
        assert!(catalog.runnable("Python", "py.test"));

        assert_eq!(shell.spied().len(), queries_before);
    }

    #[tokio::test]
    async fn contains_tests_exact_membership() {
        let shell = SpyShell::new();
        let catalog = discovered(&shell).await;

        assert!(catalog.contains(&ImageName::from("cyberdojo/rust-1.0.0_test")));
        assert!(!catalog.contains(&ImageName::from("cyberdojo/c-4.8.4_assert")));
    }
}
