//! docker-test-runner
//!
//! Thin CLI over the image catalog and the bounded execution runner.
//! Discovers the catalog at startup (failing fast when Docker is missing),
//! then lists images or executes one bounded run.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docker_test_runner::catalog::{ImageCatalog, ImageName};
use docker_test_runner::config::Config;
use docker_test_runner::runner::{unique_cid_file, DockerRunner, Language, Sandbox};
use docker_test_runner::shell::SystemShell;

#[derive(Parser, Debug)]
#[command(name = "docker-test-runner")]
#[command(about = "Runs untrusted test code in disposable Docker containers")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List the locally available runnable images
    Images,

    /// Run one bounded test execution inside a container
    Run {
        /// Container image to run (must be locally available)
        #[arg(long)]
        image: String,

        /// Host directory of the language toolchain (mounted read-only)
        #[arg(long)]
        language_dir: PathBuf,

        /// Host directory of the sandbox (mounted read-write at /sandbox)
        #[arg(long)]
        sandbox_dir: PathBuf,

        /// Deadline in seconds (defaults to the configured value)
        #[arg(long)]
        max_seconds: Option<u64>,

        /// Command to execute inside the container
        command: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging to stderr so stdout carries only the captured output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    let shell = SystemShell::new();

    let catalog = ImageCatalog::discover(&shell, &config.image_namespace)
        .await
        .context("Failed to discover the image catalog")?;

    info!(
        images = catalog.image_names().len(),
        namespace = %config.image_namespace,
        "Discovered image catalog"
    );

    match args.command {
        Cmd::Images => {
            for name in catalog.image_names() {
                println!("{name}");
            }
        }
        Cmd::Run {
            image,
            language_dir,
            sandbox_dir,
            max_seconds,
            command,
        } => {
            let image_name = ImageName::new(image);
            if !catalog.contains(&image_name) {
                bail!("image {image_name} is not available locally");
            }

            let sandbox = Sandbox {
                path: sandbox_dir,
                language: Language {
                    image_name,
                    path: language_dir,
                },
            };

            let runner = DockerRunner::new(&shell, unique_cid_file(&config.cid_dir));
            runner.started();
            runner.pre_test();

            let output = runner
                .run(&sandbox, &command, max_seconds.unwrap_or(config.max_seconds))
                .await?;
            // Output verbatim: no trailing newline added
            print!("{output}");
            std::io::stdout().flush()?;
        }
    }

    Ok(())
}
