use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tia_relay::cli::{self, UploadArgs};
use tia_relay::format::ArtifactFormat;
use tia_relay::logging::{self, TracingLogger};
use tia_relay::store::UploadWithFallback;

/// tia-relay: locate coverage artifacts and deliver reports reliably.
#[derive(Parser)]
#[command(name = "tia-relay", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List artifact files of one kind below the given paths.
    Artifacts {
        /// Artifact kind (test-list, test-execution, native-coverage, closure-coverage).
        #[arg(long)]
        format: ArtifactFormat,

        /// Files or directories to search (recursively).
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Parse every JSON artifact and show its record count.
        #[arg(long)]
        check: bool,
    },

    /// Upload a report, keeping it in the fallback directory if upload fails.
    Upload {
        /// The report file.
        file: PathBuf,

        #[command(flatten)]
        target: UploadArgs,
    },

    /// Show where reports would be delivered.
    Describe {
        #[command(flatten)]
        target: UploadArgs,
    },
}

fn build_store(target: &UploadArgs) -> Result<UploadWithFallback> {
    UploadWithFallback::from_config(
        target.upload_config()?,
        &target.fallback_config(),
        TracingLogger::shared("store"),
    )
    .context("Invalid upload configuration")
}

fn main() -> Result<()> {
    logging::init_tracing();
    let args = Cli::parse();

    let output = match args.command {
        Commands::Artifacts {
            format,
            paths,
            check,
        } => cli::cmd_artifacts(format, &paths, check)?,
        Commands::Upload { file, target } => cli::cmd_upload(&build_store(&target)?, &file)?,
        Commands::Describe { target } => cli::cmd_describe(&build_store(&target)?),
    };
    print!("{output}");
    Ok(())
}
