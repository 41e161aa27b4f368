//! Packstage CLI - Command-line interface
//!
//! Installs a package described by a JSON manifest of packs, resuming any
//! interrupted downloads from a previous run.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use packstage::logging::{default_log_dir, init_logging};

use commands::install::InstallArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "packstage", version, about = "Resumable multi-pack installer")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config.ini (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download, verify and extract every pack of a manifest
    Install {
        /// JSON manifest: array of {url, size, checksum?}
        #[arg(long)]
        manifest: PathBuf,

        /// Install directory (overrides config)
        #[arg(long)]
        install_dir: Option<PathBuf>,

        /// Number of concurrent downloads
        #[arg(long)]
        parallel: Option<usize>,

        /// Keep downloaded archives after extraction
        #[arg(long, conflicts_with = "remove_archives")]
        keep_archives: bool,

        /// Delete downloaded archives after extraction
        #[arg(long)]
        remove_archives: bool,
    },

    /// Show how much of a manifest is already downloaded
    Status {
        #[arg(long)]
        manifest: PathBuf,

        #[arg(long)]
        install_dir: Option<PathBuf>,
    },

    /// Remove an installation
    Uninstall {
        #[arg(long)]
        install_dir: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_logging(&default_log_dir(), cli.verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: {}", CliError::from(e));
            None
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Install {
            manifest,
            install_dir,
            parallel,
            keep_archives,
            remove_archives,
        } => {
            let keep_archives = match (keep_archives, remove_archives) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            commands::install::run(InstallArgs {
                manifest,
                install_dir,
                config: cli.config,
                parallel,
                keep_archives,
            })
            .await
        }
        Commands::Status {
            manifest,
            install_dir,
        } => commands::status::run(manifest, install_dir, cli.config).await,
        Commands::Uninstall { install_dir, force } => {
            commands::uninstall::run(install_dir, cli.config, force).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_install() {
        let cli = Cli::try_parse_from([
            "packstage",
            "install",
            "--manifest",
            "m.json",
            "--parallel",
            "2",
            "--remove-archives",
        ])
        .unwrap();

        match cli.command {
            Commands::Install {
                parallel,
                remove_archives,
                keep_archives,
                ..
            } => {
                assert_eq!(parallel, Some(2));
                assert!(remove_archives);
                assert!(!keep_archives);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_archive_flags_conflict() {
        let result = Cli::try_parse_from([
            "packstage",
            "install",
            "--manifest",
            "m.json",
            "--keep-archives",
            "--remove-archives",
        ]);
        assert!(result.is_err());
    }
}
