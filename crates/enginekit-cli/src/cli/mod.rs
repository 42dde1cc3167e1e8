//! CLI for the enginekit runtime installer.

mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use enginekit_core::cache::VersionCache;
use enginekit_core::config;
use enginekit_core::install::Installer;
use enginekit_core::version::VersionTag;

use commands::{run_install, run_latest, run_list, run_path, run_remove, run_runtime};

/// Top-level CLI for enginekit.
#[derive(Debug, Parser)]
#[command(name = "enginekit")]
#[command(about = "enginekit: install, cache and launch engine runtime releases", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Print the latest release tag (or the cached fallback when offline).
    Latest,

    /// Download a version into the cache. Defaults to the latest release.
    Install {
        /// Release tag, e.g. v5.0.0.
        tag: Option<VersionTag>,
        /// Re-download even if the version is already cached.
        #[arg(long)]
        force: bool,
    },

    /// List cached versions, preferred fallback first.
    List,

    /// Delete a cached version.
    Remove {
        /// Release tag.
        tag: VersionTag,
    },

    /// Print the cache directory of a version.
    Path {
        /// Release tag. Defaults to the latest release.
        tag: Option<VersionTag>,
    },

    /// Load a version (installing it if needed) and print its diagnostics until it exits.
    Run {
        /// Release tag. Defaults to the latest release.
        tag: Option<VersionTag>,
        /// Arguments passed to the runtime, after `--`.
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        if let CliCommand::Completions { shell } = cli.command {
            clap_complete::generate(shell, &mut Cli::command(), "enginekit", &mut std::io::stdout());
            return Ok(());
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Latest => run_latest(&Installer::from_config(&cfg)?).await?,
            CliCommand::Install { tag, force } => {
                run_install(&Installer::from_config(&cfg)?, tag, force).await?
            }
            CliCommand::List => run_list(&VersionCache::new(cfg.versions_root()?)).await?,
            CliCommand::Remove { tag } => {
                run_remove(&VersionCache::new(cfg.versions_root()?), &tag).await?
            }
            CliCommand::Path { tag } => run_path(&Installer::from_config(&cfg)?, tag).await?,
            CliCommand::Run { tag, args } => run_runtime(&cfg, tag, args).await?,
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
