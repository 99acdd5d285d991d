use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ghrel::store::Filter;

#[derive(Parser, Debug)]
#[command(version, about = "Install binaries from GitHub releases")]
pub struct Args {
    /// Log debug output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to configuration file (default ~/.ghrel/config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub sub: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Install the binary of a GitHub release
    Install {
        /// Repository, e.g. github.com/owner/repo
        repo: String,

        /// Release tag (latest release when omitted)
        #[arg(long, short = 't')]
        tag: Option<String>,

        /// Install into this directory instead of ~/.ghrel/bin
        #[arg(long, short = 'd')]
        destination: Option<PathBuf>,

        /// Reinstall even if already installed
        #[arg(long, short = 'f')]
        force: bool,

        /// Name for the installed binary
        #[arg(long, short = 'a')]
        alias: Option<String>,
    },
    /// Update an installed binary to its latest release
    Update {
        /// Installed binary name
        name: String,
    },
    /// List installed binaries
    #[command(visible_alias = "list")]
    Ls {
        /// Only show entries matching field=regex (fields: name, tag, repo, path)
        #[arg(long)]
        filter: Option<Filter>,
    },
    /// Remove an installed binary
    #[command(visible_alias = "rm")]
    Remove {
        /// Installed binary name
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        name: Option<String>,

        /// Remove every installed binary
        #[arg(long)]
        all: bool,

        /// Do not ask for confirmation
        #[arg(long, short = 'f')]
        force: bool,
    },
}
