mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use inquire::Confirm;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use ghrel::config::Config;
use ghrel::install::download::GitHubClient;
use ghrel::install::{InstallOptions, Installer, UpdateOutcome};
use ghrel::store::{Filter, Installation, InstallationStore};

fn main() {
    let args = cli::Args::parse();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // RUST_LOG, when set, takes precedence over the flag
    env_logger::Builder::new()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(level)
        .parse_default_env()
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(real_main(args)) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn real_main(args: cli::Args) -> Result<()> {
    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    config.github_token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
    config
        .ensure_dirs()
        .context("Failed to create ghrel directories")?;

    let store = InstallationStore::open(&config.store_path, Some(&config.legacy_lock_path))
        .context("Failed to open installation store")?;
    let releases = GitHubClient::new(&config.api_base, config.github_token.as_deref())?;
    let installer = Installer::new(config, store, releases)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match args.sub {
        cli::Cmd::Install {
            repo,
            tag,
            destination,
            force,
            alias,
        } => {
            let opts = InstallOptions {
                repo,
                tag,
                destination,
                force,
                alias,
            };
            installer.install(&cancel, opts).await?;
            Ok(())
        }
        cli::Cmd::Update { name } => {
            match installer.update(&cancel, &name).await? {
                UpdateOutcome::UpToDate { tag } => println!("{name} is up to date ({tag})"),
                UpdateOutcome::Updated { from, installation } => {
                    println!("{name}: {from} -> {}", installation.tag)
                }
            }
            Ok(())
        }
        cli::Cmd::Ls { filter } => {
            let installations = installer.store().list()?;
            print_table(&installations, filter.as_ref());
            Ok(())
        }
        cli::Cmd::Remove { name, all, force } => {
            if all {
                remove_all(&installer, force)
            } else {
                let name = name.context("Missing binary name")?;
                if !force && !confirm(&format!("Remove {name}?"))? {
                    info!("Aborted");
                    return Ok(());
                }
                installer.remove(&name)?;
                Ok(())
            }
        }
    }
}

fn remove_all(installer: &Installer<GitHubClient>, force: bool) -> Result<()> {
    let count = installer.store().list()?.len();
    if count == 0 {
        println!("Nothing installed");
        return Ok(());
    }
    if !force && !confirm(&format!("Remove all {count} installed binaries?"))? {
        info!("Aborted");
        return Ok(());
    }

    let mut failed = 0;
    for report in installer.remove_all()? {
        if let Err(e) = report.result {
            error!("Failed to remove {}: {e:#}", report.name);
            failed += 1;
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {count} removals failed");
    }
    Ok(())
}

fn confirm(message: &str) -> Result<bool> {
    Confirm::new(message)
        .with_default(false)
        .prompt()
        .map_err(|e| anyhow::anyhow!("Prompt cancelled: {}", e))
}

fn print_table(installations: &[Installation], filter: Option<&Filter>) {
    let rows: Vec<_> = installations
        .iter()
        .filter(|inst| filter.is_none_or(|f| f.matches(inst)))
        .collect();
    if rows.is_empty() {
        println!("No binaries installed");
        return;
    }

    let name_w = rows.iter().map(|i| i.name.len()).max().unwrap_or(0).max(4);
    let tag_w = rows.iter().map(|i| i.tag.len()).max().unwrap_or(0).max(3);
    let repo_w = rows.iter().map(|i| i.repo.len()).max().unwrap_or(0).max(4);

    println!("{:name_w$}  {:tag_w$}  {:repo_w$}  {:16}  PATH", "NAME", "TAG", "REPO", "UPDATED");
    for inst in rows {
        println!(
            "{:name_w$}  {:tag_w$}  {:repo_w$}  {:16}  {}",
            inst.name,
            inst.tag,
            inst.repo,
            inst.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            inst.install_path.display()
        );
    }
}
