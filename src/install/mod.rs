//! Installing, updating and removing release binaries
//!
//! [`Installer`] ties the pipeline together: release lookup, asset
//! resolution, download, extraction, copy into the bin directory and the
//! installation record.

pub mod binary;
pub mod download;
mod progress;
pub mod workspace;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, dir_on_path};
use crate::error::Error;
use crate::store::{Installation, InstallationStore, file_sha256};

pub use binary::{BINARY_MODE, BinaryInstaller};
use download::{Asset, Downloader, GitHubRelease, ReleaseSource, RepoRef, Unpacker, resolve_asset};
pub use progress::Phase;
pub use workspace::Workspace;

/// Arguments of [`Installer::install`]
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// `github.com/<owner>/<repo>`, optionally with scheme or `.git`
    pub repo: String,
    /// Release tag, latest release when `None`
    pub tag: Option<String>,
    /// Bin directory override
    pub destination: Option<PathBuf>,
    /// Reinstall over an existing installation or a foreign binary
    pub force: bool,
    /// Name for the installed binary
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate { tag: String },
    Updated { from: String, installation: Installation },
}

/// Result of removing one entry during [`Installer::remove_all`]
#[derive(Debug)]
pub struct RemoveReport {
    pub name: String,
    pub result: Result<Installation>,
}

pub struct Installer<R> {
    config: Config,
    store: InstallationStore,
    releases: R,
    downloader: Downloader,
    unpacker: Unpacker,
}

impl<R: ReleaseSource> Installer<R> {
    pub fn new(config: Config, store: InstallationStore, releases: R) -> crate::Result<Self> {
        Ok(Self {
            config,
            store,
            releases,
            downloader: Downloader::new()?,
            unpacker: Unpacker::default(),
        })
    }

    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_unpacker(mut self, unpacker: Unpacker) -> Self {
        self.unpacker = unpacker;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &InstallationStore {
        &self.store
    }

    /// Install the binary of a repository's release.
    pub async fn install(
        &self,
        cancel: &CancellationToken,
        opts: InstallOptions,
    ) -> Result<Installation> {
        let repo = RepoRef::parse(&opts.repo)?;
        let bin_dir = opts
            .destination
            .clone()
            .unwrap_or_else(|| self.config.bin_dir.clone());
        let target = BinaryInstaller::new(bin_dir)?;

        let previous = match self.store.get_by_repo(&repo.to_string()) {
            Ok(inst) => Some(inst),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e).context("read installations"),
        };
        if let Some(prev) = &previous {
            if !opts.force {
                return Err(Error::AlreadyExists(format!(
                    "{repo} is already installed as {} ({}), use --force to reinstall",
                    prev.name, prev.tag
                ))
                .into());
            }
        }

        let name = opts
            .alias
            .clone()
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| repo.name.clone());
        if !opts.force {
            self.check_name_free(&name, &repo)?;
            if let Ok(found) = which::which(&name) {
                self.check_foreign_binary(&found, &repo)?;
            }
        }

        info!("{} for {repo}", Phase::Discovering);
        let release = match &opts.tag {
            Some(tag) => self.releases.release_by_tag(&repo, tag).await,
            None => self.releases.latest_release(&repo).await,
        }
        .with_context(|| format!("{} of {repo}", Phase::Discovering))?;

        self.deploy(cancel, &repo, release, &target, opts.alias, previous, Utc::now())
            .await
    }

    /// Move an installation to the latest release of its repository.
    pub async fn update(&self, cancel: &CancellationToken, name: &str) -> Result<UpdateOutcome> {
        let current = self.store.get(name)?;
        let repo = RepoRef::parse(&current.repo)?;

        info!("{} for {repo}", Phase::Discovering);
        let release = self
            .releases
            .latest_release(&repo)
            .await
            .with_context(|| format!("{} of {repo}", Phase::Discovering))?;

        if release.tag_name == current.tag {
            info!("{name} is already at {}", current.tag);
            return Ok(UpdateOutcome::UpToDate { tag: current.tag });
        }

        let target = BinaryInstaller::new(current.install_path.clone())?;
        let from = current.tag.clone();
        let installed_at = current.installed_at;
        let alias = current.alias.clone();
        let installation = self
            .deploy(cancel, &repo, release, &target, alias, Some(current), installed_at)
            .await?;

        info!("Updated {name} from {from} to {}", installation.tag);
        Ok(UpdateOutcome::Updated { from, installation })
    }

    /// Delete the binary (a missing file is fine), then the record.
    pub fn remove(&self, name: &str) -> Result<Installation> {
        let inst = self.store.get(name)?;
        remove_binary(&inst.binary_path())
            .with_context(|| format!("remove {}", inst.binary_path().display()))?;
        let removed = self.store.delete(name)?;
        info!("Removed {name}");
        Ok(removed)
    }

    /// Remove every installation, carrying on past failures.
    pub fn remove_all(&self) -> Result<Vec<RemoveReport>> {
        let all = self.store.list()?;
        Ok(all
            .into_iter()
            .map(|inst| RemoveReport {
                result: self.remove(&inst.name),
                name: inst.name,
            })
            .collect())
    }

    /// Refuse to take over a name another repository is installed under
    fn check_name_free(&self, name: &str, repo: &RepoRef) -> Result<()> {
        let other = match self.store.get(name) {
            Ok(inst) => inst,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e).context("read installations"),
        };
        if other.repo == repo.to_string() {
            return Ok(());
        }
        Err(Error::AlreadyExists(format!(
            "{name} is already installed from {}, use --alias to pick another name or --force to replace it",
            other.repo
        ))
        .into())
    }

    /// Refuse to shadow a binary on `PATH` unless this repository installed it
    fn check_foreign_binary(&self, found: &Path, repo: &RepoRef) -> Result<()> {
        let repo = repo.to_string();
        let managed = self
            .store
            .list()?
            .iter()
            .any(|inst| inst.binary_path() == found && inst.repo == repo);
        if managed {
            return Ok(());
        }
        Err(Error::AlreadyExists(format!(
            "{} already exists and was installed by another source, use --force to overwrite",
            found.display()
        ))
        .into())
    }

    #[allow(clippy::too_many_arguments)]
    async fn deploy(
        &self,
        cancel: &CancellationToken,
        repo: &RepoRef,
        release: GitHubRelease,
        target: &BinaryInstaller,
        alias: Option<String>,
        previous: Option<Installation>,
        installed_at: DateTime<Utc>,
    ) -> Result<Installation> {
        let mut asset = resolve_asset(&release.assets, &self.config.platform, repo, &release.tag_name)?;
        asset.alias = alias;

        let binary = self.run_pipeline(cancel, &asset, target).await?;

        let hash_path = binary.clone();
        let sha256 = match tokio::task::spawn_blocking(move || file_sha256(&hash_path)).await? {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!("Could not hash {}: {e}", binary.display());
                None
            }
        };

        let installation = Installation {
            name: asset.binary_name(),
            alias: asset.alias.clone(),
            repo: repo.to_string(),
            tag: asset.tag.clone(),
            sha256,
            installed_at,
            updated_at: Utc::now(),
            install_path: target.bin_dir().to_path_buf(),
        };

        match &previous {
            Some(prev) => self.store.replace(&prev.name, installation.clone()),
            None => self.store.save(installation.clone()),
        }
        .context(Phase::Saving)?;

        if let Some(prev) = previous {
            let old = prev.binary_path();
            if old != binary {
                if let Err(e) = remove_binary(&old) {
                    warn!("Could not remove previous binary {}: {e}", old.display());
                }
            }
        }

        if !dir_on_path(target.bin_dir(), std::env::var_os("PATH").as_deref()) {
            warn!(
                "{} is not in your PATH, add it to run {}",
                target.bin_dir().display(),
                installation.name
            );
        }

        info!(
            "Installed {} {} to {}",
            installation.name,
            installation.tag,
            binary.display()
        );
        Ok(installation)
    }

    /// Download, unpack and copy one asset inside a throwaway workspace
    async fn run_pipeline(
        &self,
        cancel: &CancellationToken,
        asset: &Asset,
        target: &BinaryInstaller,
    ) -> Result<PathBuf> {
        let mut workspace = Workspace::new(self.config.temp_dir.as_deref(), &format!("{}-", asset.name))
            .context(Phase::Preparing)?;

        let result = self.run_stages(cancel, asset, target, &workspace).await;

        if let Err(e) = workspace.cleanup() {
            warn!("Could not remove workspace {}: {e}", workspace.root().display());
        }
        result
    }

    async fn run_stages(
        &self,
        cancel: &CancellationToken,
        asset: &Asset,
        target: &BinaryInstaller,
        workspace: &Workspace,
    ) -> Result<PathBuf> {
        info!("{} {}", Phase::Downloading, asset.download_url);
        let archive = self
            .downloader
            .download(cancel, &asset.download_url, workspace.download_dir(), &asset.name)
            .await
            .context(Phase::Downloading)?;
        if asset.size > 0 {
            let actual = tokio::fs::metadata(&archive)
                .await
                .context(Phase::Downloading)?
                .len();
            if actual == asset.size {
                debug!("Downloaded {} ({actual} bytes)", asset.name);
            } else {
                warn!(
                    "{} is {actual} bytes but the release lists {} bytes",
                    asset.name, asset.size
                );
            }
        }

        info!("{} {}", Phase::Unpacking, asset.name);
        let unpacker = self.unpacker.clone();
        let unpack_dir = workspace.unpack_dir().to_path_buf();
        let located = tokio::task::spawn_blocking(move || unpacker.unpack(&archive, &unpack_dir))
            .await?
            .context(Phase::Unpacking)?;
        debug!("Located executable {}", located.display());

        info!("{} {}", Phase::Installing, asset.binary_name());
        let installed = target
            .install(&located, &asset.binary_name())
            .context(Phase::Installing)?;
        Ok(installed)
    }
}

fn remove_binary(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} already gone", path.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}
