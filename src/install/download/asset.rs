//! Release asset selection for the host platform

use log::{debug, info};

use super::extract::ArchiveKind;
use super::github::{GitHubAsset, RepoRef};
use super::platform::TargetPlatform;
use crate::error::{Error, Result};

/// A release artifact chosen for installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub alias: Option<String>,
    pub os: String,
    pub arch: String,
    pub download_url: String,
    /// Size reported by the release API, 0 when unknown
    pub size: u64,
    pub tag: String,
    pub repo: RepoRef,
}

impl Asset {
    /// Name the binary gets in the bin directory
    pub fn binary_name(&self) -> String {
        if let Some(alias) = self.alias.as_deref().filter(|a| !a.is_empty()) {
            return alias.to_string();
        }
        if !self.repo.name.is_empty() {
            return self.repo.name.clone();
        }
        let lower = self.name.to_lowercase();
        match ArchiveKind::from_name(&lower) {
            Some((_, suffix)) => lower[..lower.len() - suffix.len()].to_string(),
            None => lower,
        }
    }
}

/// Pick the first asset, in release order, built for `platform` and packed
/// in a supported archive format.
pub fn resolve_asset(
    assets: &[GitHubAsset],
    platform: &TargetPlatform,
    repo: &RepoRef,
    tag: &str,
) -> Result<Asset> {
    info!(
        "Parsing {} release assets for {}_{}",
        assets.len(),
        platform.os,
        platform.arch
    );

    let found = assets.iter().find(|a| {
        debug!("Evaluating asset: {}", a.name);
        platform.matches(&a.name) && ArchiveKind::from_name(&a.name).is_some()
    });

    match found {
        Some(a) => {
            info!("Found compatible asset: {}", a.name);
            Ok(Asset {
                name: a.name.clone(),
                alias: None,
                os: platform.os.clone(),
                arch: platform.arch.clone(),
                download_url: a.browser_download_url.clone(),
                size: a.size,
                tag: tag.to_string(),
                repo: repo.clone(),
            })
        }
        None => Err(Error::NoMatchingAsset {
            os: platform.os.clone(),
            arch: platform.arch.clone(),
        }),
    }
}
