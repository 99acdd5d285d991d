//! GitHub release download and package extraction
//!
//! ## Module Organization
//!
//! - `platform` - Host platform tokens and file name matching
//! - `github` - Repository references and the release API client
//! - `asset` - Picking the release asset for the host
//! - `core` - Streaming download into the workspace
//! - `extract` - Archive extraction for the supported formats
//! - `locate` - Finding the executable by content sniffing

mod asset;
mod core;
mod extract;
mod github;
mod locate;
mod platform;

// Re-export public API
pub use asset::{Asset, resolve_asset};
pub use core::Downloader;
pub use extract::{ArchiveKind, Unpacker};
pub use github::{
    DEFAULT_API_BASE, GitHubAsset, GitHubClient, GitHubRelease, ReleaseSource, RepoRef,
};
pub use locate::{ExecutableClassifier, ExecutableKind, ExecutableLocator, MagicClassifier};
pub use platform::{
    AliasTable, TargetPlatform, default_arch_aliases, default_os_aliases, matches_platform,
};

#[cfg(test)]
pub(crate) use extract::tests::tar_gz_bytes;
#[cfg(test)]
pub(crate) use locate::tests::fake_elf;
