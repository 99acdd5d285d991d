//! Error taxonomy for the release installation pipeline
//!
//! Every pipeline component returns [`Error`]; the orchestration layer wraps
//! these with `anyhow` context naming the failing stage.

use std::path::PathBuf;

use thiserror::Error;

use crate::install::download::ArchiveKind;

/// Result alias used by the pipeline components
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Repository reference does not follow `github.com/<owner>/<repo>`
    #[error("invalid repository path: {0}")]
    InvalidRepo(String),

    #[error("no asset found for {os}_{arch}")]
    NoMatchingAsset { os: String, arch: String },

    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("no executable found in archive")]
    NoExecutableFound,

    #[error("download failed with HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("download cancelled")]
    Cancelled,

    #[error("download stalled: no data received for {secs} seconds")]
    DownloadStalled { secs: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("no install path provided")]
    EmptyBinDir,

    #[error("provided install path is not absolute: {}", .0.display())]
    RelativeBinDir(PathBuf),

    #[error("source binary not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("source is a directory, not a file: {}", .0.display())]
    SourceIsDirectory(PathBuf),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to decode {kind} archive: {source}")]
    Decode {
        kind: ArchiveKind,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn decode(kind: ArchiveKind, source: impl Into<std::io::Error>) -> Self {
        Error::Decode {
            kind,
            source: source.into(),
        }
    }

    /// True for lookups that found nothing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
