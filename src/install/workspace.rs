//! Scratch directories for a single download-and-extract run

use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::TempDir;

use crate::error::Result;

/// Temporary `root/{download,unpack}` tree, removed on [`Workspace::cleanup`]
/// or when dropped
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    download_dir: PathBuf,
    unpack_dir: PathBuf,
    guard: Option<TempDir>,
}

impl Workspace {
    /// Create a uniquely named workspace below `base` (the system temp
    /// directory when `None`).
    pub fn new(base: Option<&Path>, prefix: &str) -> Result<Self> {
        let base = base
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);

        // Keep TempDir guard alive - the root goes away if setup fails below
        let guard = tempfile::Builder::new().prefix(prefix).tempdir_in(&base)?;
        let root = guard.path().to_path_buf();
        let download_dir = root.join("download");
        let unpack_dir = root.join("unpack");

        std::fs::create_dir_all(&download_dir)?;
        std::fs::create_dir_all(&unpack_dir)?;

        debug!("Created workspace {}", root.display());
        Ok(Self {
            root,
            download_dir,
            unpack_dir,
            guard: Some(guard),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn unpack_dir(&self) -> &Path {
        &self.unpack_dir
    }

    /// Remove the workspace tree. Calling it again is a no-op.
    pub fn cleanup(&mut self) -> Result<()> {
        let Some(guard) = self.guard.take() else {
            return Ok(());
        };
        match guard.close() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
