//! Copying the located executable into the bin directory

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};

/// Mode every installed binary ends up with
pub const BINARY_MODE: u32 = 0o755;

/// Installs executables into a fixed absolute directory
#[derive(Debug, Clone)]
pub struct BinaryInstaller {
    bin_dir: PathBuf,
}

impl BinaryInstaller {
    /// Validates `bin_dir` without touching the file system
    pub fn new(bin_dir: impl Into<PathBuf>) -> Result<Self> {
        let bin_dir = bin_dir.into();
        if bin_dir.as_os_str().is_empty() {
            return Err(Error::EmptyBinDir);
        }
        if !bin_dir.is_absolute() {
            return Err(Error::RelativeBinDir(bin_dir));
        }
        Ok(Self { bin_dir })
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    /// Copy `src` to `bin_dir/binary_name` and make it executable (0755).
    pub fn install(&self, src: &Path, binary_name: &str) -> Result<PathBuf> {
        validate_source(src)?;
        fs::create_dir_all(&self.bin_dir)?;

        let dest = self.bin_dir.join(binary_name);
        // Unlink first so a running copy of the old binary does not make the
        // write fail with ETXTBSY.
        match fs::remove_file(&dest) {
            Ok(()) => debug!("Replaced existing {}", dest.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let bytes = fs::copy(src, &dest)?;
        set_mode(&dest, BINARY_MODE)?;

        debug!("Installed {} ({bytes} bytes)", dest.display());
        Ok(dest)
    }
}

fn validate_source(src: &Path) -> Result<()> {
    let metadata = fs::metadata(src).map_err(|_| Error::SourceNotFound(src.to_path_buf()))?;
    if metadata.is_dir() {
        return Err(Error::SourceIsDirectory(src.to_path_buf()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            set_mode(src, BINARY_MODE)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
