//! Archive extraction for release packages
//!
//! Handles `.tar.gz`, `.tar.bz2`/`.tbz`, `.tar.xz`, `.zip` and bare `.bz2`
//! files. The format is chosen from the file name alone.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use bzip2::read::MultiBzDecoder;
use flate2::read::GzDecoder;
use log::{debug, warn};
use tar::Archive;
use xz2::read::XzDecoder;
use zip::ZipArchive;

use super::locate::ExecutableLocator;
use crate::error::{Error, Result};

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    TarGz,
    TarBz2,
    TarXz,
    Zip,
    Bz2,
}

/// Recognised suffixes, longest first so `.tar.bz2` wins over `.bz2`
const SUFFIXES: [(&str, ArchiveKind); 6] = [
    (".tar.bz2", ArchiveKind::TarBz2),
    (".tar.gz", ArchiveKind::TarGz),
    (".tar.xz", ArchiveKind::TarXz),
    (".zip", ArchiveKind::Zip),
    (".tbz", ArchiveKind::TarBz2),
    (".bz2", ArchiveKind::Bz2),
];

impl ArchiveKind {
    pub const ALL: [ArchiveKind; 5] = [
        ArchiveKind::TarGz,
        ArchiveKind::TarBz2,
        ArchiveKind::TarXz,
        ArchiveKind::Zip,
        ArchiveKind::Bz2,
    ];

    /// Detect the archive kind from a file name, returning the matched suffix
    pub fn from_name(name: &str) -> Option<(Self, &'static str)> {
        let lower = name.to_lowercase();
        SUFFIXES
            .iter()
            .find(|(suffix, _)| lower.ends_with(suffix))
            .map(|&(suffix, kind)| (kind, suffix))
    }

    pub fn suffixes(self) -> impl Iterator<Item = &'static str> {
        SUFFIXES
            .iter()
            .filter(move |(_, kind)| *kind == self)
            .map(|(suffix, _)| *suffix)
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArchiveKind::TarGz => "tar.gz",
            ArchiveKind::TarBz2 => "tar.bz2",
            ArchiveKind::TarXz => "tar.xz",
            ArchiveKind::Zip => "zip",
            ArchiveKind::Bz2 => "bz2",
        };
        f.write_str(name)
    }
}

/// Extracts a downloaded archive and finds the executable inside it
#[derive(Debug, Clone, Default)]
pub struct Unpacker {
    locator: ExecutableLocator,
}

impl Unpacker {
    pub fn new(locator: ExecutableLocator) -> Self {
        Self { locator }
    }

    /// Extract `archive` into `dest` and return the path of the executable
    /// found in the extracted tree.
    pub fn unpack(&self, archive: &Path, dest: &Path) -> Result<PathBuf> {
        let file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::UnsupportedFormat(archive.display().to_string()))?;
        let (kind, suffix) = ArchiveKind::from_name(file_name)
            .ok_or_else(|| Error::UnsupportedFormat(file_name.to_string()))?;

        fs::create_dir_all(dest)?;
        let file = File::open(archive)?;
        debug!("Unpacking {file_name} as {kind}");

        match kind {
            ArchiveKind::TarGz => unpack_tar(GzDecoder::new(BufReader::new(file)), dest, kind)?,
            ArchiveKind::TarBz2 => {
                unpack_tar(MultiBzDecoder::new(BufReader::new(file)), dest, kind)?
            }
            ArchiveKind::TarXz => unpack_tar(XzDecoder::new(BufReader::new(file)), dest, kind)?,
            ArchiveKind::Zip => unpack_zip(file, dest)?,
            ArchiveKind::Bz2 => {
                let stem = &file_name[..file_name.len() - suffix.len()];
                let stem = if stem.is_empty() { "unpacked" } else { stem };
                let mut decoder = MultiBzDecoder::new(BufReader::new(file));
                let mut out = File::create(dest.join(stem))?;
                io::copy(&mut decoder, &mut out).map_err(|e| unpack_error(kind, e))?;
            }
        }

        self.locator.locate(dest)
    }
}

/// Split a failed entry copy into a local write failure or a bad archive.
/// Both sides surface as `io::Error`, so the kind decides.
fn unpack_error(kind: ArchiveKind, e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::PermissionDenied
        | io::ErrorKind::StorageFull
        | io::ErrorKind::ReadOnlyFilesystem
        | io::ErrorKind::AlreadyExists
        | io::ErrorKind::NotADirectory
        | io::ErrorKind::IsADirectory => Error::Io(e),
        _ => Error::decode(kind, e),
    }
}

fn unpack_tar<R: Read>(reader: R, dest: &Path, kind: ArchiveKind) -> Result<()> {
    let mut archive = Archive::new(reader);
    let entries = archive.entries().map_err(|e| Error::decode(kind, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| Error::decode(kind, e))?;
        let unpacked = entry.unpack_in(dest).map_err(|e| unpack_error(kind, e))?;
        if !unpacked {
            let name = entry
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            warn!("Skipping archive entry outside the destination: {name}");
        }
    }
    Ok(())
}

fn unpack_zip(file: File, dest: &Path) -> Result<()> {
    let zip_err = |e: zip::result::ZipError| Error::decode(ArchiveKind::Zip, io::Error::other(e));
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(zip_err)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_err)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping archive entry outside the destination: {}", entry.name());
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out).map_err(|e| unpack_error(ArchiveKind::Zip, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777))?;
        }
    }
    Ok(())
}
