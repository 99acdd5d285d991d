//! Reader for the old whitespace-separated lock file
//!
//! One record per line: `name tag repo install_path`. Only ever read, for the
//! one-time migration into the JSON store.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};

use super::{Installation, file_sha256};
use crate::error::Result;
use crate::install::download::RepoRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyEntry {
    pub name: String,
    pub tag: String,
    pub repo: String,
    pub install_path: PathBuf,
}

impl LegacyEntry {
    /// Parse one line, `None` when it has fewer than four fields
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let name = fields.next()?;
        let tag = fields.next()?;
        let repo = fields.next()?;
        let install_path = fields.next()?;
        Some(Self {
            name: name.to_string(),
            tag: tag.to_string(),
            repo: repo.to_string(),
            install_path: PathBuf::from(install_path),
        })
    }

    /// Convert into a store record. The original install time is unknown, so
    /// both timestamps are `now`; the hash is taken from the binary on disk
    /// when it is still there. Repositories are stored in canonical
    /// `github.com/<owner>/<repo>` form when they parse as one.
    pub fn into_installation(self, now: DateTime<Utc>) -> Installation {
        let binary = self.install_path.join(&self.name);
        let sha256 = match file_sha256(&binary) {
            Ok(hash) => Some(hash),
            Err(e) => {
                debug!("No hash for {}: {e}", binary.display());
                None
            }
        };

        let repo = match RepoRef::parse(&self.repo) {
            Ok(parsed) => parsed.to_string(),
            Err(_) => {
                warn!("Keeping unrecognised repository {:?} for {}", self.repo, self.name);
                self.repo
            }
        };

        Installation {
            name: self.name,
            alias: None,
            repo,
            tag: self.tag,
            sha256,
            installed_at: now,
            updated_at: now,
            install_path: self.install_path,
        }
    }
}

pub fn read_lock_file(path: &Path) -> Result<Vec<LegacyEntry>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match LegacyEntry::parse_line(&line) {
            Some(entry) => entries.push(entry),
            None => warn!("Skipping malformed lock file line {}: {line}", index + 1),
        }
    }
    Ok(entries)
}
