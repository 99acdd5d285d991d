//! Persistent record of installed binaries
//!
//! The store is a JSON object mapping installation name to [`Installation`].
//! Every mutation rewrites the whole table into `<store>.tmp` and renames it
//! over the store file, so the file on disk is always a complete table.
//!
//! The lock only serialises access inside one process. Two processes racing
//! on the same store can still lose an update.

mod filter;
mod legacy;

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub use filter::{Field, Filter};
pub use legacy::{LegacyEntry, read_lock_file};

type Table = BTreeMap<String, Installation>;

/// One installed binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub repo: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub install_path: PathBuf,
}

impl Installation {
    /// Location of the installed executable
    pub fn binary_path(&self) -> PathBuf {
        self.install_path.join(&self.name)
    }
}

#[derive(Debug)]
pub struct InstallationStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl InstallationStore {
    /// Open the store at `path`, creating it on first use.
    ///
    /// When the store file does not exist yet and `legacy_lock` points at an
    /// existing lock file, its records are imported and the lock file is
    /// renamed to `<lock>.backup`.
    pub fn open(path: impl Into<PathBuf>, legacy_lock: Option<&Path>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            lock: RwLock::new(()),
        };

        if !store.path.exists() {
            match legacy_lock.filter(|p| p.exists()) {
                Some(lock_file) => {
                    if let Err(e) = store.migrate(lock_file) {
                        warn!(
                            "Could not migrate {}: {e}; starting with an empty store",
                            lock_file.display()
                        );
                        store.write_table(&Table::new())?;
                    }
                }
                None => store.write_table(&Table::new())?,
            }
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Result<Installation> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        self.load()?
            .remove(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Look up the installation of a repository (canonical
    /// `github.com/<owner>/<repo>` form).
    pub fn get_by_repo(&self, repo: &str) -> Result<Installation> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        self.load()?
            .into_values()
            .find(|inst| inst.repo == repo)
            .ok_or_else(|| Error::NotFound(format!("repo {repo}")))
    }

    /// All installations, ordered by name
    pub fn list(&self) -> Result<Vec<Installation>> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.into_values().collect())
    }

    /// Insert or update the record keyed by `inst.name`.
    ///
    /// Fails with [`Error::AlreadyExists`] when another name already holds
    /// the same repository; use [`InstallationStore::replace`] for that.
    pub fn save(&self, inst: Installation) -> Result<()> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut table = self.load()?;
        check_repo_unique(&table, &inst)?;
        table.insert(inst.name.clone(), inst);
        self.write_table(&table)
    }

    /// Remove `previous` and insert `inst` in a single write
    pub fn replace(&self, previous: &str, inst: Installation) -> Result<()> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut table = self.load()?;
        table.remove(previous);
        check_repo_unique(&table, &inst)?;
        table.insert(inst.name.clone(), inst);
        self.write_table(&table)
    }

    pub fn delete(&self, name: &str) -> Result<Installation> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut table = self.load()?;
        let removed = table
            .remove(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        self.write_table(&table)?;
        Ok(removed)
    }

    fn load(&self) -> Result<Table> {
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_table(&self, table: &Table) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = with_suffix(&self.path, ".tmp");
        let content = serde_json::to_vec_pretty(table)?;
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&content)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }

        // Atomic rename
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn migrate(&self, lock_file: &Path) -> Result<()> {
        let entries = read_lock_file(lock_file)?;
        let now = Utc::now();

        let mut table = Table::new();
        for entry in entries {
            let inst = entry.into_installation(now);
            if table.contains_key(&inst.name) {
                warn!("Skipping duplicate lock file entry for {}", inst.name);
                continue;
            }
            if let Err(e) = check_repo_unique(&table, &inst) {
                warn!("Skipping lock file entry {}: {e}", inst.name);
                continue;
            }
            table.insert(inst.name.clone(), inst);
        }
        self.write_table(&table)?;
        info!(
            "Migrated {} installations from {}",
            table.len(),
            lock_file.display()
        );

        let backup = with_suffix(lock_file, ".backup");
        if let Err(e) = fs::rename(lock_file, &backup) {
            warn!("Could not back up old lock file: {e}");
        }
        Ok(())
    }
}

fn check_repo_unique(table: &Table, inst: &Installation) -> Result<()> {
    match table
        .values()
        .find(|other| other.repo == inst.repo && other.name != inst.name)
    {
        Some(other) => Err(Error::AlreadyExists(format!(
            "{} is already installed as {}",
            inst.repo, other.name
        ))),
        None => Ok(()),
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Hex-encoded SHA-256 of a file's contents
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn installation(name: &str, repo: &str) -> Installation {
        let now = Utc::now();
        Installation {
            name: name.to_string(),
            alias: None,
            repo: repo.to_string(),
            tag: "v1.0.0".to_string(),
            sha256: Some("ab".repeat(32)),
            installed_at: now,
            updated_at: now,
            install_path: PathBuf::from("/opt/ghrel/bin"),
        }
    }

    fn open_empty(dir: &Path) -> InstallationStore {
        InstallationStore::open(dir.join("ghrel.json"), None).unwrap()
    }

    #[test]
    fn test_open_creates_empty_store() {
        let dir = tempdir().unwrap();
        let store = open_empty(dir.path());
        assert!(store.path().exists());
        assert!(store.list().unwrap().is_empty());
        assert_eq!(fs::read_to_string(store.path()).unwrap().trim(), "{}");
    }

    #[test]
    fn test_save_then_get_round_trips_every_field() {
        let dir = tempdir().unwrap();
        let store = open_empty(dir.path());
        let mut inst = installation("tool", "github.com/alice/tool");
        inst.alias = Some("tool".into());

        store.save(inst.clone()).unwrap();
        assert_eq!(store.get("tool").unwrap(), inst);

        // A fresh handle reads the same record back from disk
        let reopened = InstallationStore::open(store.path(), None).unwrap();
        assert_eq!(reopened.get("tool").unwrap(), inst);
    }

    #[test]
    fn test_serialized_field_names() {
        let dir = tempdir().unwrap();
        let store = open_empty(dir.path());
        let mut inst = installation("tool", "github.com/alice/tool");
        inst.sha256 = None;
        store.save(inst).unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        let record = &json["tool"];
        for key in ["name", "repo", "tag", "installedAt", "updatedAt", "installPath"] {
            assert!(record.get(key).is_some(), "missing {key}");
        }
        assert!(record.get("alias").is_none());
        assert!(record.get("sha256").is_none());
    }

    #[test]
    fn test_delete_then_get_is_not_found() {
        let dir = tempdir().unwrap();
        let store = open_empty(dir.path());
        store.save(installation("tool", "github.com/alice/tool")).unwrap();

        let removed = store.delete("tool").unwrap();
        assert_eq!(removed.name, "tool");
        assert!(store.get("tool").unwrap_err().is_not_found());
        assert!(store.delete("tool").unwrap_err().is_not_found());
    }

    #[test]
    fn test_get_by_repo() {
        let dir = tempdir().unwrap();
        let store = open_empty(dir.path());
        store.save(installation("a", "github.com/o/a")).unwrap();
        store.save(installation("b", "github.com/o/b")).unwrap();

        assert_eq!(store.get_by_repo("github.com/o/b").unwrap().name, "b");
        assert!(store.get_by_repo("github.com/o/c").unwrap_err().is_not_found());
    }

    #[test]
    fn test_save_upserts_by_name() {
        let dir = tempdir().unwrap();
        let store = open_empty(dir.path());
        store.save(installation("tool", "github.com/o/tool")).unwrap();

        let mut updated = installation("tool", "github.com/o/tool");
        updated.tag = "v2.0.0".into();
        store.save(updated).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].tag, "v2.0.0");
    }

    #[test]
    fn test_repository_is_unique_across_names() {
        let dir = tempdir().unwrap();
        let store = open_empty(dir.path());
        store.save(installation("tool", "github.com/o/tool")).unwrap();

        let err = store
            .save(installation("alias", "github.com/o/tool"))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        store
            .replace("tool", installation("alias", "github.com/o/tool"))
            .unwrap();
        let names: Vec<_> = store.list().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, ["alias"]);
    }

    #[test]
    fn test_concurrent_saves_keep_every_record() {
        let dir = tempdir().unwrap();
        let store = Arc::new(open_empty(dir.path()));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .save(installation(&format!("tool-{i}"), &format!("github.com/o/tool-{i}")))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.list().unwrap().len(), 16);
    }

    #[test]
    fn test_no_staging_file_left_behind() {
        let dir = tempdir().unwrap();
        let store = open_empty(dir.path());
        store.save(installation("tool", "github.com/o/tool")).unwrap();
        assert!(!dir.path().join("ghrel.json.tmp").exists());
    }

    #[test]
    fn test_stale_staging_file_does_not_affect_committed_state() {
        let dir = tempdir().unwrap();
        let store = open_empty(dir.path());
        store.save(installation("tool", "github.com/o/tool")).unwrap();

        // Simulates a crash after writing the staging file but before rename
        fs::write(dir.path().join("ghrel.json.tmp"), b"{ half written").unwrap();

        let reopened = InstallationStore::open(dir.path().join("ghrel.json"), None).unwrap();
        assert_eq!(reopened.list().unwrap().len(), 1);
        reopened.save(installation("other", "github.com/o/other")).unwrap();
        assert_eq!(reopened.list().unwrap().len(), 2);
    }

    #[test]
    fn test_migrates_legacy_lock_file_once() {
        let dir = tempdir().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("alpha"), b"alpha binary").unwrap();

        let lock = dir.path().join("ghrel.lock");
        fs::write(
            &lock,
            format!(
                "alpha v1.0.0 github.com/o/alpha {bin}\nbeta v0.2.0 github.com/o/beta {bin}\n",
                bin = bin.display()
            ),
        )
        .unwrap();

        let store_path = dir.path().join("ghrel.json");
        let store = InstallationStore::open(&store_path, Some(&lock)).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "alpha");
        assert_eq!(all[0].tag, "v1.0.0");
        assert_eq!(all[0].repo, "github.com/o/alpha");
        assert_eq!(all[0].install_path, bin);
        assert_eq!(
            all[0].sha256.as_deref(),
            Some(file_sha256(&bin.join("alpha")).unwrap().as_str())
        );
        assert_eq!(all[1].name, "beta");
        assert_eq!(all[1].tag, "v0.2.0");
        assert!(all[1].sha256.is_none());

        assert!(!lock.exists());
        assert!(dir.path().join("ghrel.lock.backup").exists());

        // A new lock file appearing later is not imported again
        fs::write(&lock, "gamma v1 github.com/o/gamma /bin\n").unwrap();
        let again = InstallationStore::open(&store_path, Some(&lock)).unwrap();
        assert_eq!(again.list().unwrap().len(), 2);
        assert!(lock.exists());
    }

    #[test]
    fn test_migration_keeps_repositories_unique() {
        let dir = tempdir().unwrap();
        let lock = dir.path().join("ghrel.lock");
        fs::write(
            &lock,
            "alpha v1 https://github.com/o/alpha.git /bin\n\
             alpha-again v2 github.com/o/alpha /bin\n\
             beta v1 github.com/o/beta /bin\n\
             beta v9 github.com/o/beta-fork /bin\n",
        )
        .unwrap();

        let store = InstallationStore::open(dir.path().join("ghrel.json"), Some(&lock)).unwrap();

        let all: Vec<_> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|i| (i.name, i.repo, i.tag))
            .collect();
        assert_eq!(
            all,
            [
                ("alpha".to_string(), "github.com/o/alpha".to_string(), "v1".to_string()),
                ("beta".to_string(), "github.com/o/beta".to_string(), "v1".to_string()),
            ]
        );
        assert_eq!(store.get_by_repo("github.com/o/alpha").unwrap().name, "alpha");
    }

    #[test]
    fn test_file_sha256() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"").unwrap();
        assert_eq!(
            file_sha256(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
