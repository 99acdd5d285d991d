//! Runtime configuration
//!
//! Defaults are derived from the user's home directory. An optional TOML
//! file can override the bin directory, temp directory, platform tokens,
//! alias tables and API base URL.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::install::download::{AliasTable, DEFAULT_API_BASE, TargetPlatform};

/// Directory below the home directory holding all ghrel state
pub const HOME_DIR_NAME: &str = ".ghrel";
pub const STORE_FILE: &str = "ghrel.json";
pub const LEGACY_LOCK_FILE: &str = "ghrel.lock";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct Config {
    pub home_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub store_path: PathBuf,
    pub legacy_lock_path: PathBuf,
    /// Base directory for workspaces, system temp dir when unset
    pub temp_dir: Option<PathBuf>,
    pub platform: TargetPlatform,
    pub api_base: String,
    pub github_token: Option<String>,
}

/// On-disk overrides, every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    bin_dir: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
    os: Option<String>,
    arch: Option<String>,
    os_aliases: Option<AliasTable>,
    arch_aliases: Option<AliasTable>,
    api_base: Option<String>,
}

impl Config {
    /// Defaults rooted at `<home>/.ghrel`
    pub fn with_home(home: &Path) -> Self {
        let home_dir = home.join(HOME_DIR_NAME);
        Self {
            bin_dir: home_dir.join("bin"),
            store_path: home_dir.join(STORE_FILE),
            legacy_lock_path: home_dir.join(LEGACY_LOCK_FILE),
            temp_dir: None,
            platform: TargetPlatform::host(),
            api_base: DEFAULT_API_BASE.to_string(),
            github_token: None,
            home_dir,
        }
    }

    /// Build the configuration for the current user.
    ///
    /// An explicit `path` must exist. Without one, `~/.ghrel/config.toml` is
    /// read when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::with_home(&user_home()?);

        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Some(config.home_dir.join(CONFIG_FILE)).filter(|p| p.exists()),
        };
        if let Some(file) = file {
            let content = fs::read_to_string(&file)
                .map_err(|e| Error::Config(format!("{}: {e}", file.display())))?;
            config
                .apply_toml(&content)
                .map_err(|e| Error::Config(format!("{}: {e}", file.display())))?;
            debug!("Loaded configuration from {}", file.display());
        }

        Ok(config)
    }

    fn apply_toml(&mut self, content: &str) -> std::result::Result<(), toml::de::Error> {
        let file: ConfigFile = toml::from_str(content)?;

        if let Some(bin_dir) = file.bin_dir {
            self.bin_dir = bin_dir;
        }
        if let Some(temp_dir) = file.temp_dir {
            self.temp_dir = Some(temp_dir);
        }
        if let Some(os) = file.os {
            self.platform.os = os;
        }
        if let Some(arch) = file.arch {
            self.platform.arch = arch;
        }
        if let Some(aliases) = file.os_aliases {
            self.platform.os_aliases.extend(aliases);
        }
        if let Some(aliases) = file.arch_aliases {
            self.platform.arch_aliases.extend(aliases);
        }
        if let Some(api_base) = file.api_base {
            self.api_base = api_base;
        }
        Ok(())
    }

    /// Create the home and bin directories
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.home_dir)?;
        fs::create_dir_all(&self.bin_dir)?;
        Ok(())
    }
}

/// Check whether `dir` is one of the entries of a `PATH`-style value
pub fn dir_on_path(dir: &Path, path_var: Option<&OsStr>) -> bool {
    path_var.is_some_and(|paths| std::env::split_paths(paths).any(|entry| entry == dir))
}

/// Home of the invoking user. Under `sudo` on Linux this is the home of
/// `SUDO_USER`, so installs land in the real user's tree.
fn user_home() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(user) = std::env::var("SUDO_USER") {
            if !user.is_empty() && user != "root" {
                return Ok(PathBuf::from("/home").join(user));
            }
        }
    }

    dirs::home_dir().ok_or_else(|| Error::Config("could not determine home directory".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::ffi::OsString;
    use tempfile::tempdir;

    #[test]
    fn test_default_layout() {
        let config = Config::with_home(Path::new("/home/alice"));
        assert_eq!(config.home_dir, Path::new("/home/alice/.ghrel"));
        assert_eq!(config.bin_dir, Path::new("/home/alice/.ghrel/bin"));
        assert_eq!(config.store_path, Path::new("/home/alice/.ghrel/ghrel.json"));
        assert_eq!(config.legacy_lock_path, Path::new("/home/alice/.ghrel/ghrel.lock"));
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert!(config.temp_dir.is_none());
    }

    #[test]
    fn test_toml_overrides() {
        let mut config = Config::with_home(Path::new("/home/alice"));
        config
            .apply_toml(
                r#"
bin_dir = "/usr/local/bin"
temp_dir = "/var/tmp"
os = "linux"
arch = "arm"
api_base = "http://localhost:8080"

[arch_aliases]
arm = ["armv7", "armhf"]
"#,
            )
            .unwrap();

        assert_eq!(config.bin_dir, Path::new("/usr/local/bin"));
        assert_eq!(config.temp_dir.as_deref(), Some(Path::new("/var/tmp")));
        assert_eq!(config.platform.os, "linux");
        assert_eq!(config.platform.arch, "arm");
        assert_eq!(config.api_base, "http://localhost:8080");
        assert_eq!(config.platform.arch_aliases["arm"], ["armv7", "armhf"]);
        // Defaults survive alongside added entries
        assert!(config.platform.arch_aliases.contains_key("amd64"));
        assert!(config.platform.matches("tool_linux_armv7.tar.gz"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let mut config = Config::with_home(Path::new("/home/alice"));
        assert!(config.apply_toml("bindir = \"/bin\"").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "bin_dir = \"/opt/tools/bin\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.bin_dir, Path::new("/opt/tools/bin"));
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempdir().unwrap();
        let config = Config::with_home(dir.path());
        config.ensure_dirs().unwrap();
        assert!(config.bin_dir.is_dir());
    }

    #[test]
    fn test_dir_on_path() {
        let paths: OsString = std::env::join_paths(["/usr/bin", "/home/alice/.ghrel/bin"]).unwrap();
        assert!(dir_on_path(Path::new("/home/alice/.ghrel/bin"), Some(paths.as_os_str())));
        assert!(!dir_on_path(Path::new("/opt/bin"), Some(paths.as_os_str())));
        assert!(!dir_on_path(Path::new("/usr/bin"), None));
    }
}
