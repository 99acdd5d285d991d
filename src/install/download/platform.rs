//! Platform detection and release file name matching

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Alias table keyed by the canonical OS or architecture token
pub type AliasTable = HashMap<String, Vec<String>>;

/// OS and architecture that release assets are matched against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPlatform {
    pub os: String,
    pub arch: String,
    #[serde(default)]
    pub os_aliases: AliasTable,
    #[serde(default)]
    pub arch_aliases: AliasTable,
}

impl TargetPlatform {
    /// Platform of the running host, using release naming tokens
    /// (`linux`/`darwin`/`windows`, `amd64`/`arm64`) and the default aliases.
    pub fn host() -> Self {
        Self {
            os: host_os().to_string(),
            arch: host_arch().to_string(),
            os_aliases: default_os_aliases(),
            arch_aliases: default_arch_aliases(),
        }
    }

    /// Check whether `filename` names a build for this platform
    pub fn matches(&self, filename: &str) -> bool {
        matches_platform(
            filename,
            &self.os,
            &self.arch,
            &self.os_aliases,
            &self.arch_aliases,
        )
    }
}

/// Case-insensitive check that `filename` contains the target OS (or one of
/// its aliases) and the target architecture (or one of its aliases).
pub fn matches_platform(
    filename: &str,
    target_os: &str,
    target_arch: &str,
    os_aliases: &AliasTable,
    arch_aliases: &AliasTable,
) -> bool {
    let name = filename.to_lowercase();
    contains_token(&name, target_os, os_aliases) && contains_token(&name, target_arch, arch_aliases)
}

fn contains_token(name: &str, token: &str, aliases: &AliasTable) -> bool {
    let token = token.to_lowercase();
    if name.contains(&token) {
        return true;
    }
    aliases
        .get(&token)
        .map(|list| list.iter().any(|alias| name.contains(&alias.to_lowercase())))
        .unwrap_or(false)
}

fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

pub fn default_os_aliases() -> AliasTable {
    HashMap::from([
        ("darwin".to_string(), vec!["macos".to_string()]),
        ("linux".to_string(), vec!["musl".to_string()]),
    ])
}

pub fn default_arch_aliases() -> AliasTable {
    HashMap::from([
        ("amd64".to_string(), vec!["x86_64".to_string()]),
        (
            "arm64".to_string(),
            vec!["aarch64".to_string(), "universal".to_string()],
        ),
    ])
}
