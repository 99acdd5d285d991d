//! GitHub release API interaction

use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::debug;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Owner and name of a GitHub repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parse `github.com/<owner>/<repo>`, optionally prefixed with a URL
    /// scheme and optionally suffixed with `.git`.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || Error::InvalidRepo(input.to_string());
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let mut path = if trimmed.contains("://") {
            let url = url::Url::parse(trimmed).map_err(|_| invalid())?;
            if url.host_str() != Some("github.com") {
                return Err(invalid());
            }
            format!("github.com{}", url.path())
        } else {
            trimmed.to_string()
        };

        if let Some(stripped) = path.strip_suffix('/') {
            path = stripped.to_string();
        }
        if let Some(stripped) = path.strip_suffix(".git") {
            path = stripped.to_string();
        }

        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            ["github.com", owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "github.com/{}/{}", self.owner, self.name)
    }
}

/// GitHub release metadata from API
#[derive(Deserialize, Debug, Clone)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

/// GitHub release asset metadata
#[derive(Deserialize, Debug, Clone)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// Source of release metadata
pub trait ReleaseSource {
    fn latest_release(&self, repo: &RepoRef) -> impl Future<Output = Result<GitHubRelease>> + Send;

    fn release_by_tag(
        &self,
        repo: &RepoRef,
        tag: &str,
    ) -> impl Future<Output = Result<GitHubRelease>> + Send;
}

/// Release source backed by the GitHub REST API
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
}

impl GitHubClient {
    pub fn new(api_base: &str, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| Error::Config("GitHub token contains invalid characters".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("ghrel/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(API_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, url: String, what: String) -> Result<GitHubRelease> {
        debug!("GET {url}");
        let response = self.client.get(&url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(Error::NotFound(what)),
            status => Err(Error::HttpStatus {
                status: status.as_u16(),
            }),
        }
    }
}

impl ReleaseSource for GitHubClient {
    async fn latest_release(&self, repo: &RepoRef) -> Result<GitHubRelease> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base, repo.owner, repo.name
        );
        self.fetch(url, format!("latest release of {repo}")).await
    }

    async fn release_by_tag(&self, repo: &RepoRef, tag: &str) -> Result<GitHubRelease> {
        let url = format!(
            "{}/repos/{}/{}/releases/tags/{}",
            self.api_base, repo.owner, repo.name, tag
        );
        self.fetch(url, format!("release {tag} of {repo}")).await
    }
}
