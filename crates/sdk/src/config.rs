//! Configuration types for the pinner SDK clients.

use crate::error::{SdkError, SdkResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default GitHub REST API endpoint.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("pinner-mcp/", env!("CARGO_PKG_VERSION"));

/// Configuration for the GitHub client.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// Base URL of the GitHub REST API.
    pub base_url: Url,
    /// Token sent as a bearer credential.
    pub token: Option<String>,
    /// Request timeout. `None` keeps the HTTP client's default.
    pub timeout: Option<Duration>,
}

impl GithubConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            token: None,
            timeout: None,
        }
    }

    /// Configuration derived from the environment.
    ///
    /// `GITHUB_API_URL` overrides the endpoint and `GITHUB_TOKEN` provides the credential.
    pub fn from_env() -> SdkResult<Self> {
        let base_url = match std::env::var("GITHUB_API_URL") {
            Ok(url) if !url.trim().is_empty() => Url::parse(url.trim())?,
            _ => default_github_url()?,
        };

        let token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        Ok(Self {
            base_url,
            token,
            timeout: None,
        })
    }

    pub fn validate(&self) -> SdkResult<()> {
        if self.base_url.cannot_be_a_base() {
            return Err(SdkError::Config(format!(
                "GitHub API URL cannot be used as a base: {}",
                self.base_url
            )));
        }
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(SdkError::Config(format!(
                "GitHub API URL must be http or https: {}",
                self.base_url
            )));
        }
        Ok(())
    }
}

fn default_github_url() -> SdkResult<Url> {
    Ok(Url::parse(DEFAULT_GITHUB_API_URL)?)
}

/// Configuration for the container registry client.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Registries reached over plain HTTP in addition to loopback hosts.
    pub insecure_registries: Vec<String>,
    /// Request timeout. `None` keeps the HTTP client's default.
    pub timeout: Option<Duration>,
    /// Directory holding the Docker `config.json`.
    ///
    /// Falls back to `$DOCKER_CONFIG`, then `~/.docker`.
    pub docker_config_dir: Option<PathBuf>,
}

impl RegistryConfig {
    /// Directory that holds the credential file, if one can be determined.
    ///
    /// An explicit directory wins, then `$DOCKER_CONFIG`, then `~/.docker`.
    pub fn resolved_docker_config_dir(&self) -> Option<PathBuf> {
        resolve_docker_config_dir(
            self.docker_config_dir.as_deref(),
            std::env::var_os("DOCKER_CONFIG"),
            dirs::home_dir(),
        )
    }
}

fn resolve_docker_config_dir(
    explicit: Option<&Path>,
    docker_config: Option<OsString>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(dir) = explicit {
        return Some(dir.to_path_buf());
    }
    if let Some(dir) = docker_config.filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    home.map(|h| h.join(".docker"))
}
