use anyhow::{Context, Result};
use pinner_sdk::{GithubConfig, RegistryConfig, DEFAULT_GITHUB_API_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub github: GithubSection,

    #[serde(default)]
    pub registry: RegistrySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubSection {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout; unset keeps the HTTP client default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Only ever taken from the environment.
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_api_url() -> String {
    DEFAULT_GITHUB_API_URL.to_string()
}

impl Default for GithubSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: None,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySection {
    /// Registries reached over plain HTTP.
    #[serde(default)]
    pub insecure_registries: Vec<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Directory holding the Docker `config.json` used for credentials.
    #[serde(default)]
    pub docker_config_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Load the configuration file if it exists, otherwise use defaults.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path).with_context(|| {
                format!("Failed to read configuration file {}", config_path.display())
            })?;
            toml::from_str(&content).with_context(|| {
                format!("Failed to parse configuration file {}", config_path.display())
            })?
        } else {
            tracing::info!(path = %config_path.display(), "Configuration file not found, using defaults");
            Self::default()
        };

        Ok(config)
    }

    /// Apply `GITHUB_API_URL`, `GITHUB_TOKEN` and `DOCKER_CONFIG` on top of the file values.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("GITHUB_API_URL") {
            self.github.api_url = url.trim().to_string();
        }
        if let Some(token) = non_empty("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(dir) = non_empty("DOCKER_CONFIG") {
            self.registry.docker_config_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn github_config(&self) -> Result<GithubConfig> {
        let base_url = Url::parse(&self.github.api_url)
            .with_context(|| format!("Invalid GitHub API URL {}", self.github.api_url))?;

        let mut config = GithubConfig::new(base_url);
        config.token = self.github.token.clone();
        config.timeout = self.github.timeout_secs.map(Duration::from_secs);
        config.validate()?;
        Ok(config)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            insecure_registries: self.registry.insecure_registries.clone(),
            timeout: self.registry.timeout_secs.map(Duration::from_secs),
            docker_config_dir: self.registry.docker_config_dir.clone(),
        }
    }
}
