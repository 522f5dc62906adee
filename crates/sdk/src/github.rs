//! GitHub REST API client.

use crate::api::SourceHost;
use crate::config::GithubConfig;
use crate::error::{SdkError, SdkResult};
use crate::transport::HttpTransport;
use pinner_core::{Commit, Release};
use reqwest::header;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";

/// Client for the parts of the GitHub API needed to pin actions.
#[derive(Debug, Clone)]
pub struct GithubClient {
    config: Arc<GithubConfig>,
    http: HttpTransport,
}

impl GithubClient {
    /// Create a new client builder.
    pub fn builder() -> GithubClientBuilder {
        GithubClientBuilder::new()
    }

    /// Create a client configured from `GITHUB_API_URL` and `GITHUB_TOKEN`.
    pub fn from_env() -> SdkResult<Self> {
        Self::from_config(GithubConfig::from_env()?)
    }

    /// Create a client from configuration.
    pub fn from_config(config: GithubConfig) -> SdkResult<Self> {
        config.validate()?;

        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(ACCEPT));
        headers.insert(
            header::HeaderName::from_static(API_VERSION_HEADER),
            header::HeaderValue::from_static(API_VERSION),
        );

        if let Some(ref token) = config.token {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| SdkError::Config("Invalid GitHub token format".to_string()))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let http = HttpTransport::new(headers, config.timeout)?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.config.token.is_some()
    }

    /// Build `<base>/repos/<owner>/<repo>/<rest...>` with every segment escaped.
    fn repo_url<'a>(
        &self,
        owner: &str,
        repo: &str,
        rest: impl IntoIterator<Item = &'a str>,
    ) -> SdkResult<Url> {
        if owner.is_empty() || repo.is_empty() {
            return Err(SdkError::InvalidInput(
                "owner and repo must not be empty".to_string(),
            ));
        }

        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SdkError::Config("GitHub API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["repos", owner, repo])
            .extend(rest);
        Ok(url)
    }

    /// Get the commit a ref (branch, tag, SHA) points to.
    pub async fn get_commit(&self, owner: &str, repo: &str, reference: &str) -> SdkResult<Commit> {
        if reference.is_empty() || reference.split('/').any(str::is_empty) {
            return Err(SdkError::InvalidInput(format!(
                "invalid ref {:?}",
                reference
            )));
        }

        let url = self.repo_url(
            owner,
            repo,
            std::iter::once("commits").chain(reference.split('/')),
        )?;
        debug!(owner, repo, reference, "Resolving ref");
        self.http.get_json(url).await
    }

    /// Get the latest published full release.
    ///
    /// GitHub excludes drafts and prereleases from this endpoint.
    pub async fn get_latest_release(&self, owner: &str, repo: &str) -> SdkResult<Release> {
        let url = self.repo_url(owner, repo, ["releases", "latest"])?;
        debug!(owner, repo, "Fetching latest release");
        self.http.get_json(url).await
    }

    /// List releases, most recent first (first page only).
    pub async fn list_releases(&self, owner: &str, repo: &str) -> SdkResult<Vec<Release>> {
        let url = self.repo_url(owner, repo, ["releases"])?;
        debug!(owner, repo, "Listing releases");
        self.http.get_json(url).await
    }
}

#[async_trait::async_trait]
impl SourceHost for GithubClient {
    async fn get_commit(&self, owner: &str, repo: &str, reference: &str) -> SdkResult<Commit> {
        GithubClient::get_commit(self, owner, repo, reference).await
    }

    async fn get_latest_release(&self, owner: &str, repo: &str) -> SdkResult<Release> {
        GithubClient::get_latest_release(self, owner, repo).await
    }

    async fn list_releases(&self, owner: &str, repo: &str) -> SdkResult<Vec<Release>> {
        GithubClient::list_releases(self, owner, repo).await
    }
}

/// Builder for creating a GithubClient.
pub struct GithubClientBuilder {
    base_url: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl GithubClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout: None,
        }
    }

    /// Set the base URL of the GitHub API (defaults to api.github.com).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the token used for authentication.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> SdkResult<GithubClient> {
        let base_url = Url::parse(
            self.base_url
                .as_deref()
                .unwrap_or(crate::config::DEFAULT_GITHUB_API_URL),
        )?;

        let config = GithubConfig {
            base_url,
            token: self.token,
            timeout: self.timeout,
        };

        GithubClient::from_config(config)
    }
}

impl Default for GithubClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
