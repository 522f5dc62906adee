// Registry credentials from the Docker `config.json` and its credential helpers

use crate::error::{SdkError, SdkResult};
use base64::Engine;
use pinner_core::DEFAULT_REGISTRY;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

const CONFIG_FILE: &str = "config.json";
const DOCKER_HUB_KEYS: &[&str] = &[
    "https://index.docker.io/v1/",
    "https://index.docker.io/v1",
    "index.docker.io",
    "docker.io",
    "registry-1.docker.io",
];

/// Server URL credential helpers store Docker Hub credentials under.
const DOCKER_HUB_SERVER_URL: &str = "https://index.docker.io/v1/";
const HELPER_PREFIX: &str = "docker-credential-";
const HELPER_TIMEOUT: Duration = Duration::from_secs(30);
const HELPER_NOT_FOUND: &str = "credentials not found";

/// Username and password for a registry.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct DockerConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    #[serde(default, rename = "credsStore")]
    creds_store: Option<String>,
    #[serde(default, rename = "credHelpers")]
    cred_helpers: HashMap<String, String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct AuthEntry {
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// What `docker-credential-<name> get` prints on success.
#[derive(Deserialize)]
struct HelperResponse {
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Secret")]
    secret: String,
}

/// Credentials loaded from a Docker config directory.
///
/// A missing file is an empty keychain, which means anonymous access.
/// When `credHelpers` or `credsStore` names a helper for a registry, that
/// helper is the only source of credentials for it, as with the Docker CLI.
#[derive(Debug, Default, Clone)]
pub struct Keychain {
    auths: HashMap<String, AuthEntry>,
    creds_store: Option<String>,
    cred_helpers: HashMap<String, String>,
    helper_dir: Option<PathBuf>,
}

impl Keychain {
    /// Load `<dir>/config.json`; `None` yields an empty keychain.
    pub async fn load(dir: Option<&Path>) -> SdkResult<Self> {
        let Some(dir) = dir else {
            return Ok(Self::default());
        };

        let path: PathBuf = dir.join(CONFIG_FILE);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No docker config, using anonymous access");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(SdkError::Keychain(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Self::from_json(&content)
            .map_err(|e| SdkError::Keychain(format!("failed to parse {}: {}", path.display(), e)))
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let file: DockerConfigFile = serde_json::from_str(content)?;
        Ok(Self {
            auths: file.auths,
            creds_store: file.creds_store.filter(|s| !s.trim().is_empty()),
            cred_helpers: file.cred_helpers,
            helper_dir: None,
        })
    }

    /// Run credential helpers from `dir` instead of searching `PATH`.
    pub fn with_helper_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.helper_dir = Some(dir.into());
        self
    }

    /// Credential for `registry` (a host, optionally with port), if configured.
    pub async fn resolve(&self, registry: &str) -> SdkResult<Option<Credential>> {
        if let Some(helper) = self.helper_for(registry) {
            return self.run_helper(helper, registry).await;
        }

        match lookup(&self.auths, registry) {
            Some(entry) => decode(registry, entry),
            None => Ok(None),
        }
    }

    /// `credHelpers` entry for the registry, else the global `credsStore`.
    fn helper_for(&self, registry: &str) -> Option<&str> {
        lookup(&self.cred_helpers, registry)
            .map(String::as_str)
            .filter(|h| !h.trim().is_empty())
            .or(self.creds_store.as_deref())
    }

    async fn run_helper(&self, helper: &str, registry: &str) -> SdkResult<Option<Credential>> {
        let name = format!("{}{}", HELPER_PREFIX, helper);
        let program = match &self.helper_dir {
            Some(dir) => dir.join(&name),
            None => PathBuf::from(&name),
        };
        let server_url = if registry == DEFAULT_REGISTRY {
            DOCKER_HUB_SERVER_URL
        } else {
            registry
        };

        debug!(helper = %name, registry, "Querying credential helper");
        let mut child = Command::new(&program)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SdkError::Keychain(format!("failed to run {}: {}", name, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(server_url.as_bytes())
                .await
                .map_err(|e| SdkError::Keychain(format!("failed to write to {}: {}", name, e)))?;
        }

        let output = tokio::time::timeout(HELPER_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| SdkError::Keychain(format!("{} timed out", name)))?
            .map_err(|e| SdkError::Keychain(format!("failed to run {}: {}", name, e)))?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stdout.contains(HELPER_NOT_FOUND) || stderr.contains(HELPER_NOT_FOUND) {
                debug!(helper = %name, registry, "No stored credentials, using anonymous access");
                return Ok(None);
            }
            let message = if stdout.trim().is_empty() { stderr } else { stdout };
            return Err(SdkError::Keychain(format!(
                "{} failed for {}: {}",
                name,
                registry,
                message.trim()
            )));
        }

        let response: HelperResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| SdkError::Keychain(format!("invalid output from {}: {}", name, e)))?;
        if response.username.is_empty() && response.secret.is_empty() {
            return Ok(None);
        }
        Ok(Some(Credential {
            username: response.username,
            password: response.secret,
        }))
    }
}

/// Entry keyed by `registry`, accepting scheme-prefixed keys and the Docker Hub aliases.
fn lookup<'a, T>(map: &'a HashMap<String, T>, registry: &str) -> Option<&'a T> {
    if registry == DEFAULT_REGISTRY {
        return DOCKER_HUB_KEYS.iter().find_map(|key| map.get(*key));
    }
    map.get(registry).or_else(|| {
        map.iter()
            .find(|(key, _)| host_of(key) == registry)
            .map(|(_, value)| value)
    })
}

/// Strip scheme and path from a config key (`https://ghcr.io/v1/` -> `ghcr.io`).
fn host_of(key: &str) -> &str {
    let key = key
        .strip_prefix("https://")
        .or_else(|| key.strip_prefix("http://"))
        .unwrap_or(key);
    key.split('/').next().unwrap_or(key)
}

fn decode(registry: &str, entry: &AuthEntry) -> SdkResult<Option<Credential>> {
    if let Some(auth) = entry.auth.as_deref().filter(|a| !a.is_empty()) {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(auth.trim())
            .map_err(|e| SdkError::Keychain(format!("invalid auth for {}: {}", registry, e)))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| SdkError::Keychain(format!("auth for {} is not UTF-8", registry)))?;
        let (username, password) = decoded.split_once(':').ok_or_else(|| {
            SdkError::Keychain(format!("auth for {} is not user:password", registry))
        })?;
        return Ok(Some(Credential {
            username: username.to_string(),
            password: password.to_string(),
        }));
    }

    match (&entry.username, &entry.password) {
        (Some(username), Some(password)) => Ok(Some(Credential {
            username: username.clone(),
            password: password.clone(),
        })),
        _ => Ok(None),
    }
}
