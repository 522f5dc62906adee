//! OCI distribution API client.

pub mod challenge;
pub mod keychain;

pub use challenge::Challenge;
pub use keychain::{Credential, Keychain};

use crate::api::ContainerRegistry;
use crate::config::RegistryConfig;
use crate::error::{SdkError, SdkResult};
use crate::transport::HttpTransport;
use base64::Engine;
use pinner_core::types::media_types;
use pinner_core::{Descriptor, Digest, ImageReference};
use reqwest::header::{self, HeaderMap};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

const DIGEST_HEADER: &str = "docker-content-digest";

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestHead {
    #[serde(default, rename = "mediaType")]
    media_type: Option<String>,
}

/// Authorization state for one logical operation (possibly several requests).
#[derive(Debug, Default)]
struct AuthSession {
    authorization: Option<String>,
    attempted: bool,
}

/// Client for container registries.
///
/// Holds no per-registry state; credentials are looked up in the Docker config
/// keychain whenever a registry asks for them.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    config: Arc<RegistryConfig>,
    http: HttpTransport,
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> SdkResult<Self> {
        let http = HttpTransport::new(HeaderMap::new(), config.timeout)?;
        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// Whether `registry` is reached over plain HTTP.
    pub fn is_insecure(&self, registry: &str) -> bool {
        let host = host_without_port(registry);
        host == "localhost"
            || host.starts_with("127.")
            || host == "[::1]"
            || host.ends_with(".local")
            || host.ends_with(".localhost")
            || self
                .config
                .insecure_registries
                .iter()
                .any(|r| r == registry || r == host)
    }

    fn repository_url(&self, reference: &ImageReference, rest: &[&str]) -> SdkResult<Url> {
        let scheme = if self.is_insecure(reference.registry()) {
            "http"
        } else {
            "https"
        };

        let mut url = Url::parse(&format!("{}://{}/v2/", scheme, reference.registry()))?;
        url.path_segments_mut()
            .map_err(|_| SdkError::InvalidInput(format!("invalid registry {}", reference.registry())))?
            .pop_if_empty()
            .extend(reference.repository().split('/'))
            .extend(rest);
        Ok(url)
    }

    async fn keychain(&self) -> SdkResult<Keychain> {
        Keychain::load(self.config.resolved_docker_config_dir().as_deref()).await
    }

    fn request(&self, url: Url, accept: Option<&str>, authorization: Option<&str>) -> RequestBuilder {
        let mut request = self.http.get(url);
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }
        if let Some(authorization) = authorization {
            request = request.header(header::AUTHORIZATION, authorization);
        }
        request
    }

    /// Send a GET, answering at most one authentication challenge per session.
    async fn fetch(
        &self,
        reference: &ImageReference,
        session: &mut AuthSession,
        url: Url,
        accept: Option<&str>,
    ) -> SdkResult<Response> {
        let response = self
            .http
            .send(self.request(url.clone(), accept, session.authorization.as_deref()))
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED || session.attempted {
            return HttpTransport::check(response).await;
        }

        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(Challenge::parse);
        let Some(challenge) = challenge else {
            return HttpTransport::check(response).await;
        };

        session.attempted = true;
        session.authorization = Some(self.authorize(reference, &challenge).await?);

        let response = self
            .http
            .send(self.request(url, accept, session.authorization.as_deref()))
            .await?;
        HttpTransport::check(response).await
    }

    /// Produce an `Authorization` header value for a challenge.
    async fn authorize(&self, reference: &ImageReference, challenge: &Challenge) -> SdkResult<String> {
        let credential = self.keychain().await?.resolve(reference.registry()).await?;

        match challenge {
            Challenge::Basic => {
                let credential = credential.ok_or_else(|| {
                    SdkError::Authentication(format!(
                        "registry {} requires credentials",
                        reference.registry()
                    ))
                })?;
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", credential.username, credential.password));
                Ok(format!("Basic {}", encoded))
            }
            Challenge::Bearer { realm, service } => {
                let mut url = Url::parse(realm)?;
                {
                    let mut query = url.query_pairs_mut();
                    if let Some(service) = service {
                        query.append_pair("service", service);
                    }
                    query.append_pair("scope", &reference.pull_scope());
                }

                debug!(
                    registry = reference.registry(),
                    anonymous = credential.is_none(),
                    "Requesting registry token"
                );

                let mut request = self.http.get(url);
                if let Some(credential) = credential {
                    request = request.basic_auth(credential.username, Some(credential.password));
                }

                let response: TokenResponse = self.http.execute(request).await?.json().await?;
                let token = response
                    .token
                    .or(response.access_token)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        SdkError::InvalidResponse("token endpoint returned no token".to_string())
                    })?;
                Ok(format!("Bearer {}", token))
            }
        }
    }

    /// List every tag of the repository, following pagination.
    pub async fn list_tags(&self, reference: &ImageReference) -> SdkResult<Vec<String>> {
        let mut url = self.repository_url(reference, &["tags", "list"])?;
        let mut session = AuthSession::default();
        let mut tags = Vec::new();

        loop {
            debug!(url = %url, "Listing tags");
            let response = self.fetch(reference, &mut session, url.clone(), None).await?;
            let next = next_link(response.headers(), &url)?;
            let page: TagList = response.json().await?;
            tags.extend(page.tags.unwrap_or_default());

            match next {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }

        info!(repository = %reference.context(), count = tags.len(), "Listed tags");
        Ok(tags)
    }

    /// Fetch the manifest a reference points at and describe it.
    ///
    /// The digest is computed from the manifest bytes and checked against the
    /// `Docker-Content-Digest` header and, for digest references, the reference itself.
    pub async fn get_descriptor(&self, reference: &ImageReference) -> SdkResult<Descriptor> {
        let identifier = reference.identifier().to_string();
        let url = self.repository_url(reference, &["manifests", identifier.as_str()])?;
        let accept = media_types::ACCEPTED.join(", ");

        debug!(url = %url, "Fetching manifest");
        let response = self
            .fetch(reference, &mut AuthSession::default(), url, Some(&accept))
            .await?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let advertised = response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string());

        let body = response.bytes().await?;
        let digest = Digest::sha256_of(&body);

        if let Some(advertised) = advertised {
            let advertised = Digest::parse(&advertised)?;
            if advertised != digest {
                return Err(SdkError::DigestMismatch {
                    expected: advertised.to_string(),
                    actual: digest.to_string(),
                });
            }
        }

        if let Some(expected) = reference.digest() {
            if expected != &digest {
                return Err(SdkError::DigestMismatch {
                    expected: expected.to_string(),
                    actual: digest.to_string(),
                });
            }
        }

        let media_type = match content_type {
            Some(media_type) => media_type,
            None => serde_json::from_slice::<ManifestHead>(&body)
                .ok()
                .and_then(|m| m.media_type)
                .unwrap_or_default(),
        };

        info!(reference = %reference, digest = %digest, "Resolved manifest");
        Ok(Descriptor {
            media_type,
            digest,
            size: body.len() as u64,
        })
    }
}

#[async_trait::async_trait]
impl ContainerRegistry for RegistryClient {
    async fn list_tags(&self, reference: &ImageReference) -> SdkResult<Vec<String>> {
        RegistryClient::list_tags(self, reference).await
    }

    async fn get_descriptor(&self, reference: &ImageReference) -> SdkResult<Descriptor> {
        RegistryClient::get_descriptor(self, reference).await
    }
}

fn host_without_port(registry: &str) -> &str {
    if registry.starts_with('[') {
        return match registry.find(']') {
            Some(end) => &registry[..=end],
            None => registry,
        };
    }
    match registry.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => registry,
    }
}

/// Resolve the `rel="next"` target of a `Link` header against the current URL.
fn next_link(headers: &HeaderMap, current: &Url) -> SdkResult<Option<Url>> {
    for value in headers.get_all(header::LINK) {
        let Ok(value) = value.to_str() else {
            continue;
        };

        for link in value.split(',') {
            let mut parts = link.split(';');
            let target = parts.next().unwrap_or_default().trim();
            let is_next = parts.any(|p| {
                let p = p.trim().replace(' ', "");
                p == "rel=\"next\"" || p == "rel=next"
            });

            if !is_next {
                continue;
            }

            let target = target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .ok_or_else(|| SdkError::InvalidResponse(format!("malformed Link header: {}", value)))?;
            return Ok(Some(current.join(target)?));
        }
    }

    Ok(None)
}
