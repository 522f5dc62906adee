// Container image references (`[registry/]repository[:tag|@digest]`)

use crate::digest::Digest;
use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::str::FromStr;

/// Registry used when a reference does not name one.
pub const DEFAULT_REGISTRY: &str = "index.docker.io";
/// Tag used when a reference names neither a tag nor a digest.
pub const DEFAULT_TAG: &str = "latest";

const DOCKER_HUB_ALIAS: &str = "docker.io";
const OFFICIAL_NAMESPACE: &str = "library";
const MAX_TAG_LEN: usize = 128;
const MAX_REPOSITORY_LEN: usize = 255;

/// What a reference points at inside its repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Tag(String),
    Digest(Digest),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Tag(tag) => f.write_str(tag),
            Identifier::Digest(digest) => write!(f, "{}", digest),
        }
    }
}

/// A parsed image reference.
///
/// Parsing follows the Docker conventions: a leading component containing `.` or `:`
/// (or equal to `localhost`) names the registry, Docker Hub is the default registry,
/// single-component Docker Hub repositories live under `library/`, and the default tag
/// is `latest`. The original text is kept so that `to_string()` returns exactly what
/// was parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    original: String,
    registry: String,
    repository: String,
    identifier: Identifier,
}

impl ImageReference {
    pub fn parse(s: &str) -> CoreResult<Self> {
        if s.is_empty() {
            return Err(CoreError::reference(s, "reference is empty"));
        }

        let (name, identifier) = match s.split_once('@') {
            Some((name, digest)) => {
                let digest = Digest::parse(digest)
                    .map_err(|e| CoreError::reference(s, e.to_string()))?;
                // A tag next to a digest is allowed but the digest wins.
                let (name, _) = split_tag(name);
                (name, Identifier::Digest(digest))
            }
            None => {
                let (name, tag) = split_tag(s);
                let tag = match tag {
                    Some(tag) => {
                        check_tag(s, tag)?;
                        tag.to_string()
                    }
                    None => DEFAULT_TAG.to_string(),
                };
                (name, Identifier::Tag(tag))
            }
        };

        let (registry, repository) = split_registry(name);
        check_registry(s, registry)?;
        check_repository(s, repository)?;

        let registry = if registry == DOCKER_HUB_ALIAS {
            DEFAULT_REGISTRY
        } else {
            registry
        };

        let repository = if registry == DEFAULT_REGISTRY && !repository.contains('/') {
            format!("{}/{}", OFFICIAL_NAMESPACE, repository)
        } else {
            repository.to_string()
        };

        Ok(Self {
            original: s.to_string(),
            registry: registry.to_string(),
            repository,
            identifier,
        })
    }

    /// Build and parse `<image>:<version>`.
    pub fn with_version(image: &str, version: &str) -> CoreResult<Self> {
        Self::parse(&format!("{}:{}", image, version))
    }

    /// Registry host to talk to (Docker Hub aliases resolve to `index.docker.io`).
    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.identifier {
            Identifier::Tag(tag) => Some(tag),
            Identifier::Digest(_) => None,
        }
    }

    pub fn digest(&self) -> Option<&Digest> {
        match &self.identifier {
            Identifier::Digest(digest) => Some(digest),
            Identifier::Tag(_) => None,
        }
    }

    /// Fully qualified `registry/repository` name.
    pub fn context(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// Token scope granting pull access to this repository.
    pub fn pull_scope(&self) -> String {
        format!("repository:{}:pull", self.repository)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl FromStr for ImageReference {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split off a trailing `:tag`, ignoring colons that belong to a registry port.
fn split_tag(s: &str) -> (&str, Option<&str>) {
    let tail_start = s.rfind('/').map(|i| i + 1).unwrap_or(0);
    match s[tail_start..].rfind(':') {
        Some(i) => {
            let colon = tail_start + i;
            (&s[..colon], Some(&s[colon + 1..]))
        }
        None => (s, None),
    }
}

fn split_registry(name: &str) -> (&str, &str) {
    match name.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            (first, rest)
        }
        _ => (DEFAULT_REGISTRY, name),
    }
}

fn check_tag(reference: &str, tag: &str) -> CoreResult<()> {
    if tag.is_empty() {
        return Err(CoreError::reference(reference, "tag must not be empty"));
    }
    if tag.len() > MAX_TAG_LEN {
        return Err(CoreError::reference(
            reference,
            format!("tag must be at most {} characters", MAX_TAG_LEN),
        ));
    }
    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(CoreError::reference(
            reference,
            "tag must not start with '.' or '-'",
        ));
    }
    if let Some(c) = tag
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        return Err(CoreError::reference(
            reference,
            format!("tag contains invalid character {:?}", c),
        ));
    }
    Ok(())
}

fn check_registry(reference: &str, registry: &str) -> CoreResult<()> {
    if registry.is_empty() {
        return Err(CoreError::reference(reference, "registry must not be empty"));
    }

    // `[v6addr]` or `host`, optionally followed by `:port`
    let (host, port) = if let Some(rest) = registry.strip_prefix('[') {
        let Some((addr, after)) = rest.split_once(']') else {
            return Err(CoreError::reference(reference, "registry has an unclosed '['"));
        };
        if addr.is_empty() || !addr.chars().all(|c| c.is_ascii_hexdigit() || c == ':') {
            return Err(CoreError::reference(reference, "registry has an invalid IPv6 address"));
        }
        match after {
            "" => (registry, None),
            _ => match after.strip_prefix(':') {
                Some(port) => (&registry[..registry.len() - after.len()], Some(port)),
                None => {
                    return Err(CoreError::reference(
                        reference,
                        "unexpected characters after IPv6 address",
                    ))
                }
            },
        }
    } else {
        let (host, port) = match registry.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (registry, None),
        };
        if host.is_empty() {
            return Err(CoreError::reference(reference, "registry host must not be empty"));
        }
        if let Some(c) = host
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-')))
        {
            return Err(CoreError::reference(
                reference,
                format!("registry contains invalid character {:?}", c),
            ));
        }
        (host, port)
    };

    if let Some(port) = port {
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::reference(
                reference,
                format!("registry {} has a non-numeric port {:?}", host, port),
            ));
        }
    }
    Ok(())
}

fn check_repository(reference: &str, repository: &str) -> CoreResult<()> {
    if repository.is_empty() {
        return Err(CoreError::reference(reference, "repository must not be empty"));
    }
    if repository.len() > MAX_REPOSITORY_LEN {
        return Err(CoreError::reference(
            reference,
            format!("repository must be at most {} characters", MAX_REPOSITORY_LEN),
        ));
    }
    if repository.split('/').any(str::is_empty) {
        return Err(CoreError::reference(
            reference,
            "repository contains an empty path component",
        ));
    }
    if let Some(c) = repository.chars().find(|c| {
        !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.' | '/'))
    }) {
        return Err(CoreError::reference(
            reference,
            format!("repository contains invalid character {:?}", c),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALPINE_DIGEST: &str =
        "sha256:e5d0aea7f7d2954678a9a6269ca2d06e06591881161961ea59e974dff3f12377";

    #[test]
    fn test_with_version_round_trips() {
        let cases = [
            ("alpine", "latest", "alpine:latest"),
            ("docker.io/library/alpine", "latest", "docker.io/library/alpine:latest"),
            ("ghcr.io/owner/app", "v1.2.3", "ghcr.io/owner/app:v1.2.3"),
            ("localhost:5000/team/app", "dev", "localhost:5000/team/app:dev"),
        ];

        for (image, version, expected) in cases {
            let reference = ImageReference::with_version(image, version).unwrap();
            assert_eq!(reference.to_string(), expected);
            assert_eq!(reference.tag(), Some(version));
        }
    }

    #[test]
    fn test_docker_hub_short_name() {
        let reference = ImageReference::parse("alpine:3.19.7").unwrap();
        assert_eq!(reference.registry(), "index.docker.io");
        assert_eq!(reference.repository(), "library/alpine");
        assert_eq!(reference.tag(), Some("3.19.7"));
        assert_eq!(reference.pull_scope(), "repository:library/alpine:pull");
    }

    #[test]
    fn test_docker_io_alias() {
        let reference = ImageReference::parse("docker.io/library/alpine:latest").unwrap();
        assert_eq!(reference.registry(), "index.docker.io");
        assert_eq!(reference.repository(), "library/alpine");
        assert_eq!(reference.context(), "index.docker.io/library/alpine");
    }

    #[test]
    fn test_docker_hub_user_namespace_kept() {
        let reference = ImageReference::parse("bitnami/redis:7").unwrap();
        assert_eq!(reference.repository(), "bitnami/redis");
    }

    #[test]
    fn test_registry_with_port_and_default_tag() {
        let reference = ImageReference::parse("localhost:5000/foo").unwrap();
        assert_eq!(reference.registry(), "localhost:5000");
        assert_eq!(reference.repository(), "foo");
        assert_eq!(reference.tag(), Some(DEFAULT_TAG));
        assert_eq!(reference.to_string(), "localhost:5000/foo");
    }

    #[test]
    fn test_digest_reference() {
        let s = format!("alpine@{}", ALPINE_DIGEST);
        let reference = ImageReference::parse(&s).unwrap();
        assert_eq!(reference.digest().unwrap().to_string(), ALPINE_DIGEST);
        assert_eq!(reference.tag(), None);
        assert_eq!(reference.identifier().to_string(), ALPINE_DIGEST);
    }

    #[test]
    fn test_tag_and_digest_prefers_digest() {
        let s = format!("alpine:3.19@{}", ALPINE_DIGEST);
        let reference = ImageReference::parse(&s).unwrap();
        assert_eq!(reference.repository(), "library/alpine");
        assert!(reference.digest().is_some());
    }

    #[test]
    fn test_invalid_references() {
        let cases = [
            "",
            "Alpine:latest",
            "alpine:",
            "alpine:-bad",
            "alpine:3:latest",
            "alpine:has space",
            "ghcr.io//app:v1",
            "alpine@sha256:short",
            "alpine:feature/x",
            "registry.example.com:/app",
            "registry.example.com:5000x/app",
            "[::1/app",
            "[::1]x/app",
        ];

        for case in cases {
            let err = ImageReference::parse(case).unwrap_err();
            assert!(
                matches!(err, CoreError::InvalidReference { .. }),
                "expected invalid reference for {:?}, got {:?}",
                case,
                err
            );
        }
    }

    #[test]
    fn test_malformed_version_is_not_a_registry() {
        let err = ImageReference::with_version("alpine", "feature/x").unwrap_err();
        assert!(err.to_string().contains("non-numeric port"));
    }

    #[test]
    fn test_registry_ports() {
        let reference = ImageReference::parse("[::1]:5000/team/app:v1").unwrap();
        assert_eq!(reference.registry(), "[::1]:5000");
        assert_eq!(reference.repository(), "team/app");

        let reference = ImageReference::parse("[fe80::1]/team/app").unwrap();
        assert_eq!(reference.registry(), "[fe80::1]");

        let reference = ImageReference::parse("registry.example.com:443/team/app").unwrap();
        assert_eq!(reference.registry(), "registry.example.com:443");
    }

    #[test]
    fn test_tag_length_limit() {
        let long = "a".repeat(MAX_TAG_LEN + 1);
        assert!(ImageReference::with_version("alpine", &long).is_err());
        let max = "a".repeat(MAX_TAG_LEN);
        assert!(ImageReference::with_version("alpine", &max).is_ok());
    }
}
