//! Upstream services the tool providers talk to.
//!
//! The clients in this crate implement these traits; tests substitute their own.

use crate::error::SdkResult;
use pinner_core::{Commit, Descriptor, ImageReference, Release};

/// A source-control hosting API (GitHub).
#[async_trait::async_trait]
pub trait SourceHost: Send + Sync {
    /// Resolve `reference` (branch, tag or SHA) in `owner/repo` to a commit.
    async fn get_commit(&self, owner: &str, repo: &str, reference: &str) -> SdkResult<Commit>;

    /// Latest published, non-prerelease, non-draft release.
    async fn get_latest_release(&self, owner: &str, repo: &str) -> SdkResult<Release>;

    /// Releases in upstream order (most recent first).
    async fn list_releases(&self, owner: &str, repo: &str) -> SdkResult<Vec<Release>>;
}

/// A container registry speaking the OCI distribution API.
#[async_trait::async_trait]
pub trait ContainerRegistry: Send + Sync {
    /// All tags of the reference's repository, in upstream order.
    async fn list_tags(&self, reference: &ImageReference) -> SdkResult<Vec<String>>;

    /// Descriptor of the manifest the reference currently points at.
    async fn get_descriptor(&self, reference: &ImageReference) -> SdkResult<Descriptor>;
}
