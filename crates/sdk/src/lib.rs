//! # pinner SDK
//!
//! Clients for the upstream services used to pin dependencies: the GitHub REST API
//! (refs and releases to commit SHAs) and OCI registries (tags to manifest digests).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pinner_sdk::{GithubClient, RegistryClient, RegistryConfig, SdkResult};
//! use pinner_core::ImageReference;
//!
//! #[tokio::main]
//! async fn main() -> SdkResult<()> {
//!     let github = GithubClient::from_env()?;
//!     let commit = github.get_commit("actions", "checkout", "v4").await?;
//!     println!("actions/checkout@v4 is {}", commit.sha);
//!
//!     let registry = RegistryClient::new(RegistryConfig::default())?;
//!     let reference = ImageReference::with_version("alpine", "3.19.7")?;
//!     let descriptor = registry.get_descriptor(&reference).await?;
//!     println!("{} is {}", reference, descriptor.digest);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod github;
pub mod registry;
pub mod transport;

pub use api::{ContainerRegistry, SourceHost};
pub use config::{GithubConfig, RegistryConfig, DEFAULT_GITHUB_API_URL};
pub use error::{SdkError, SdkResult};
pub use github::{GithubClient, GithubClientBuilder};
pub use registry::{Credential, Keychain, RegistryClient};
