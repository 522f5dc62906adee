// GitHub tools: pin action refs and releases to commit SHAs

use super::{json_schema_object, json_schema_string, Arguments, Tool, ToolRegistry};
use crate::error::{RegistryError, ToolError};
use crate::protocol::{CallToolResult, ToolSchema};
use pinner_sdk::SourceHost;
use std::sync::Arc;

/// Upper bound on tags returned by `github_get_versions`.
pub const MAX_LISTED_VERSIONS: usize = 10;

/// Register every GitHub tool against one shared client.
pub fn register_github_tools(
    registry: &mut ToolRegistry,
    host: Arc<dyn SourceHost>,
) -> Result<(), RegistryError> {
    registry.register(Arc::new(ResolveRefToShaTool::new(host.clone())))?;
    registry.register(Arc::new(LatestPinnedVersionTool::new(host.clone())))?;
    registry.register(Arc::new(VersionsTool::new(host)))?;
    Ok(())
}

fn owner_repo_schema() -> serde_json::Value {
    serde_json::json!({
        "owner": json_schema_string("The owner of the repository"),
        "repo": json_schema_string("The name of the repository")
    })
}

async fn resolve_sha(
    host: &dyn SourceHost,
    owner: &str,
    repo: &str,
    reference: &str,
) -> Result<String, ToolError> {
    let commit = host
        .get_commit(owner, repo, reference)
        .await
        .map_err(ToolError::upstream("failed to get commit"))?;
    Ok(commit.sha)
}

/// Resolve a branch, tag or other ref to the commit it points at.
pub struct ResolveRefToShaTool {
    host: Arc<dyn SourceHost>,
}

impl ResolveRefToShaTool {
    pub fn new(host: Arc<dyn SourceHost>) -> Self {
        Self { host }
    }
}

#[async_trait::async_trait]
impl Tool for ResolveRefToShaTool {
    fn schema(&self) -> ToolSchema {
        let mut properties = owner_repo_schema();
        properties["ref"] = json_schema_string("The reference to resolve");

        ToolSchema {
            name: "github_resolve_ref_to_sha".to_string(),
            description: "Resolve a Github reference such as a branch or tag to a commit SHA. \
                          Returns the ref and SHA for pinning GitHub Actions."
                .to_string(),
            input_schema: json_schema_object(properties, vec!["owner", "repo", "ref"]),
        }
    }

    async fn execute(&self, arguments: Arguments) -> Result<CallToolResult, ToolError> {
        let owner = arguments.required_str("owner")?;
        let repo = arguments.required_str("repo")?;
        let reference = arguments.required_str("ref")?;

        let sha = resolve_sha(self.host.as_ref(), owner, repo, reference).await?;
        tracing::debug!(%owner, %repo, %reference, %sha, "Resolved ref");

        Ok(CallToolResult::text(format!("{} {}", reference, sha)))
    }
}

/// Latest published release together with the commit its tag points at.
pub struct LatestPinnedVersionTool {
    host: Arc<dyn SourceHost>,
}

impl LatestPinnedVersionTool {
    pub fn new(host: Arc<dyn SourceHost>) -> Self {
        Self { host }
    }
}

#[async_trait::async_trait]
impl Tool for LatestPinnedVersionTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "github_get_latest_pinned_version".to_string(),
            description: "Get the latest pinned version and its tag for a given repository. \
                          Used to update pinned GitHub Actions"
                .to_string(),
            input_schema: json_schema_object(owner_repo_schema(), vec!["owner", "repo"]),
        }
    }

    async fn execute(&self, arguments: Arguments) -> Result<CallToolResult, ToolError> {
        let owner = arguments.required_str("owner")?;
        let repo = arguments.required_str("repo")?;

        let release = self
            .host
            .get_latest_release(owner, repo)
            .await
            .map_err(ToolError::upstream("failed to get latest release"))?;

        if !release.has_tag() {
            return Err(ToolError::Upstream {
                context: "failed to get latest release",
                source: pinner_sdk::SdkError::InvalidResponse(format!(
                    "latest release of {}/{} has no tag",
                    owner, repo
                )),
            });
        }

        let sha = resolve_sha(self.host.as_ref(), owner, repo, &release.tag_name).await?;
        tracing::debug!(%owner, %repo, tag = %release.tag_name, %sha, "Resolved latest release");

        Ok(CallToolResult::text(format!("{} {}", release.tag_name, sha)))
    }
}

/// Most recent release tags, newest first.
pub struct VersionsTool {
    host: Arc<dyn SourceHost>,
}

impl VersionsTool {
    pub fn new(host: Arc<dyn SourceHost>) -> Self {
        Self { host }
    }
}

#[async_trait::async_trait]
impl Tool for VersionsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "github_get_versions".to_string(),
            description: "List the latest versions (releases) for a given repository. \
                          Used to check available updates for GitHub Actions"
                .to_string(),
            input_schema: json_schema_object(owner_repo_schema(), vec!["owner", "repo"]),
        }
    }

    async fn execute(&self, arguments: Arguments) -> Result<CallToolResult, ToolError> {
        let owner = arguments.required_str("owner")?;
        let repo = arguments.required_str("repo")?;

        let releases = self
            .host
            .list_releases(owner, repo)
            .await
            .map_err(ToolError::upstream("failed to list releases"))?;

        let tags: Vec<&str> = releases
            .iter()
            .filter(|r| r.has_tag())
            .take(MAX_LISTED_VERSIONS)
            .map(|r| r.tag_name.as_str())
            .collect();

        Ok(CallToolResult::text(tags.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinner_core::{Commit, Release};
    use pinner_sdk::{SdkError, SdkResult};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockHost {
        commits: HashMap<String, String>,
        latest: Option<Release>,
        releases: Vec<Release>,
        calls: AtomicUsize,
    }

    impl MockHost {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl SourceHost for MockHost {
        async fn get_commit(&self, _owner: &str, _repo: &str, reference: &str) -> SdkResult<Commit> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.commits
                .get(reference)
                .map(|sha| Commit {
                    sha: sha.clone(),
                    html_url: None,
                })
                .ok_or_else(|| SdkError::NotFound(format!("No commit found for SHA: {}", reference)))
        }

        async fn get_latest_release(&self, _owner: &str, _repo: &str) -> SdkResult<Release> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.latest
                .clone()
                .ok_or_else(|| SdkError::NotFound("Not Found".to_string()))
        }

        async fn list_releases(&self, _owner: &str, _repo: &str) -> SdkResult<Vec<Release>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.releases.clone())
        }
    }

    fn release(tag: &str) -> Release {
        Release {
            tag_name: tag.to_string(),
            name: None,
            prerelease: false,
            draft: false,
            published_at: None,
        }
    }

    fn args(value: serde_json::Value) -> Arguments {
        Arguments::from_value(Some(value)).unwrap()
    }

    const SHA: &str = "11bd71901bbe5b1630ceea73d27597364c9af683";

    #[tokio::test]
    async fn test_resolve_ref_to_sha() {
        let host = Arc::new(MockHost {
            commits: HashMap::from([("v4".to_string(), SHA.to_string())]),
            ..Default::default()
        });
        let tool = ResolveRefToShaTool::new(host.clone());

        let result = tool
            .execute(args(json!({ "owner": "actions", "repo": "checkout", "ref": "v4" })))
            .await
            .unwrap();

        assert_eq!(result.text_content(), format!("v4 {}", SHA));
        assert_eq!(host.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_ref_is_idempotent() {
        let host = Arc::new(MockHost {
            commits: HashMap::from([("main".to_string(), SHA.to_string())]),
            ..Default::default()
        });
        let tool = ResolveRefToShaTool::new(host);
        let input = json!({ "owner": "actions", "repo": "checkout", "ref": "main" });

        let first = tool.execute(args(input.clone())).await.unwrap();
        let second = tool.execute(args(input)).await.unwrap();
        assert_eq!(first.text_content(), second.text_content());
    }

    #[tokio::test]
    async fn test_resolve_ref_unknown() {
        let tool = ResolveRefToShaTool::new(Arc::new(MockHost::default()));

        let err = tool
            .execute(args(json!({ "owner": "actions", "repo": "checkout", "ref": "nope" })))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("failed to get commit: "));
        assert!(message.contains("nope"));
    }

    #[tokio::test]
    async fn test_missing_arguments_never_call_upstream() {
        let host = Arc::new(MockHost::default());
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(ResolveRefToShaTool::new(host.clone())),
            Box::new(LatestPinnedVersionTool::new(host.clone())),
            Box::new(VersionsTool::new(host.clone())),
        ];

        for tool in &tools {
            let err = tool.execute(args(json!({ "owner": "actions" }))).await.unwrap_err();
            assert!(matches!(err, ToolError::MissingArgument("repo")));
        }

        let err = tools[0]
            .execute(args(json!({ "owner": "actions", "repo": "checkout" })))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingArgument("ref")));

        assert_eq!(host.calls(), 0);
    }

    #[tokio::test]
    async fn test_latest_pinned_version() {
        let host = Arc::new(MockHost {
            commits: HashMap::from([("v4.2.2".to_string(), SHA.to_string())]),
            latest: Some(release("v4.2.2")),
            ..Default::default()
        });
        let tool = LatestPinnedVersionTool::new(host.clone());

        let result = tool
            .execute(args(json!({ "owner": "actions", "repo": "checkout" })))
            .await
            .unwrap();

        assert_eq!(result.text_content(), format!("v4.2.2 {}", SHA));
        assert_eq!(host.calls(), 2);
    }

    #[tokio::test]
    async fn test_latest_pinned_version_without_releases() {
        let tool = LatestPinnedVersionTool::new(Arc::new(MockHost::default()));

        let err = tool
            .execute(args(json!({ "owner": "octo", "repo": "empty" })))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to get latest release: "));
    }

    #[tokio::test]
    async fn test_latest_pinned_version_tag_not_resolvable() {
        let tool = LatestPinnedVersionTool::new(Arc::new(MockHost {
            latest: Some(release("v9")),
            ..Default::default()
        }));

        let err = tool
            .execute(args(json!({ "owner": "octo", "repo": "app" })))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to get commit: "));
    }

    #[tokio::test]
    async fn test_latest_pinned_version_empty_tag() {
        let host = Arc::new(MockHost {
            latest: Some(release("")),
            ..Default::default()
        });
        let tool = LatestPinnedVersionTool::new(host.clone());

        let err = tool
            .execute(args(json!({ "owner": "octo", "repo": "app" })))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("has no tag"));
        assert_eq!(host.calls(), 1);
    }

    #[tokio::test]
    async fn test_versions_capped_at_ten() {
        let releases = (0..15).rev().map(|i| release(&format!("v1.{}.0", i))).collect();
        let tool = VersionsTool::new(Arc::new(MockHost {
            releases,
            ..Default::default()
        }));

        let result = tool
            .execute(args(json!({ "owner": "actions", "repo": "checkout" })))
            .await
            .unwrap();

        let text = result.text_content();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), MAX_LISTED_VERSIONS);
        assert_eq!(lines[0], "v1.14.0");
        assert_eq!(lines[9], "v1.5.0");
    }

    #[tokio::test]
    async fn test_versions_skip_empty_tags() {
        let mut releases = vec![release(""), release("v3"), release("")];
        releases.extend((0..12).map(|i| release(&format!("v2.{}", i))));
        let tool = VersionsTool::new(Arc::new(MockHost {
            releases,
            ..Default::default()
        }));

        let result = tool
            .execute(args(json!({ "owner": "o", "repo": "r" })))
            .await
            .unwrap();

        let text = result.text_content();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "v3");
        assert_eq!(lines[1], "v2.0");
        assert!(lines.iter().all(|l| !l.is_empty()));
    }

    #[tokio::test]
    async fn test_versions_no_releases() {
        let tool = VersionsTool::new(Arc::new(MockHost::default()));

        let result = tool
            .execute(args(json!({ "owner": "o", "repo": "r" })))
            .await
            .unwrap();
        assert_eq!(result.text_content(), "");
        assert!(result.is_error.is_none());
    }

    #[test]
    fn test_register_github_tools() {
        let mut registry = ToolRegistry::new();
        register_github_tools(&mut registry, Arc::new(MockHost::default())).unwrap();

        assert_eq!(registry.len(), 3);
        assert!(registry.contains("github_resolve_ref_to_sha"));
        assert!(registry.contains("github_get_latest_pinned_version"));
        assert!(registry.contains("github_get_versions"));

        let schema = registry.get("github_resolve_ref_to_sha").unwrap().schema();
        assert_eq!(schema.input_schema["required"], json!(["owner", "repo", "ref"]));
    }
}
