use pinner_core::Digest;
use pinner_mcp::server::McpServer;
use pinner_mcp::tools::{register_docker_tools, register_github_tools, ToolRegistry};
use pinner_sdk::{GithubClient, RegistryClient, RegistryConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHA: &str = "11bd71901bbe5b1630ceea73d27597364c9af683";

struct Harness {
    server: McpServer,
    upstream: MockServer,
    _keychain: TempDir,
}

impl Harness {
    /// GitHub API and registry both served by one mock server.
    async fn start() -> Self {
        let upstream = MockServer::start().await;
        let keychain = TempDir::new().unwrap();

        let github = GithubClient::builder()
            .base_url(upstream.uri())
            .token("test-token")
            .build()
            .unwrap();
        let registry_client = RegistryClient::new(RegistryConfig {
            docker_config_dir: Some(keychain.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();

        let mut registry = ToolRegistry::new();
        register_github_tools(&mut registry, Arc::new(github)).unwrap();
        register_docker_tools(&mut registry, Arc::new(registry_client)).unwrap();

        Self {
            server: McpServer::new(registry),
            upstream,
            _keychain: keychain,
        }
    }

    fn registry_host(&self) -> String {
        self.upstream.uri().trim_start_matches("http://").to_string()
    }

    async fn call(&self, name: &str, arguments: Value) -> Value {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        });
        let response = self
            .server
            .handle_message(&request.to_string())
            .await
            .unwrap();
        serde_json::to_value(response).unwrap()["result"].clone()
    }
}

fn text(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap()
}

#[tokio::test]
async fn test_lists_all_five_tools() {
    let harness = Harness::start().await;
    let response = harness
        .server
        .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
        .await
        .unwrap();

    let value = serde_json::to_value(response).unwrap();
    let names: Vec<&str> = value["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "docker_get_image_versions",
            "docker_resolve_image_to_digest",
            "github_get_latest_pinned_version",
            "github_get_versions",
            "github_resolve_ref_to_sha",
        ]
    );
}

#[tokio::test]
async fn test_resolve_ref_to_sha() {
    let harness = Harness::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/actions/checkout/commits/v4"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sha": SHA })))
        .mount(&harness.upstream)
        .await;

    let result = harness
        .call(
            "github_resolve_ref_to_sha",
            json!({ "owner": "actions", "repo": "checkout", "ref": "v4" }),
        )
        .await;
    assert_eq!(text(&result), format!("v4 {}", SHA));
}

#[tokio::test]
async fn test_latest_pinned_version() {
    let harness = Harness::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/actions/setup-go/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tag_name": "v5.4.0",
            "prerelease": false,
            "draft": false
        })))
        .mount(&harness.upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/actions/setup-go/commits/v5.4.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sha": SHA })))
        .mount(&harness.upstream)
        .await;

    let result = harness
        .call(
            "github_get_latest_pinned_version",
            json!({ "owner": "actions", "repo": "setup-go" }),
        )
        .await;
    assert_eq!(text(&result), format!("v5.4.0 {}", SHA));
}

#[tokio::test]
async fn test_get_versions() {
    let harness = Harness::start().await;
    let releases: Vec<Value> = (0..30)
        .rev()
        .map(|i| json!({ "tag_name": format!("v1.{}.0", i) }))
        .collect();

    Mock::given(method("GET"))
        .and(path("/repos/actions/cache/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(releases))
        .mount(&harness.upstream)
        .await;

    let result = harness
        .call("github_get_versions", json!({ "owner": "actions", "repo": "cache" }))
        .await;
    let lines: Vec<&str> = text(&result).lines().collect();
    assert_eq!(lines.len(), 10);
    assert_eq!(lines[0], "v1.29.0");
}

#[tokio::test]
async fn test_github_not_found_is_tool_error() {
    let harness = Harness::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/actions/checkout/commits/does-not-exist"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "No commit found for SHA: does-not-exist"
        })))
        .mount(&harness.upstream)
        .await;

    let result = harness
        .call(
            "github_resolve_ref_to_sha",
            json!({ "owner": "actions", "repo": "checkout", "ref": "does-not-exist" }),
        )
        .await;
    assert_eq!(result["isError"], true);
    assert!(text(&result).starts_with("failed to get commit: "));
    assert!(text(&result).contains("No commit found for SHA"));
}

#[tokio::test]
async fn test_image_versions_and_digest() {
    let harness = Harness::start().await;
    let image = format!("{}/team/base", harness.registry_host());

    Mock::given(method("GET"))
        .and(path("/v2/team/base/tags/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "team/base",
            "tags": ["1.0", "1.1", "2.0"]
        })))
        .mount(&harness.upstream)
        .await;

    let body = br#"{"schemaVersion":2,"mediaType":"application/vnd.oci.image.index.v1+json","manifests":[]}"#;
    let digest = Digest::sha256_of(body);
    Mock::given(method("GET"))
        .and(path("/v2/team/base/manifests/2.0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("docker-content-digest", digest.to_string().as_str())
                .set_body_raw(body.to_vec(), "application/vnd.oci.image.index.v1+json"),
        )
        .mount(&harness.upstream)
        .await;

    let result = harness
        .call("docker_get_image_versions", json!({ "image": image }))
        .await;
    assert_eq!(text(&result), "2.0\n1.1\n1.0");

    let result = harness
        .call(
            "docker_resolve_image_to_digest",
            json!({ "image": image, "version": "2.0" }),
        )
        .await;
    assert_eq!(text(&result), digest.to_string());
}

#[tokio::test]
async fn test_missing_argument_reaches_no_upstream() {
    let harness = Harness::start().await;

    let result = harness
        .call("docker_resolve_image_to_digest", json!({ "version": "3.19" }))
        .await;
    assert_eq!(result["isError"], true);
    assert_eq!(text(&result), "image is required and must be a string");

    let requests = harness.upstream.received_requests().await.unwrap();
    assert!(requests.is_empty());
}
