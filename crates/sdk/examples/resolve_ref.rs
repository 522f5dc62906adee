//! Resolve a GitHub ref and the latest release to commit SHAs.
//!
//! Set `GITHUB_TOKEN` to avoid the anonymous rate limit.
//!
//! Run with: cargo run --example resolve_ref -- actions checkout v4

use pinner_sdk::{GithubClient, SdkResult};

#[tokio::main]
async fn main() -> SdkResult<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let owner = args.next().unwrap_or_else(|| "actions".to_string());
    let repo = args.next().unwrap_or_else(|| "checkout".to_string());
    let reference = args.next().unwrap_or_else(|| "main".to_string());

    let client = GithubClient::from_env()?;

    let commit = client.get_commit(&owner, &repo, &reference).await?;
    println!("{}/{}@{} -> {}", owner, repo, reference, commit.sha);

    let latest = client.get_latest_release(&owner, &repo).await?;
    let commit = client.get_commit(&owner, &repo, &latest.tag_name).await?;
    println!("latest release {} -> {}", latest.tag_name, commit.sha);

    Ok(())
}
