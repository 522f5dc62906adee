//! Resolve a container image tag to its manifest digest.
//!
//! Run with: cargo run --example resolve_digest -- alpine 3.19.7

use pinner_core::ImageReference;
use pinner_sdk::{RegistryClient, RegistryConfig, SdkResult};

#[tokio::main]
async fn main() -> SdkResult<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let image = args.next().unwrap_or_else(|| "alpine".to_string());
    let version = args.next().unwrap_or_else(|| "latest".to_string());

    let client = RegistryClient::new(RegistryConfig::default())?;
    let reference = ImageReference::with_version(&image, &version)?;

    let descriptor = client.get_descriptor(&reference).await?;
    println!("{}@{}", reference, descriptor.digest);
    println!("  media type: {}", descriptor.media_type);
    println!("  size: {} bytes", descriptor.size);

    Ok(())
}
