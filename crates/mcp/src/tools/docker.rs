// Container image tools: list tags and pin a tag to its manifest digest

use super::{json_schema_object, json_schema_string, Arguments, Tool, ToolRegistry};
use crate::error::{RegistryError, ToolError};
use crate::protocol::{CallToolResult, ToolSchema};
use pinner_core::ImageReference;
use pinner_sdk::ContainerRegistry;
use std::sync::Arc;

/// Upper bound on tags returned by `docker_get_image_versions`.
pub const MAX_LISTED_TAGS: usize = 100;

/// Register every container image tool against one shared client.
pub fn register_docker_tools(
    registry: &mut ToolRegistry,
    client: Arc<dyn ContainerRegistry>,
) -> Result<(), RegistryError> {
    registry.register(Arc::new(ResolveImageToDigestTool::new(client.clone())))?;
    registry.register(Arc::new(ImageVersionsTool::new(client)))?;
    Ok(())
}

/// Resolve `<image>:<version>` to the digest of the manifest it points at.
pub struct ResolveImageToDigestTool {
    client: Arc<dyn ContainerRegistry>,
}

impl ResolveImageToDigestTool {
    pub fn new(client: Arc<dyn ContainerRegistry>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Tool for ResolveImageToDigestTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "docker_resolve_image_to_digest".to_string(),
            description: "Resolve a container image version to a digest for pinning to \
                          immutable images. Use to resolve base images in Dockerfile."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "image": json_schema_string("The image to resolve"),
                    "version": json_schema_string("The version of the image to resolve")
                }),
                vec!["image", "version"],
            ),
        }
    }

    async fn execute(&self, arguments: Arguments) -> Result<CallToolResult, ToolError> {
        let image = arguments.required_str("image")?;
        let version = arguments.required_str("version")?;

        let reference = ImageReference::with_version(image, version).map_err(|source| {
            ToolError::InvalidReference {
                context: "failed to parse image name",
                source,
            }
        })?;

        let descriptor = self
            .client
            .get_descriptor(&reference)
            .await
            .map_err(ToolError::upstream("failed to fetch image digest"))?;

        tracing::debug!(%reference, digest = %descriptor.digest, "Resolved image");
        Ok(CallToolResult::text(descriptor.digest.to_string()))
    }
}

/// Tags of an image, newest first.
pub struct ImageVersionsTool {
    client: Arc<dyn ContainerRegistry>,
}

impl ImageVersionsTool {
    pub fn new(client: Arc<dyn ContainerRegistry>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Tool for ImageVersionsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "docker_get_image_versions".to_string(),
            description: "List the latest versions of a container image for updating base \
                          images in Dockerfile"
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "image": json_schema_string("The image to resolve")
                }),
                vec!["image"],
            ),
        }
    }

    async fn execute(&self, arguments: Arguments) -> Result<CallToolResult, ToolError> {
        let image = arguments.required_str("image")?;

        let reference =
            ImageReference::parse(image).map_err(|source| ToolError::InvalidReference {
                context: "failed to list available versions",
                source,
            })?;

        let mut tags = self
            .client
            .list_tags(&reference)
            .await
            .map_err(ToolError::upstream("failed to list available versions"))?;

        // Registries list tags oldest first
        tags.reverse();
        tags.truncate(MAX_LISTED_TAGS);

        tracing::debug!(%reference, count = tags.len(), "Listed image tags");
        Ok(CallToolResult::text(tags.join("\n")))
    }
}
