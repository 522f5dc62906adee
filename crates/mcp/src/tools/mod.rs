mod args;
pub mod docker;
pub mod github;
mod registry;

pub use crate::error::{RegistryError, ToolError};
pub use args::Arguments;
pub use docker::{register_docker_tools, ImageVersionsTool, ResolveImageToDigestTool};
pub use github::{
    register_github_tools, LatestPinnedVersionTool, ResolveRefToShaTool, VersionsTool,
};
pub use registry::{json_schema_object, json_schema_string, Tool, ToolRegistry};
