// MCP (Model Context Protocol) server exposing pinning tools to agent clients
// over stdio: GitHub refs to commit SHAs, container image tags to digests.

pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod tools;

pub use config::ServerConfig;
pub use error::{RegistryError, ServerError, ToolError};
pub use server::McpServer;
