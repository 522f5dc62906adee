//! Error types for the MCP host and its tool providers.

use pinner_core::CoreError;
use pinner_sdk::SdkError;
use thiserror::Error;

/// Failure of a single tool invocation.
///
/// Reported to the client as a `CallToolResult` with `isError` set, never as a
/// JSON-RPC error.
#[derive(Error, Debug)]
pub enum ToolError {
    /// A required argument was absent or not a string.
    #[error("{0} is required and must be a string")]
    MissingArgument(&'static str),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// An upstream API call failed.
    #[error("{context}: {source}")]
    Upstream {
        context: &'static str,
        #[source]
        source: SdkError,
    },

    /// Caller input could not be parsed as an image reference.
    #[error("{context}: {source}")]
    InvalidReference {
        context: &'static str,
        #[source]
        source: CoreError,
    },

    #[error("request cancelled")]
    Cancelled,
}

impl ToolError {
    pub(crate) fn upstream(context: &'static str) -> impl FnOnce(SdkError) -> Self {
        move |source| Self::Upstream { context, source }
    }
}

/// Failure while assembling the tool set at startup.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(String),
}

/// Fatal failure of the stdio transport.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("response writer stopped unexpectedly")]
    WriterClosed,

    #[error("response writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
