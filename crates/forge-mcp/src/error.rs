//! Error types for the MCP server

use thiserror::Error;

/// Result type alias for MCP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during MCP server operations
#[derive(Debug, Error)]
pub enum Error {
    /// Resolution, configuration, or backend error from forge-core
    #[error(transparent)]
    Core(#[from] forge_core::Error),

    /// Error during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error on the stdio transport
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown tool requested
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl Error {
    /// Whether the failure is the caller's fault.
    ///
    /// Client errors become an error-flagged tool result; everything else
    /// fails the JSON-RPC call.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Core(err) => err.is_client_error(),
            Self::UnknownTool(_) => true,
            Self::Json(_) | Self::Io(_) | Self::HttpClient(_) => false,
        }
    }
}
