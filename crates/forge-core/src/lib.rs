//! Core layer for forge-mcp
//!
//! Everything a tool handler needs between receiving raw arguments and
//! issuing a REST call against a Gitea or Forgejo backend:
//!
//! - **Resolution**: turn a `directory` or `repository` argument into a
//!   validated [`RepositoryResolution`]
//! - **Dialect detection**: pick the backend dialect from configuration or a
//!   single version probe
//! - **Formatting**: render a structured payload as terse or verbose text
//! - **Configuration**: the explicit [`ServerConfig`] value passed to all of
//!   the above
//!
//! # Architecture
//!
//! ```text
//!          forge-mcp (tool handlers)
//!                    |
//!               forge-core
//!                    |
//!               forge-git
//! ```
//!
//! Nothing here keeps state between calls. Each resolution and each probe
//! is computed fresh.

pub mod config;
pub mod dialect;
pub mod error;
pub mod format;
pub mod resolve;
pub mod transport;

pub use config::{ConfigLayer, ServerConfig};
pub use dialect::{
    Dialect, DialectSetting, TransportProbe, VersionInfo, VersionProbe, classify_version,
    detect_dialect,
};
pub use error::{Error, Result};
pub use format::{ToolOutput, format_result, format_tool_output};
pub use forge_git::RepositoryId;
pub use resolve::{
    RepositoryResolution, RepositoryTarget, resolve_directory, resolve_repository,
    resolve_repository_name, select_remote,
};
pub use transport::{ApiRequest, ApiResponse, ForgeTransport, Method, TransportError};
pub use tokio_util::sync::CancellationToken;
