//! MCP Server for Gitea and Forgejo
//!
//! Exposes issues, pull requests, and notifications of a Gitea or Forgejo
//! instance through the Model Context Protocol.
//!
//! # Architecture
//!
//! ```text
//! [ MCP Client ]
//!        | (JSON-RPC over stdio)
//!        v
//! [ forge-mcp (server, tool handlers) ]
//!        | resolve target, detect dialect, format output
//!        v
//! [ forge-core ] --> [ forge-git (.git/config, remote URLs) ]
//!        |
//!        v (ForgeTransport)
//! [ HttpTransport ] --> Gitea / Forgejo REST API (/api/v1)
//! ```
//!
//! # Tools
//!
//! Every repository tool takes a `directory` (a local working copy whose
//! remote names the repository) or a `repository` (`owner/repo`). With
//! `debug` enabled two diagnostic tools are added: `resolve_repository` and
//! `server_info`.

pub mod client;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod server;
pub mod tools;

pub use client::HttpTransport;
pub use error::{Error, Result};
pub use handlers::{ToolContext, handle_tool_call};
pub use server::ForgeMcpServer;
pub use tools::{ToolContent, ToolDefinition, ToolResult, get_tool_definitions};
