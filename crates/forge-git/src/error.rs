//! Error types for forge-git

use std::path::PathBuf;

/// Result type for forge-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while inspecting a working copy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Not a git repository (no .git directory): {path}")]
    NotGitRepository { path: PathBuf },

    #[error("No remotes configured in git repository: {path}")]
    NoRemotesConfigured { path: PathBuf },

    #[error("Invalid remote URL '{url}': expected an owner/repo path")]
    InvalidRemoteUrl { url: String },
}
