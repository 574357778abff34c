//! Error types for forge-core

use std::path::PathBuf;

use crate::transport::TransportError;

/// Result type for forge-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, configuring, or talking to a backend.
///
/// Handlers match on the variant, never on the message text.
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

    #[error("Invalid repository '{value}': expected owner/repo")]
    InvalidRepositoryName { value: String },

    #[error("at least one of directory or repository must be provided")]
    MissingTarget,

    #[error("Invalid argument '{field}': {message}")]
    InvalidArgument { field: String, message: String },

    #[error("Invalid dialect '{value}': expected one of gitea, forgejo, auto")]
    InvalidDialectConfig { value: String },

    #[error("Missing required configuration: {key}")]
    MissingConfig { key: String },

    #[error("Invalid configuration for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Failed to read config file {path}: {message}")]
    ConfigRead { path: PathBuf, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Backend returned HTTP {status}: {message}")]
    Backend { status: u16, message: String },
}

impl Error {
    /// Build an [`Error::InvalidArgument`] for `field`.
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the failure was caused by the caller's input.
    ///
    /// Client errors are reported as an error-flagged tool result; the rest
    /// fail the call itself.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::DirectoryNotFound { .. }
            | Self::NotGitRepository { .. }
            | Self::NoRemotesConfigured { .. }
            | Self::InvalidRemoteUrl { .. }
            | Self::InvalidRepositoryName { .. }
            | Self::MissingTarget
            | Self::InvalidArgument { .. } => true,
            Self::Backend { status, .. } => (400..500).contains(status),
            Self::InvalidDialectConfig { .. }
            | Self::MissingConfig { .. }
            | Self::InvalidConfig { .. }
            | Self::ConfigRead { .. }
            | Self::Cancelled
            | Self::Transport(_) => false,
        }
    }
}

impl From<forge_git::Error> for Error {
    fn from(err: forge_git::Error) -> Self {
        match err {
            forge_git::Error::DirectoryNotFound { path } => Self::DirectoryNotFound { path },
            forge_git::Error::NotGitRepository { path } => Self::NotGitRepository { path },
            forge_git::Error::NoRemotesConfigured { path } => Self::NoRemotesConfigured { path },
            forge_git::Error::InvalidRemoteUrl { url } => Self::InvalidRemoteUrl { url },
        }
    }
}
