//! Repository resolution
//!
//! Turns the `directory` / `repository` arguments of a tool call into a
//! [`RepositoryResolution`]. A directory is resolved through its git remotes:
//!
//! ```text
//! directory exists? -> .git directory? -> remotes? -> origin or first -> parse URL
//! ```
//!
//! Every step is local and every failure is final for the call.

use std::path::{Path, PathBuf};

use forge_git::{Remote, RepositoryId, parse_remote_url, read_remotes, validate_working_copy};
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

/// Remote preferred over all others when present.
const PREFERRED_REMOTE: &str = "origin";

/// Outcome of resolving a tool call's target repository.
///
/// Built once per call and never mutated. When built from a remote, the
/// repository is always the parse of `remote_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryResolution {
    directory: Option<PathBuf>,
    repository: RepositoryId,
    remote_url: String,
    remote_name: String,
}

impl RepositoryResolution {
    /// Resolution of a working copy through one of its remotes.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRemoteUrl`] if the remote URL has no owner/repo path.
    pub fn from_remote(directory: PathBuf, remote: Remote) -> Result<Self> {
        let repository = parse_remote_url(&remote.url)?;
        Ok(Self {
            directory: Some(directory),
            repository,
            remote_url: remote.url,
            remote_name: remote.name,
        })
    }

    /// Resolution of an explicit `owner/repo` name. No directory or remote
    /// is involved.
    pub fn from_repository(repository: RepositoryId) -> Self {
        Self {
            directory: None,
            repository,
            remote_url: String::new(),
            remote_name: String::new(),
        }
    }

    /// Absolute path of the resolved working copy, if any.
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn repository(&self) -> &RepositoryId {
        &self.repository
    }

    /// Remote URL exactly as written in the git config; empty for explicit names.
    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    /// Name of the selected remote; empty for explicit names.
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

/// What a tool call asked to operate on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryTarget {
    ByDirectory(PathBuf),
    ByRepository(String),
}

impl RepositoryTarget {
    /// Validate the raw `directory` / `repository` arguments.
    ///
    /// Empty strings and `null` count as absent. When both are supplied the
    /// directory wins, since it reflects the working copy the caller is in,
    /// and the repository argument is ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingTarget`] when neither argument is present
    /// - [`Error::InvalidArgument`] when either is not a string
    pub fn from_arguments(arguments: &Value) -> Result<Self> {
        let directory = string_argument(arguments, "directory")?;
        let repository = string_argument(arguments, "repository")?;

        match (directory, repository) {
            (Some(directory), Some(repository)) => {
                tracing::warn!(
                    directory,
                    repository,
                    "both directory and repository supplied, ignoring repository"
                );
                Ok(Self::ByDirectory(PathBuf::from(directory)))
            }
            (Some(directory), None) => Ok(Self::ByDirectory(PathBuf::from(directory))),
            (None, Some(repository)) => Ok(Self::ByRepository(repository.to_string())),
            (None, None) => Err(Error::MissingTarget),
        }
    }
}

fn string_argument<'a>(arguments: &'a Value, field: &str) -> Result<Option<&'a str>> {
    match arguments.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) if value.trim().is_empty() => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(_) => Err(Error::invalid_argument(field, "expected a string")),
    }
}

/// Resolve whichever target the caller supplied.
pub fn resolve_repository(target: &RepositoryTarget) -> Result<RepositoryResolution> {
    match target {
        RepositoryTarget::ByDirectory(directory) => resolve_directory(directory),
        RepositoryTarget::ByRepository(name) => resolve_repository_name(name),
    }
}

/// Resolve a local working copy to the repository its remote points at.
///
/// # Errors
///
/// In check order: [`Error::DirectoryNotFound`], [`Error::NotGitRepository`],
/// [`Error::NoRemotesConfigured`], [`Error::InvalidRemoteUrl`].
pub fn resolve_directory(directory: &Path) -> Result<RepositoryResolution> {
    let absolute = validate_working_copy(directory)?;
    let remotes = read_remotes(directory)?;

    let remote = select_remote(remotes).ok_or_else(|| Error::NoRemotesConfigured {
        path: directory.to_path_buf(),
    })?;
    tracing::debug!(
        directory = %absolute.display(),
        remote = %remote.name,
        url = %remote.url,
        "selected remote"
    );

    RepositoryResolution::from_remote(absolute, remote)
}

/// Resolve an explicit `owner/repo` string.
///
/// # Errors
///
/// [`Error::InvalidRepositoryName`] unless the value is exactly two
/// non-empty segments separated by `/`.
pub fn resolve_repository_name(name: &str) -> Result<RepositoryResolution> {
    RepositoryId::from_name(name)
        .map(RepositoryResolution::from_repository)
        .ok_or_else(|| Error::InvalidRepositoryName {
            value: name.to_string(),
        })
}

/// Pick `origin` if configured, otherwise the first remote in file order.
pub fn select_remote(remotes: Vec<Remote>) -> Option<Remote> {
    let preferred = remotes
        .iter()
        .position(|remote| remote.name == PREFERRED_REMOTE)
        .unwrap_or(0);
    remotes.into_iter().nth(preferred)
}
