//! Remote URL decomposition
//!
//! Accepts the URL shapes git itself accepts for network remotes:
//!
//! - `https://host[:port]/owner/repo[.git]` (and any other `scheme://`)
//! - `ssh://user@host[:port]/owner/repo[.git]`
//! - `user@host:owner/repo[.git]` (scp-like shorthand)
//!
//! The last two non-empty path segments name the owner and the repository.

use crate::{Error, RepositoryId, Result};

/// Parse a git remote URL into its canonical `owner/repo` identifier.
///
/// Pure string processing: never touches the network and never panics.
///
/// # Errors
///
/// Returns [`Error::InvalidRemoteUrl`] carrying the original string when the
/// URL has no path, fewer than two non-empty path segments, or a repository
/// segment that is empty once `.git` is stripped.
pub fn parse_remote_url(url: &str) -> Result<RepositoryId> {
    let invalid = || Error::InvalidRemoteUrl {
        url: url.to_string(),
    };

    let path = remote_path(url.trim()).ok_or_else(invalid)?;
    let path = path.split(['?', '#']).next().unwrap_or(path);

    let mut segments = path.split('/').filter(|segment| !segment.is_empty()).rev();
    let (Some(repo), Some(owner)) = (segments.next(), segments.next()) else {
        return Err(invalid());
    };

    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    RepositoryId::new(owner, repo).ok_or_else(invalid)
}

/// Extract the path component, dropping scheme, user info, host and port.
fn remote_path(url: &str) -> Option<&str> {
    if url.is_empty() {
        return None;
    }

    if let Some((_, rest)) = url.split_once("://") {
        // A '/' inside the query or fragment does not start a path
        let rest = rest.split(['?', '#']).next().unwrap_or(rest);
        let path_start = rest.find('/')?;
        return Some(&rest[path_start..]);
    }

    // scp-like syntax: everything after the first ':' is the path
    let (host, path) = url.split_once(':')?;
    if host.is_empty() || host.contains('/') {
        return None;
    }
    Some(path)
}
