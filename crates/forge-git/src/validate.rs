//! Working copy validation

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Name of git's metadata directory at the root of a working copy.
pub const GIT_DIR: &str = ".git";

/// Check that `dir` is the root of a git working copy.
///
/// Returns the absolute form of `dir` on success.
///
/// # Errors
///
/// - [`Error::DirectoryNotFound`] if `dir` is missing or not a directory
/// - [`Error::NotGitRepository`] if `dir/.git` is missing or is not a
///   directory (linked worktrees and submodules use a `.git` file, which is
///   not accepted)
pub fn validate_working_copy(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(Error::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    if !dir.join(GIT_DIR).is_dir() {
        return Err(Error::NotGitRepository {
            path: dir.to_path_buf(),
        });
    }

    Ok(absolutize(dir))
}

fn absolutize(dir: &Path) -> PathBuf {
    dunce::canonicalize(dir)
        .or_else(|_| std::path::absolute(dir))
        .unwrap_or_else(|_| dir.to_path_buf())
}
