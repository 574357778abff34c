//! Working copy fixtures at two realism levels.
//!
//! Prefer [`fake_working_copy`] unless the test is about compatibility with
//! config files written by git itself.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// A temporary directory laid out as a git working copy.
pub struct WorkingCopy {
    temp_dir: TempDir,
}

impl WorkingCopy {
    /// Root of the working copy.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Replace `.git/config` with `text`.
    pub fn write_config(&self, text: &str) {
        fs::write(self.root().join(".git/config"), text)
            .unwrap_or_else(|e| panic!("WorkingCopy::write_config: {e}"));
    }
}

/// Creates a `.git` directory with a hand-written `config` file.
///
/// Realism level: **FAKE**: no object store, just enough for remote
/// discovery.
///
/// # Panics
/// Panics if the filesystem operations fail.
pub fn fake_working_copy(config: &str) -> WorkingCopy {
    let temp_dir = TempDir::new().unwrap_or_else(|e| panic!("fake_working_copy: {e}"));
    fs::create_dir(temp_dir.path().join(".git"))
        .unwrap_or_else(|e| panic!("fake_working_copy: failed to create .git: {e}"));
    fs::write(temp_dir.path().join(".git/HEAD"), "ref: refs/heads/main\n")
        .unwrap_or_else(|e| panic!("fake_working_copy: failed to write HEAD: {e}"));

    let copy = WorkingCopy { temp_dir };
    copy.write_config(config);
    copy
}

/// Initialises a real repository with `git2` and adds `remotes` in order.
///
/// Realism level: **REAL**: the config file is written by libgit2, so its
/// formatting matches what users have on disk.
///
/// # Panics
/// Panics if any libgit2 operation fails.
pub fn real_working_copy(remotes: &[(&str, &str)]) -> WorkingCopy {
    let temp_dir = TempDir::new().unwrap_or_else(|e| panic!("real_working_copy: {e}"));
    let repo = git2::Repository::init(temp_dir.path()).unwrap_or_else(|e| {
        panic!(
            "real_working_copy: failed to init repository at {}: {e}",
            temp_dir.path().display()
        )
    });
    for (name, url) in remotes {
        repo.remote(name, url)
            .unwrap_or_else(|e| panic!("real_working_copy: failed to add remote {name}: {e}"));
    }
    WorkingCopy { temp_dir }
}
