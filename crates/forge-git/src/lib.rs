//! Git working copy inspection for forge-mcp
//!
//! Turns a local working copy into the canonical `owner/repo` name of the
//! repository it tracks, without shelling out to `git` or linking libgit2:
//!
//! - [`validate`] checks that a directory is the root of a working copy
//! - [`config`] reads the remotes recorded in `.git/config`
//! - [`remote_url`] decomposes a remote URL into a [`RepositoryId`]

pub mod config;
pub mod error;
pub mod id;
pub mod remote_url;
pub mod validate;

pub use config::{Remote, parse_remotes, read_remotes};
pub use error::{Error, Result};
pub use id::RepositoryId;
pub use remote_url::parse_remote_url;
pub use validate::{GIT_DIR, validate_working_copy};
