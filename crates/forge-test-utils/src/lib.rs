//! Shared test utilities for the forge-mcp workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: working copy fixtures, hand-written or created through libgit2
//! - [`transport`]: [`ScriptedTransport`], an in-memory REST backend

pub mod git;
pub mod transport;

pub use git::{WorkingCopy, fake_working_copy, real_working_copy};
pub use transport::ScriptedTransport;
