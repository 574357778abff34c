//! Backend dialect selection
//!
//! Gitea and Forgejo share one REST API with small differences in response
//! shapes. The dialect is either fixed by configuration or detected with a
//! single probe of the version endpoint at the start of a call.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::transport::{ApiRequest, ForgeTransport, TransportError};
use crate::{Error, Result};

/// Forgejo reports the Gitea release it is compatible with as build metadata,
/// e.g. `7.0.0+gitea-1.22.0`.
static FORGEJO_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?\+gitea-\d+\.\d+\.\d+")
        .expect("Invalid forgejo version regex")
});

static SEMVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?$")
        .expect("Invalid semver regex")
});

/// Configured dialect, as written by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialectSetting {
    Gitea,
    Forgejo,
    #[default]
    Auto,
}

impl DialectSetting {
    /// Accepted spellings, in the order they are reported in errors.
    pub const ALLOWED: [&'static str; 3] = ["gitea", "forgejo", "auto"];
}

impl FromStr for DialectSetting {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gitea" => Ok(Self::Gitea),
            "forgejo" => Ok(Self::Forgejo),
            "auto" | "" => Ok(Self::Auto),
            _ => Err(Error::InvalidDialectConfig {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for DialectSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gitea => write!(f, "gitea"),
            Self::Forgejo => write!(f, "forgejo"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

/// The dialect spoken for the remainder of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Gitea,
    Forgejo,
}

impl Dialect {
    /// Used when an `auto` probe fails or is inconclusive. Gitea's API is
    /// the subset both backends implement.
    pub const FALLBACK: Dialect = Dialect::Gitea;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gitea => "gitea",
            Self::Forgejo => "forgejo",
        }
    }

    /// Login name of a user object in an API response.
    ///
    /// Older Gitea releases expose `username` alongside (or instead of)
    /// `login`; Forgejo always sends `login`.
    pub fn user_login<'a>(&self, user: &'a Value) -> Option<&'a str> {
        let login = user.get("login").and_then(Value::as_str);
        match self {
            Self::Forgejo => login,
            Self::Gitea => login.or_else(|| user.get("username").and_then(Value::as_str)),
        }
        .filter(|name| !name.is_empty())
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of the `/version` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VersionInfo {
    pub version: String,
}

/// Fetches the backend's version information.
#[async_trait]
pub trait VersionProbe: Send + Sync {
    async fn version(&self) -> Result<VersionInfo>;
}

/// Probe the version endpoint through a [`ForgeTransport`].
pub struct TransportProbe<'a, T: ?Sized>(pub &'a T);

#[async_trait]
impl<T> VersionProbe for TransportProbe<'_, T>
where
    T: ForgeTransport + ?Sized,
{
    async fn version(&self) -> Result<VersionInfo> {
        let body = self.0.send(ApiRequest::get("/version")).await?.into_result()?;
        serde_json::from_value(body)
            .map_err(|e| Error::Transport(TransportError::Decode(e.to_string())))
    }
}

/// Classify a version response; `None` when it matches neither backend.
pub fn classify_version(info: &VersionInfo) -> Option<Dialect> {
    let version = info.version.trim();

    if version.to_lowercase().contains("forgejo") || FORGEJO_VERSION.is_match(version) {
        Some(Dialect::Forgejo)
    } else if SEMVER.is_match(version) {
        Some(Dialect::Gitea)
    } else {
        None
    }
}

/// Decide which dialect to speak for one call.
///
/// Explicit settings are returned as-is without probing. `auto` probes
/// exactly once; a failed or unrecognised probe falls back to
/// [`Dialect::FALLBACK`].
///
/// # Errors
///
/// Only [`Error::Cancelled`], when `cancel` fires before the probe returns.
pub async fn detect_dialect<P>(
    setting: DialectSetting,
    probe: &P,
    cancel: &CancellationToken,
) -> Result<Dialect>
where
    P: VersionProbe + ?Sized,
{
    match setting {
        DialectSetting::Gitea => return Ok(Dialect::Gitea),
        DialectSetting::Forgejo => return Ok(Dialect::Forgejo),
        DialectSetting::Auto => {}
    }

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        outcome = probe.version() => outcome,
    };

    match outcome {
        Ok(info) => match classify_version(&info) {
            Some(dialect) => {
                tracing::debug!(version = %info.version, %dialect, "detected backend dialect");
                Ok(dialect)
            }
            None => {
                tracing::warn!(
                    version = %info.version,
                    fallback = %Dialect::FALLBACK,
                    "unrecognised backend version, using fallback dialect"
                );
                Ok(Dialect::FALLBACK)
            }
        },
        Err(Error::Cancelled) => Err(Error::Cancelled),
        Err(e) => {
            tracing::warn!(
                error = %e,
                fallback = %Dialect::FALLBACK,
                "version probe failed, using fallback dialect"
            );
            Ok(Dialect::FALLBACK)
        }
    }
}
