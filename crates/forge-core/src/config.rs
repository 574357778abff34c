//! Server configuration
//!
//! Configuration arrives in layers (command line and environment, then an
//! optional TOML file) and is validated once at startup into a
//! [`ServerConfig`]. The validated value is passed explicitly to every call;
//! nothing is read from global state afterwards.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::dialect::DialectSetting;
use crate::{Error, Result};

/// One layer of unvalidated settings.
///
/// Also the schema of the TOML config file:
///
/// ```toml
/// url = "https://codeberg.org"
/// token = "..."
/// dialect = "auto"   # gitea | forgejo | auto
/// compat = false     # verbose text output
/// debug = false      # expose diagnostic tools
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub url: Option<String>,
    pub token: Option<String>,
    pub dialect: Option<String>,
    pub compat: Option<bool>,
    pub debug: Option<bool>,
}

impl ConfigLayer {
    /// Parse a layer from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::InvalidConfig {
            key: "config file".into(),
            message: e.to_string(),
        })
    }

    /// Load a layer from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content).map_err(|e| match e {
            Error::InvalidConfig { message, .. } => Error::ConfigRead {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Fill every unset field from `fallback`.
    pub fn or(self, fallback: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            url: self.url.or(fallback.url),
            token: self.token.or(fallback.token),
            dialect: self.dialect.or(fallback.dialect),
            compat: self.compat.or(fallback.compat),
            debug: self.debug.or(fallback.debug),
        }
    }
}

/// Validated configuration for the server and every call it handles.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Base URL of the Gitea/Forgejo instance
    pub remote_url: Url,
    pub token: Option<String>,
    pub dialect: DialectSetting,
    /// Verbose ("compat") text output
    pub compat: bool,
    /// Expose diagnostic-only tools
    pub debug: bool,
}

impl ServerConfig {
    /// Configuration with defaults for everything but the URL.
    pub fn new(remote_url: Url) -> Self {
        Self {
            remote_url,
            token: None,
            dialect: DialectSetting::default(),
            compat: false,
            debug: false,
        }
    }

    /// Validate a merged layer.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingConfig`] without a URL
    /// - [`Error::InvalidConfig`] for a URL that does not parse or is not http(s)
    /// - [`Error::InvalidDialectConfig`] for a dialect outside gitea/forgejo/auto
    pub fn from_layer(layer: ConfigLayer) -> Result<Self> {
        let raw_url = layer
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| Error::MissingConfig { key: "url".into() })?;

        let remote_url = Url::parse(raw_url.trim()).map_err(|e| Error::InvalidConfig {
            key: "url".into(),
            message: e.to_string(),
        })?;
        if !matches!(remote_url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig {
                key: "url".into(),
                message: format!("unsupported scheme '{}'", remote_url.scheme()),
            });
        }

        let dialect = layer
            .dialect
            .as_deref()
            .map(str::parse::<DialectSetting>)
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            remote_url,
            token: layer.token.filter(|token| !token.trim().is_empty()),
            dialect,
            compat: layer.compat.unwrap_or(false),
            debug: layer.debug.unwrap_or(false),
        })
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("remote_url", &self.remote_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("dialect", &self.dialect)
            .field("compat", &self.compat)
            .field("debug", &self.debug)
            .finish()
    }
}
