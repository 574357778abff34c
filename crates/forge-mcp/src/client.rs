//! HTTP transport for the Gitea/Forgejo REST API

use std::time::Duration;

use async_trait::async_trait;
use forge_core::{ApiRequest, ApiResponse, ForgeTransport, Method, ServerConfig, TransportError};
use reqwest::Url;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;

use crate::{Error, Result};

/// Applies to the whole request, including reading the body.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`ForgeTransport`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    /// `<base>/api/v1`
    api_root: Url,
    token: Option<String>,
}

impl HttpTransport {
    /// Build a transport for the configured instance.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("forge-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            api_root: api_root(&config.remote_url)?,
            token: config.token.clone(),
        })
    }

    /// Absolute URL for a path below the API root.
    fn endpoint(&self, path: &str) -> std::result::Result<Url, TransportError> {
        let mut url = self.api_root.clone();
        url.path_segments_mut()
            .map_err(|()| {
                TransportError::Network(format!("cannot append path to {}", self.api_root))
            })?
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("api_root", &self.api_root.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// `https://host/prefix/` becomes `https://host/prefix/api/v1`.
fn api_root(base: &Url) -> Result<Url> {
    let mut root = base.clone();
    root.set_query(None);
    root.set_fragment(None);
    root.path_segments_mut()
        .map_err(|()| Error::HttpClient(format!("not a base URL: {base}")))?
        .pop_if_empty()
        .extend(["api", "v1"]);
    Ok(root)
}

/// Empty bodies become `null`; bodies that are not JSON are kept as a string.
fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[async_trait]
impl ForgeTransport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        let url = self.endpoint(&request.path)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
        };

        let mut builder = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            builder = builder.header(AUTHORIZATION, format!("token {token}"));
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        tracing::debug!(status, path = %request.path, "backend response");
        Ok(ApiResponse::new(status, decode_body(&bytes)))
    }
}
