//! REST transport seam
//!
//! Tool handlers describe requests as [`ApiRequest`] values and hand them to
//! a [`ForgeTransport`]. The production transport lives in `forge-mcp`; tests
//! use a scripted one.

use async_trait::async_trait;
use serde_json::Value;

use crate::{Error, Result};

/// HTTP verbs used against the hosting API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request against the API root (`<base>/api/v1`).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the API root, starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    /// A request without query or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, path).body(body)
    }

    /// Attach a JSON body.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append a query parameter when `value` is present.
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }
}

/// Status code and decoded body of a backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Return the body of a 2xx response, or an [`Error::Backend`].
    pub fn into_result(self) -> Result<Value> {
        if self.is_success() {
            return Ok(self.body);
        }

        let message = match &self.body {
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string(),
            Value::String(text) if !text.is_empty() => text.clone(),
            _ => "request failed".to_string(),
        };
        Err(Error::Backend {
            status: self.status,
            message,
        })
    }
}

/// Failures below the HTTP status level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("could not decode response: {0}")]
    Decode(String),
}

/// Something that can deliver an [`ApiRequest`] to the hosting backend.
#[async_trait]
pub trait ForgeTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> std::result::Result<ApiResponse, TransportError>;
}
