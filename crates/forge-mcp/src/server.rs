//! MCP Server implementation
//!
//! Reads newline-delimited JSON-RPC messages from stdin and writes responses
//! to stdout. Every message is handled on its own task so a slow backend
//! call never blocks `ping` or `notifications/cancelled`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use forge_core::{CancellationToken, ForgeTransport, ServerConfig};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::handlers::{ToolContext, handle_tool_call};
use crate::protocol::{
    CancelledParams, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, InitializeResult,
    JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
    ServerCapabilities, ServerInfo, ToolCallParams, ToolsCapability,
};
use crate::tools::{ToolDefinition, ToolResult, get_tool_definitions};
use crate::{Error, Result};

/// MCP Server for Gitea and Forgejo
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use forge_mcp::{ForgeMcpServer, HttpTransport};
///
/// let transport = Arc::new(HttpTransport::new(&config)?);
/// ForgeMcpServer::new(config, transport).run().await?;
/// ```
pub struct ForgeMcpServer {
    config: ServerConfig,
    transport: Arc<dyn ForgeTransport>,
    tools: Vec<ToolDefinition>,
    /// Parent of every per-call token; cancelled when stdin closes
    shutdown: CancellationToken,
    /// Tokens of running `tools/call` requests, keyed by request id
    in_flight: Mutex<HashMap<String, CancellationToken>>,
}

impl ForgeMcpServer {
    pub fn new(config: ServerConfig, transport: Arc<dyn ForgeTransport>) -> Self {
        let tools = get_tool_definitions(config.debug);
        Self {
            config,
            transport,
            tools,
            shutdown: CancellationToken::new(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Run the MCP server until stdin closes.
    pub async fn run(self) -> Result<()> {
        let server = Arc::new(self);
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(line) = rx.recv().await {
                stdout.write_all(line.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            Ok::<(), std::io::Error>(())
        });

        tracing::info!(
            url = %server.config.remote_url,
            dialect = %server.config.dialect,
            compat = server.config.compat,
            debug = server.config.debug,
            "MCP server ready, listening on stdio"
        );

        let mut tasks = JoinSet::new();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            tracing::debug!(request = %line, "Received message");

            let server = Arc::clone(&server);
            let tx = tx.clone();
            spawn_reaping(&mut tasks, async move {
                let response = match server.handle_message(&line).await {
                    Ok(response) => response,
                    Err(e) => error_line(None, INTERNAL_ERROR, format!("Internal error: {e}")),
                };
                if !response.is_empty() && tx.send(response).is_err() {
                    tracing::debug!("stdout closed, dropping response");
                }
            });
        }

        tracing::info!("stdin closed, shutting down");
        server.shutdown.cancel();
        while tasks.join_next().await.is_some() {}

        drop(tx);
        writer.await.map_err(|e| Error::Io(std::io::Error::other(e)))??;
        Ok(())
    }

    /// Handle a single MCP message
    ///
    /// Returns the serialized response, or an empty string for notifications.
    pub async fn handle_message(&self, message: &str) -> Result<String> {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(request) => request,
            Err(e) => return Ok(error_line(None, PARSE_ERROR, format!("Parse error: {e}"))),
        };

        if request.jsonrpc != "2.0" {
            return Ok(error_line(
                request.id,
                INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id)?,
            "initialized" | "notifications/initialized" => return Ok(String::new()),
            "notifications/cancelled" => {
                self.handle_cancelled(request.params);
                return Ok(String::new());
            }
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params).await?,
            // Unknown notifications are ignored
            _ if request.id.is_none() => return Ok(String::new()),
            _ => JsonRpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        };

        serde_json::to_string(&response).map_err(Error::from)
    }

    fn handle_initialize(&self, id: Option<Value>) -> Result<JsonRpcResponse> {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: ServerInfo {
                name: "forge-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        Ok(JsonRpcResponse::success(id, serde_json::to_value(result)?))
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "tools": self.tools }))
    }

    /// Client and validation failures come back as an error-flagged tool
    /// result; transport failures and cancellation fail the request.
    async fn handle_tools_call(&self, id: Option<Value>, params: Value) -> Result<JsonRpcResponse> {
        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return Ok(JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid params: {e}"),
                ));
            }
        };

        let cancel = self.shutdown.child_token();
        let key = id.as_ref().map(Value::to_string);
        if let (Some(key), Ok(mut in_flight)) = (&key, self.in_flight.lock()) {
            in_flight.insert(key.clone(), cancel.clone());
        }

        let ctx = ToolContext::new(&self.config, self.transport.as_ref(), cancel);
        let outcome = handle_tool_call(&ctx, &params.name, params.arguments).await;

        if let (Some(key), Ok(mut in_flight)) = (&key, self.in_flight.lock()) {
            in_flight.remove(key);
        }

        let response = match outcome {
            Ok(output) => {
                JsonRpcResponse::success(id, serde_json::to_value(ToolResult::output(output))?)
            }
            Err(e) if e.is_client_error() => {
                tracing::debug!(tool = %params.name, error = %e, "tool call rejected");
                let result = ToolResult::error(e.to_string());
                JsonRpcResponse::success(id, serde_json::to_value(result)?)
            }
            Err(e) => {
                tracing::warn!(tool = %params.name, error = %e, "tool call failed");
                JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string())
            }
        };
        Ok(response)
    }

    fn handle_cancelled(&self, params: Value) {
        let params: CancelledParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed cancellation");
                return;
            }
        };

        let token = self
            .in_flight
            .lock()
            .ok()
            .and_then(|in_flight| in_flight.get(&params.request_id.to_string()).cloned());
        match token {
            Some(token) => {
                tracing::debug!(
                    request_id = %params.request_id,
                    reason = ?params.reason,
                    "cancelling request"
                );
                token.cancel();
            }
            None => {
                tracing::debug!(request_id = %params.request_id, "no running request to cancel")
            }
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Tools advertised by `tools/list`
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Cancels every running call when triggered.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

/// Spawn `task` after collecting every task that has already finished, so
/// the set only holds messages still being handled.
fn spawn_reaping<F>(tasks: &mut JoinSet<()>, task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    while let Some(finished) = tasks.try_join_next() {
        if let Err(e) = finished {
            tracing::warn!(error = %e, "message task failed");
        }
    }
    tasks.spawn(task);
}

fn error_line(id: Option<Value>, code: i32, message: String) -> String {
    let response = JsonRpcResponse::error(id, code, message);
    serde_json::to_string(&response).unwrap_or_else(|_| {
        format!(r#"{{"jsonrpc":"2.0","error":{{"code":{code},"message":"internal error"}}}}"#)
    })
}
