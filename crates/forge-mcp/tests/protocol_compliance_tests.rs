//! MCP Protocol Compliance Integration Tests
//!
//! Tests that the MCP server correctly implements JSON-RPC 2.0 and the MCP
//! tool contract: ID preservation, error codes, error routing between tool
//! results and JSON-RPC errors, and request cancellation.

use std::sync::Arc;
use std::time::Duration;

use forge_core::{DialectSetting, ServerConfig, TransportError};
use forge_mcp::ForgeMcpServer;
use forge_test_utils::ScriptedTransport;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn setup_server(debug: bool) -> (ForgeMcpServer, Arc<ScriptedTransport>) {
    let mut config = ServerConfig::new("https://codeberg.org".parse().unwrap());
    config.dialect = DialectSetting::Forgejo;
    config.debug = debug;
    let transport = Arc::new(ScriptedTransport::new());
    let server = ForgeMcpServer::new(config, transport.clone());
    (server, transport)
}

async fn send(server: &ForgeMcpServer, message: Value) -> Value {
    let response = server.handle_message(&message.to_string()).await.unwrap();
    serde_json::from_str(&response).unwrap()
}

fn tool_call(id: Value, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments},
    })
}

// ==========================================================================
// JSON-RPC 2.0 basics
// ==========================================================================

#[tokio::test]
async fn test_numeric_id_preserved_in_response() {
    let (server, _) = setup_server(false);
    let response = send(
        &server,
        json!({"jsonrpc": "2.0", "id": 42, "method": "initialize", "params": {}}),
    )
    .await;

    assert_eq!(response["id"], 42, "Numeric ID must be echoed back exactly");
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["result"]["serverInfo"]["name"], "forge-mcp");
    assert!(response["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_string_id_preserved_in_error_response() {
    let (server, _) = setup_server(false);
    let response = send(
        &server,
        json!({"jsonrpc": "2.0", "id": "err-test", "method": "nonexistent/method"}),
    )
    .await;

    assert_eq!(response["id"], "err-test");
    assert_eq!(response["error"]["code"], -32601);
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn test_malformed_json_is_parse_error() {
    let (server, _) = setup_server(false);
    let response = server.handle_message("{not json").await.unwrap();
    let response: Value = serde_json::from_str(&response).unwrap();

    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["id"], Value::Null);
}

#[tokio::test]
async fn test_wrong_jsonrpc_version_is_invalid_request() {
    let (server, _) = setup_server(false);
    let response = send(&server, json!({"jsonrpc": "1.0", "id": 1, "method": "ping"})).await;
    assert_eq!(response["error"]["code"], -32600);
}

#[tokio::test]
async fn test_invalid_tool_call_params() {
    let (server, _) = setup_server(false);
    let response = send(
        &server,
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"arguments": {}}}),
    )
    .await;
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn test_ping() {
    let (server, _) = setup_server(false);
    let response = send(&server, json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).await;
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let (server, _) = setup_server(false);
    for method in ["notifications/initialized", "initialized", "notifications/unknown"] {
        let message = json!({"jsonrpc": "2.0", "method": method}).to_string();
        let response = server.handle_message(&message).await.unwrap();
        assert!(response.is_empty(), "{method} must not be answered");
    }
}

// ==========================================================================
// tools/list
// ==========================================================================

fn listed_names(response: &Value) -> Vec<String> {
    response["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_tools_list_hides_debug_tools() {
    let (server, _) = setup_server(false);
    let response = send(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;
    let names = listed_names(&response);

    assert!(names.contains(&"list_issues".to_string()));
    assert!(!names.contains(&"server_info".to_string()));
    assert!(!names.contains(&"resolve_repository".to_string()));
    assert!(response["result"]["tools"][0].get("inputSchema").is_some());
}

#[tokio::test]
async fn test_tools_list_in_debug_mode() {
    let (server, _) = setup_server(true);
    let response = send(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;
    let names = listed_names(&response);

    assert!(names.contains(&"server_info".to_string()));
    assert!(names.contains(&"resolve_repository".to_string()));
}

// ==========================================================================
// tools/call error routing
// ==========================================================================

#[tokio::test]
async fn test_successful_call_has_text_and_structured_content() {
    let (server, transport) = setup_server(false);
    transport.respond_json(
        200,
        json!({"id": 104, "number": 4, "title": "Crash", "state": "open", "user": {"login": "alice"}, "body": ""}),
    );

    let response = send(
        &server,
        tool_call(json!(5), "get_issue", json!({"repository": "acme/widgets", "number": 4})),
    )
    .await;

    let result = &response["result"];
    assert_eq!(result["isError"], false);
    assert_eq!(result["content"][0]["type"], "text");
    assert_eq!(result["content"][0]["text"], "Issue #4 in acme/widgets");
    assert_eq!(result["structuredContent"]["issue"]["user"], "alice");
}

#[tokio::test]
async fn test_resolution_error_is_tool_error() {
    let (server, transport) = setup_server(false);
    let response = send(
        &server,
        tool_call(json!(6), "list_issues", json!({"repository": "not-a-pair"})),
    )
    .await;

    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(
        response["result"]["content"][0]["text"],
        "Invalid repository 'not-a-pair': expected owner/repo"
    );
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_hidden_debug_tool_is_tool_error() {
    let (server, _) = setup_server(false);
    let response = send(&server, tool_call(json!(7), "server_info", json!({}))).await;

    assert_eq!(response["result"]["isError"], true);
    assert_eq!(response["result"]["content"][0]["text"], "unknown tool: server_info");
}

#[tokio::test]
async fn test_backend_client_error_is_tool_error() {
    let (server, transport) = setup_server(false);
    transport.respond_json(403, json!({"message": "token does not have required scope"}));

    let response = send(
        &server,
        tool_call(json!(8), "create_issue", json!({"repository": "acme/widgets", "title": "x"})),
    )
    .await;

    assert_eq!(response["result"]["isError"], true);
}

#[tokio::test]
async fn test_transport_failure_is_jsonrpc_error() {
    let (server, transport) = setup_server(false);
    transport.fail(TransportError::Network("connection refused".into()));

    let response = send(
        &server,
        tool_call(json!(9), "list_issues", json!({"repository": "acme/widgets"})),
    )
    .await;

    assert_eq!(response["id"], 9);
    assert_eq!(response["error"]["code"], -32603);
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn test_backend_server_error_is_jsonrpc_error() {
    let (server, transport) = setup_server(false);
    transport.respond_json(502, json!("Bad Gateway"));

    let response = send(
        &server,
        tool_call(json!(10), "list_pull_requests", json!({"repository": "acme/widgets"})),
    )
    .await;

    assert_eq!(response["error"]["code"], -32603);
    assert_eq!(
        response["error"]["message"],
        "Backend returned HTTP 502: Bad Gateway"
    );
}

// ==========================================================================
// Cancellation
// ==========================================================================

#[tokio::test]
async fn test_cancelled_notification_ends_running_call() {
    let (server, transport) = setup_server(false);
    transport.hang();
    let server = Arc::new(server);

    let running = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let message = tool_call(json!(11), "list_issues", json!({"repository": "acme/widgets"}));
            server.handle_message(&message.to_string()).await.unwrap()
        })
    };

    // Wait until the call is parked on the backend
    while transport.requests().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let cancel = json!({
        "jsonrpc": "2.0",
        "method": "notifications/cancelled",
        "params": {"requestId": 11, "reason": "user aborted"},
    });
    assert!(server.handle_message(&cancel.to_string()).await.unwrap().is_empty());

    let response = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("cancelled call should finish")
        .unwrap();
    let response: Value = serde_json::from_str(&response).unwrap();
    assert_eq!(response["id"], 11);
    assert_eq!(response["error"]["code"], -32603);
    assert_eq!(response["error"]["message"], "Operation cancelled");
}

#[tokio::test]
async fn test_shutdown_cancels_running_calls() {
    let (server, transport) = setup_server(false);
    transport.hang();
    let shutdown = server.shutdown_token();

    let message = tool_call(json!(12), "get_issue", json!({"repository": "acme/widgets", "number": 1}));
    let text = message.to_string();
    let call = server.handle_message(&text);
    let trigger = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
    };

    let (response, ()) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(call, trigger)
    })
    .await
    .expect("shutdown should end the call");

    let response: Value = serde_json::from_str(&response.unwrap()).unwrap();
    assert_eq!(response["error"]["message"], "Operation cancelled");
}

#[tokio::test]
async fn test_cancelling_unknown_request_is_ignored() {
    let (server, _) = setup_server(false);
    let cancel = json!({
        "jsonrpc": "2.0",
        "method": "notifications/cancelled",
        "params": {"requestId": "nope"},
    });
    assert!(server.handle_message(&cancel.to_string()).await.unwrap().is_empty());
}
