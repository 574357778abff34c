//! Tool handler tests against a scripted backend
//!
//! Each test drives `handle_tool_call` directly and checks both the requests
//! that reach the backend and the payload handed back to the client.

use forge_core::{
    ApiRequest, CancellationToken, DialectSetting, Method, ServerConfig, TransportError,
};
use forge_mcp::{Error, ToolContext, handle_tool_call};
use forge_test_utils::{ScriptedTransport, fake_working_copy};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};

fn config(dialect: DialectSetting) -> ServerConfig {
    let mut config = ServerConfig::new("https://codeberg.org".parse().unwrap());
    config.dialect = dialect;
    config
}

async fn call(
    config: &ServerConfig,
    transport: &ScriptedTransport,
    tool: &str,
    arguments: Value,
) -> Result<forge_core::ToolOutput, Error> {
    let ctx = ToolContext::new(config, transport, CancellationToken::new());
    handle_tool_call(&ctx, tool, arguments).await
}

fn issue(number: u64, title: &str, login: &str) -> Value {
    json!({
        "id": 100 + number,
        "number": number,
        "title": title,
        "state": "open",
        "user": {"id": 1, "login": login, "full_name": "Someone"},
        "body": "Steps to reproduce",
        "labels": [],
        "comments": 0,
    })
}

// ==========================================================================
// Target resolution
// ==========================================================================

#[tokio::test]
async fn test_list_issues_by_repository_name() {
    let transport = ScriptedTransport::new();
    transport.respond_json(200, json!([issue(1, "Crash", "alice"), issue(2, "Typo", "bob")]));

    let output = call(
        &config(DialectSetting::Gitea),
        &transport,
        "list_issues",
        json!({"repository": "acme/widgets", "state": "open", "page": 2, "limit": 10}),
    )
    .await
    .unwrap();

    assert_eq!(
        transport.requests(),
        vec![
            ApiRequest::get("/repos/acme/widgets/issues")
                .query("type", "issues")
                .query("state", "open")
                .query("page", 2)
                .query("limit", 10)
        ]
    );
    assert_eq!(output.text, "2 issues in acme/widgets");
    assert_eq!(output.structured["repository"], "acme/widgets");
    assert_eq!(output.structured["issues"][0]["user"], "alice");
    assert_eq!(output.structured["issues"][1]["number"], 2);
}

#[tokio::test]
async fn test_directory_resolves_through_origin() {
    let copy = fake_working_copy(
        "[remote \"upstream\"]\n\turl = https://codeberg.org/other/widgets.git\n\
         [remote \"origin\"]\n\turl = git@codeberg.org:acme/widgets.git\n",
    );
    let transport = ScriptedTransport::new();
    transport.respond_json(200, issue(4, "Crash", "alice"));

    let output = call(
        &config(DialectSetting::Forgejo),
        &transport,
        "get_issue",
        json!({"directory": copy.root(), "number": 4}),
    )
    .await
    .unwrap();

    assert_eq!(
        transport.requests(),
        vec![ApiRequest::get("/repos/acme/widgets/issues/4")]
    );
    assert_eq!(output.structured["repository"], "acme/widgets");
}

#[tokio::test]
async fn test_directory_takes_precedence_over_repository() {
    let copy = fake_working_copy("[remote \"origin\"]\n\turl = https://codeberg.org/acme/widgets\n");
    let transport = ScriptedTransport::new();
    transport.respond_json(200, json!([]));

    call(
        &config(DialectSetting::Gitea),
        &transport,
        "list_pull_requests",
        json!({"directory": copy.root(), "repository": "someone/else"}),
    )
    .await
    .unwrap();

    assert_eq!(transport.requests()[0].path, "/repos/acme/widgets/pulls");
}

#[tokio::test]
async fn test_missing_target_is_client_error_without_requests() {
    let transport = ScriptedTransport::new();
    let err = call(
        &config(DialectSetting::Auto),
        &transport,
        "list_issues",
        json!({}),
    )
    .await
    .unwrap_err();

    assert!(err.is_client_error());
    assert_eq!(
        err.to_string(),
        "at least one of directory or repository must be provided"
    );
    assert!(transport.requests().is_empty(), "no probe before resolution");
}

#[tokio::test]
async fn test_directory_without_git_is_client_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let transport = ScriptedTransport::new();
    let err = call(
        &config(DialectSetting::Auto),
        &transport,
        "list_issues",
        json!({"directory": dir.path()}),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        Error::Core(forge_core::Error::NotGitRepository { .. })
    ));
    assert!(err.is_client_error());
    assert!(transport.requests().is_empty());
}

// ==========================================================================
// Argument validation
// ==========================================================================

#[rstest]
#[case("get_issue", json!({"repository": "acme/widgets"}), "number")]
#[case("get_issue", json!({"repository": "acme/widgets", "number": 0}), "number")]
#[case("create_issue", json!({"repository": "acme/widgets", "title": "  "}), "title")]
#[case("create_issue_comment", json!({"repository": "acme/widgets", "number": 3}), "body")]
#[case("edit_issue_comment", json!({"repository": "acme/widgets", "body": "x"}), "comment_id")]
#[case("create_pull_request", json!({"repository": "acme/widgets", "title": "t", "base": "main"}), "head")]
#[case("edit_issue", json!({"repository": "acme/widgets", "number": 3}), "title")]
#[case("list_issues", json!({"repository": "acme/widgets", "page": 0}), "page")]
#[case("mark_notification_read", json!({}), "id")]
#[tokio::test]
async fn test_invalid_arguments_name_the_field(
    #[case] tool: &str,
    #[case] arguments: Value,
    #[case] expected_field: &str,
) {
    let transport = ScriptedTransport::new();
    let err = call(&config(DialectSetting::Gitea), &transport, tool, arguments)
        .await
        .unwrap_err();

    match err {
        Error::Core(forge_core::Error::InvalidArgument { field, .. }) => {
            assert_eq!(field, expected_field)
        }
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_unknown_state_is_rejected() {
    let transport = ScriptedTransport::new();
    let err = call(
        &config(DialectSetting::Gitea),
        &transport,
        "list_issues",
        json!({"repository": "acme/widgets", "state": "merged"}),
    )
    .await
    .unwrap_err();
    assert!(err.is_client_error());
}

// ==========================================================================
// Dialect detection
// ==========================================================================

#[tokio::test]
async fn test_auto_dialect_probes_once_per_call() {
    let transport = ScriptedTransport::new();
    transport
        .respond_json(200, json!({"version": "9.0.0+gitea-1.22.0"}))
        .respond_json(200, json!([]));

    call(
        &config(DialectSetting::Auto),
        &transport,
        "list_issue_comments",
        json!({"repository": "acme/widgets", "number": 4}),
    )
    .await
    .unwrap();

    assert_eq!(
        transport.requests(),
        vec![
            ApiRequest::get("/version"),
            ApiRequest::get("/repos/acme/widgets/issues/4/comments"),
        ]
    );
}

#[tokio::test]
async fn test_failed_probe_still_completes_the_call() {
    let transport = ScriptedTransport::new();
    transport
        .fail(TransportError::Network("connection refused".into()))
        .respond_json(200, json!([]));

    let output = call(
        &config(DialectSetting::Auto),
        &transport,
        "list_pull_requests",
        json!({"repository": "acme/widgets"}),
    )
    .await
    .unwrap();

    assert_eq!(output.text, "0 pull requests in acme/widgets");
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_gitea_dialect_reads_legacy_username() {
    let comment = json!({"id": 7, "user": {"username": "carol"}, "body": "LGTM"});
    let arguments = json!({"repository": "acme/widgets", "number": 4});

    let gitea = ScriptedTransport::new();
    gitea.respond_json(200, json!([comment.clone()]));
    let output = call(&config(DialectSetting::Gitea), &gitea, "list_issue_comments", arguments.clone())
        .await
        .unwrap();
    assert_eq!(output.structured["comments"][0]["user"], "carol");

    let forgejo = ScriptedTransport::new();
    forgejo.respond_json(200, json!([comment]));
    let output = call(&config(DialectSetting::Forgejo), &forgejo, "list_issue_comments", arguments)
        .await
        .unwrap();
    assert_eq!(output.structured["comments"][0]["user"], Value::Null);
}

// ==========================================================================
// Response modes
// ==========================================================================

#[tokio::test]
async fn test_compat_mode_changes_text_not_payload() {
    let comments = json!([
        {"id": 11, "user": {"login": "alice"}, "body": "Looks good", "created_at": "2024-01-01T00:00:00Z"},
        {"id": 12, "user": {"login": "bob"}, "body": "Needs\na test", "created_at": "2024-01-02T00:00:00Z"},
    ]);
    let arguments = json!({"repository": "acme/widgets", "number": 4});

    let terse_transport = ScriptedTransport::new();
    terse_transport.respond_json(200, comments.clone());
    let terse = call(
        &config(DialectSetting::Gitea),
        &terse_transport,
        "list_issue_comments",
        arguments.clone(),
    )
    .await
    .unwrap();

    let mut compat = config(DialectSetting::Gitea);
    compat.compat = true;
    let verbose_transport = ScriptedTransport::new();
    verbose_transport.respond_json(200, comments);
    let verbose = call(&compat, &verbose_transport, "list_issue_comments", arguments)
        .await
        .unwrap();

    assert_eq!(terse.structured, verbose.structured);
    assert_eq!(terse.text, "2 comments on issue acme/widgets#4");
    assert_eq!(
        verbose.text,
        "2 comments on issue acme/widgets#4\n- id:11 @alice Looks good\n- id:12 @bob Needs a test"
    );
}

// ==========================================================================
// Writes
// ==========================================================================

#[tokio::test]
async fn test_create_pull_request_body() {
    let transport = ScriptedTransport::new();
    transport.respond_json(
        201,
        json!({
            "id": 900, "number": 12, "title": "Add widget", "state": "open",
            "user": {"login": "alice"}, "body": "",
            "head": {"ref": "feature/widget"}, "base": {"ref": "main"}, "merged": false,
        }),
    );

    let output = call(
        &config(DialectSetting::Forgejo),
        &transport,
        "create_pull_request",
        json!({"repository": "acme/widgets", "title": "Add widget", "head": "feature/widget", "base": "main"}),
    )
    .await
    .unwrap();

    assert_eq!(
        transport.requests(),
        vec![ApiRequest::post(
            "/repos/acme/widgets/pulls",
            json!({"title": "Add widget", "head": "feature/widget", "base": "main", "body": ""}),
        )]
    );
    assert_eq!(
        output.text,
        "Created pull request #12 in acme/widgets (feature/widget -> main)"
    );
    assert_eq!(output.structured["pull_request"]["head"], "feature/widget");
}

#[tokio::test]
async fn test_edit_issue_sends_only_changed_fields() {
    let transport = ScriptedTransport::new();
    transport.respond_json(201, issue(3, "Crash", "alice"));

    call(
        &config(DialectSetting::Gitea),
        &transport,
        "edit_issue",
        json!({"repository": "acme/widgets", "number": 3, "state": "closed"}),
    )
    .await
    .unwrap();

    assert_eq!(
        transport.requests(),
        vec![ApiRequest::patch(
            "/repos/acme/widgets/issues/3",
            json!({"state": "closed"})
        )]
    );
}

#[tokio::test]
async fn test_edit_issue_comment_path() {
    let transport = ScriptedTransport::new();
    transport.respond_json(200, json!({"id": 55, "user": {"login": "alice"}, "body": "fixed"}));

    let output = call(
        &config(DialectSetting::Gitea),
        &transport,
        "edit_issue_comment",
        json!({"repository": "acme/widgets", "comment_id": 55, "body": "fixed"}),
    )
    .await
    .unwrap();

    assert_eq!(transport.requests()[0].path, "/repos/acme/widgets/issues/comments/55");
    assert_eq!(transport.requests()[0].method, Method::Patch);
    assert_eq!(output.text, "Updated comment 55 in acme/widgets");
}

// ==========================================================================
// Backend errors
// ==========================================================================

#[tokio::test]
async fn test_backend_not_found_is_client_error() {
    let transport = ScriptedTransport::new();
    transport.respond_json(404, json!({"message": "issue does not exist"}));

    let err = call(
        &config(DialectSetting::Gitea),
        &transport,
        "get_issue",
        json!({"repository": "acme/widgets", "number": 99}),
    )
    .await
    .unwrap_err();

    assert!(err.is_client_error());
    assert!(err.to_string().contains("issue does not exist"));
}

#[tokio::test]
async fn test_network_failure_is_not_client_error() {
    let transport = ScriptedTransport::new();
    transport.fail(TransportError::Network("connection reset".into()));

    let err = call(
        &config(DialectSetting::Gitea),
        &transport,
        "list_issues",
        json!({"repository": "acme/widgets"}),
    )
    .await
    .unwrap_err();

    assert!(!err.is_client_error());
}

#[tokio::test]
async fn test_cancelled_call_stops_waiting_on_backend() {
    let transport = ScriptedTransport::new();
    transport.hang();
    let config = config(DialectSetting::Gitea);
    let cancel = CancellationToken::new();
    let ctx = ToolContext::new(&config, &transport, cancel.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();
    });

    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        handle_tool_call(&ctx, "list_issues", json!({"repository": "acme/widgets"})),
    )
    .await
    .expect("cancellation should end the call");
    canceller.await.unwrap();

    let err = outcome.unwrap_err();
    assert!(matches!(err, Error::Core(forge_core::Error::Cancelled)));
    assert!(!err.is_client_error());
}

// ==========================================================================
// Notifications
// ==========================================================================

#[tokio::test]
async fn test_notifications_without_target_list_inbox() {
    let transport = ScriptedTransport::new();
    transport.respond_json(
        200,
        json!([{
            "id": 5,
            "unread": true,
            "subject": {"title": "Crash on start", "type": "Issue"},
            "repository": {"full_name": "acme/widgets"},
        }]),
    );

    let output = call(
        &config(DialectSetting::Auto),
        &transport,
        "list_notifications",
        json!({"all": true}),
    )
    .await
    .unwrap();

    assert_eq!(
        transport.requests(),
        vec![ApiRequest::get("/notifications").query("all", true)]
    );
    assert_eq!(output.text, "1 notification");
    assert_eq!(
        output.structured["notifications"][0],
        json!({
            "id": 5,
            "title": "Crash on start",
            "subject": "Issue",
            "unread": true,
            "repository": "acme/widgets",
        })
    );
}

#[tokio::test]
async fn test_notifications_for_repository() {
    let transport = ScriptedTransport::new();
    transport.respond_json(200, json!([]));

    let output = call(
        &config(DialectSetting::Auto),
        &transport,
        "list_notifications",
        json!({"repository": "acme/widgets"}),
    )
    .await
    .unwrap();

    assert_eq!(
        transport.requests(),
        vec![ApiRequest::get("/repos/acme/widgets/notifications")]
    );
    assert_eq!(output.text, "0 notifications for acme/widgets");
}

#[tokio::test]
async fn test_mark_notification_read() {
    let transport = ScriptedTransport::new();
    transport.respond_json(205, Value::Null);

    let output = call(
        &config(DialectSetting::Gitea),
        &transport,
        "mark_notification_read",
        json!({"id": 5}),
    )
    .await
    .unwrap();

    assert_eq!(
        transport.requests(),
        vec![ApiRequest::new(Method::Patch, "/notifications/threads/5").query("to-status", "read")]
    );
    assert_eq!(output.text, "Marked notification 5 as read");
}

// ==========================================================================
// Diagnostic tools
// ==========================================================================

#[rstest]
#[case("resolve_repository")]
#[case("server_info")]
#[tokio::test]
async fn test_debug_tools_unknown_outside_debug_mode(#[case] tool: &str) {
    let transport = ScriptedTransport::new();
    let err = call(
        &config(DialectSetting::Auto),
        &transport,
        tool,
        json!({"repository": "acme/widgets"}),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::UnknownTool(ref name) if name == tool));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_resolve_repository_reports_remote() {
    let copy = fake_working_copy("[remote \"origin\"]\n\turl = ssh://git@codeberg.org/acme/widgets.git\n");
    let mut config = config(DialectSetting::Auto);
    config.debug = true;
    let transport = ScriptedTransport::new();

    let output = call(&config, &transport, "resolve_repository", json!({"directory": copy.root()}))
        .await
        .unwrap();

    assert_eq!(output.text, "Resolved acme/widgets via remote origin");
    let resolution = &output.structured["resolution"];
    assert_eq!(resolution["repository"], "acme/widgets");
    assert_eq!(resolution["remote_name"], "origin");
    assert_eq!(resolution["remote_url"], "ssh://git@codeberg.org/acme/widgets.git");
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_server_info_with_auto_dialect_probes_once() {
    let mut config = config(DialectSetting::Auto);
    config.debug = true;
    let transport = ScriptedTransport::new();
    transport.respond_json(200, json!({"version": "1.22.3"}));

    let output = call(&config, &transport, "server_info", Value::Null)
        .await
        .unwrap();

    assert_eq!(transport.requests(), vec![ApiRequest::get("/version")]);
    assert_eq!(output.text, "gitea backend, version 1.22.3");
    assert_eq!(output.structured["dialect_setting"], "auto");
    assert_eq!(output.structured["detected_dialect"], "gitea");
}

#[tokio::test]
async fn test_server_info_with_explicit_dialect() {
    let mut config = config(DialectSetting::Gitea);
    config.debug = true;
    let transport = ScriptedTransport::new();
    transport.respond_json(200, json!({"version": "9.0.0+gitea-1.22.0"}));

    let output = call(&config, &transport, "server_info", json!({}))
        .await
        .unwrap();

    assert_eq!(transport.requests(), vec![ApiRequest::get("/version")]);
    // The configured dialect is used even when the backend looks different
    assert_eq!(output.structured["dialect"], "gitea");
    assert_eq!(output.structured["detected_dialect"], "forgejo");
    assert_eq!(output.structured["version"], "9.0.0+gitea-1.22.0");
}

#[tokio::test]
async fn test_unknown_tool() {
    let transport = ScriptedTransport::new();
    let err = call(&config(DialectSetting::Auto), &transport, "delete_everything", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownTool(_)));
}
