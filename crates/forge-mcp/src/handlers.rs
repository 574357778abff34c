//! MCP Tool Handlers
//!
//! Each repository handler follows the same sequence:
//!
//! ```text
//! parse arguments -> resolve target -> detect dialect -> REST call -> shape payload
//! ```
//!
//! Handlers return the structured payload; [`handle_tool_call`] renders it
//! in the configured response mode.

use std::sync::Mutex;

use async_trait::async_trait;
use forge_core::{
    ApiRequest, CancellationToken, Dialect, DialectSetting, ForgeTransport, Method,
    RepositoryResolution, RepositoryTarget, ServerConfig, ToolOutput, TransportError,
    TransportProbe, VersionInfo, VersionProbe, classify_version, detect_dialect,
    format_tool_output, resolve_repository,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::tools::DEBUG_TOOLS;
use crate::{Error, Result};

type CoreError = forge_core::Error;

/// Everything a single tool call runs against.
pub struct ToolContext<'a> {
    pub config: &'a ServerConfig,
    pub transport: &'a dyn ForgeTransport,
    /// Cancelled when the client cancels this call or the server shuts down
    pub cancel: CancellationToken,
}

impl<'a> ToolContext<'a> {
    pub fn new(
        config: &'a ServerConfig,
        transport: &'a dyn ForgeTransport,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            transport,
            cancel,
        }
    }

    /// Send a request, giving up as soon as the call is cancelled.
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        tracing::debug!(method = %request.method, path = %request.path, "backend request");
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(CoreError::Cancelled.into()),
            response = self.transport.send(request) => response.map_err(CoreError::from)?,
        };
        Ok(response.into_result()?)
    }

    async fn dialect(&self) -> Result<Dialect> {
        let probe = TransportProbe(self.transport);
        Ok(detect_dialect(self.config.dialect, &probe, &self.cancel).await?)
    }

    /// Resolve the call's target and settle the dialect for the rest of it.
    async fn repository_call(&self, arguments: &Value) -> Result<RepositoryCall> {
        let target = RepositoryTarget::from_arguments(arguments)?;
        let resolution = resolve_repository(&target)?;
        let dialect = self.dialect().await?;
        Ok(RepositoryCall {
            resolution,
            dialect,
        })
    }
}

/// A resolved repository plus the dialect spoken for the call.
struct RepositoryCall {
    resolution: RepositoryResolution,
    dialect: Dialect,
}

impl RepositoryCall {
    fn name(&self) -> String {
        self.resolution.repository().to_string()
    }

    /// API path below `/repos/{owner}/{repo}`.
    fn path(&self, suffix: &str) -> String {
        let repository = self.resolution.repository();
        format!("/repos/{}/{}{}", repository.owner(), repository.name(), suffix)
    }
}

/// Handle a tool call by dispatching to the appropriate handler
pub async fn handle_tool_call(
    ctx: &ToolContext<'_>,
    tool_name: &str,
    arguments: Value,
) -> Result<ToolOutput> {
    if DEBUG_TOOLS.contains(&tool_name) && !ctx.config.debug {
        return Err(Error::UnknownTool(tool_name.to_string()));
    }

    let payload = match tool_name {
        // Issues
        "list_issues" => handle_list_issues(ctx, &arguments).await?,
        "get_issue" => handle_get_issue(ctx, &arguments).await?,
        "create_issue" => handle_create_issue(ctx, &arguments).await?,
        "edit_issue" => handle_edit_issue(ctx, &arguments).await?,
        "list_issue_comments" => handle_list_comments(ctx, &arguments, "issue").await?,
        "create_issue_comment" => handle_create_issue_comment(ctx, &arguments).await?,
        "edit_issue_comment" => handle_edit_issue_comment(ctx, &arguments).await?,

        // Pull requests
        "list_pull_requests" => handle_list_pull_requests(ctx, &arguments).await?,
        "get_pull_request" => handle_get_pull_request(ctx, &arguments).await?,
        "create_pull_request" => handle_create_pull_request(ctx, &arguments).await?,
        "edit_pull_request" => handle_edit_pull_request(ctx, &arguments).await?,
        "list_pull_request_comments" => {
            handle_list_comments(ctx, &arguments, "pull request").await?
        }

        // Notifications
        "list_notifications" => handle_list_notifications(ctx, &arguments).await?,
        "mark_notification_read" => handle_mark_notification_read(ctx, &arguments).await?,

        // Diagnostics
        "resolve_repository" => handle_resolve_repository(&arguments)?,
        "server_info" => handle_server_info(ctx).await?,

        _ => return Err(Error::UnknownTool(tool_name.to_string())),
    };

    Ok(format_tool_output(payload, ctx.config.compat))
}

// ============================================================================
// Arguments
// ============================================================================

/// Deserialize tool arguments; a missing argument object counts as empty.
fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments.clone()
    };
    serde_json::from_value(arguments)
        .map_err(|e| CoreError::invalid_argument("arguments", e.to_string()).into())
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| CoreError::invalid_argument(field, "is required").into())
}

fn required_text(value: Option<String>, field: &str) -> Result<String> {
    let value = required(value, field)?;
    if value.trim().is_empty() {
        return Err(CoreError::invalid_argument(field, "must not be empty").into());
    }
    Ok(value)
}

fn required_id(value: Option<u64>, field: &str) -> Result<u64> {
    match required(value, field)? {
        0 => Err(CoreError::invalid_argument(field, "must be a positive integer").into()),
        id => Ok(id),
    }
}

fn positive(value: Option<u32>, field: &str) -> Result<Option<u32>> {
    match value {
        Some(0) => Err(CoreError::invalid_argument(field, "must be a positive integer").into()),
        other => Ok(other),
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StateFilter {
    Open,
    Closed,
    All,
}

impl StateFilter {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum State {
    Open,
    Closed,
}

impl State {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    state: Option<StateFilter>,
    #[serde(default)]
    labels: Vec<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NumberArgs {
    number: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CreateIssueArgs {
    title: Option<String>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditArgs {
    number: Option<u64>,
    title: Option<String>,
    body: Option<String>,
    state: Option<State>,
}

impl EditArgs {
    fn changes(&self) -> Result<Value> {
        let mut changes = serde_json::Map::new();
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(CoreError::invalid_argument("title", "must not be empty").into());
            }
            changes.insert("title".into(), json!(title));
        }
        if let Some(body) = &self.body {
            changes.insert("body".into(), json!(body));
        }
        if let Some(state) = self.state {
            changes.insert("state".into(), json!(state.as_str()));
        }
        if changes.is_empty() {
            return Err(CoreError::invalid_argument(
                "title",
                "at least one of title, body, or state must be provided",
            )
            .into());
        }
        Ok(Value::Object(changes))
    }
}

#[derive(Debug, Deserialize)]
struct CommentArgs {
    number: Option<u64>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditCommentArgs {
    comment_id: Option<u64>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatePullRequestArgs {
    title: Option<String>,
    head: Option<String>,
    base: Option<String>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotificationListArgs {
    #[serde(default)]
    all: bool,
}

#[derive(Debug, Deserialize)]
struct NotificationArgs {
    id: Option<u64>,
}

// ============================================================================
// Response shaping
// ============================================================================

fn field(item: &Value, key: &str) -> Value {
    item.get(key).cloned().unwrap_or(Value::Null)
}

fn user(dialect: Dialect, item: &Value) -> Value {
    item.get("user")
        .and_then(|user| dialect.user_login(user))
        .map_or(Value::Null, |login| json!(login))
}

fn expect_array(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(CoreError::Transport(TransportError::Decode(format!(
            "expected a JSON array, got {other}"
        )))
        .into()),
    }
}

fn issue_summary(dialect: Dialect, item: &Value) -> Value {
    json!({
        "id": field(item, "id"),
        "number": field(item, "number"),
        "title": field(item, "title"),
        "state": field(item, "state"),
        "user": user(dialect, item),
        "body": field(item, "body"),
    })
}

fn pull_request_summary(dialect: Dialect, item: &Value) -> Value {
    let branch = |side: &str| {
        item.get(side)
            .and_then(|b| b.get("ref"))
            .cloned()
            .unwrap_or(Value::Null)
    };
    json!({
        "id": field(item, "id"),
        "number": field(item, "number"),
        "title": field(item, "title"),
        "state": field(item, "state"),
        "user": user(dialect, item),
        "body": field(item, "body"),
        "head": branch("head"),
        "base": branch("base"),
        "merged": field(item, "merged"),
    })
}

fn comment_summary(dialect: Dialect, item: &Value) -> Value {
    json!({
        "id": field(item, "id"),
        "user": user(dialect, item),
        "body": field(item, "body"),
        "created_at": field(item, "created_at"),
    })
}

fn notification_summary(item: &Value) -> Value {
    let subject = item.get("subject").cloned().unwrap_or(Value::Null);
    json!({
        "id": field(item, "id"),
        "title": field(&subject, "title"),
        "subject": field(&subject, "type"),
        "unread": field(item, "unread"),
        "repository": item
            .get("repository")
            .map_or(Value::Null, |repo| field(repo, "full_name")),
    })
}

fn count_label(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

// ============================================================================
// Issue Handlers
// ============================================================================

async fn handle_list_issues(ctx: &ToolContext<'_>, arguments: &Value) -> Result<Value> {
    let args: ListArgs = parse_args(arguments)?;
    let page = positive(args.page, "page")?;
    let limit = positive(args.limit, "limit")?;
    let call = ctx.repository_call(arguments).await?;

    let labels = (!args.labels.is_empty()).then(|| args.labels.join(","));
    let request = ApiRequest::get(call.path("/issues"))
        .query("type", "issues")
        .query_opt("state", args.state.map(|s| s.as_str()))
        .query_opt("labels", labels)
        .query_opt("page", page)
        .query_opt("limit", limit);

    let issues: Vec<Value> = expect_array(ctx.send(request).await?)?
        .iter()
        .map(|item| issue_summary(call.dialect, item))
        .collect();

    Ok(json!({
        "message": format!("{} in {}", count_label(issues.len(), "issue"), call.name()),
        "repository": call.name(),
        "issues": issues,
    }))
}

async fn handle_get_issue(ctx: &ToolContext<'_>, arguments: &Value) -> Result<Value> {
    let args: NumberArgs = parse_args(arguments)?;
    let number = required_id(args.number, "number")?;
    let call = ctx.repository_call(arguments).await?;

    let body = ctx
        .send(ApiRequest::get(call.path(&format!("/issues/{number}"))))
        .await?;
    let issue = issue_summary(call.dialect, &body);

    Ok(json!({
        "message": format!("Issue #{number} in {}", call.name()),
        "repository": call.name(),
        "issue": issue,
    }))
}

async fn handle_create_issue(ctx: &ToolContext<'_>, arguments: &Value) -> Result<Value> {
    let args: CreateIssueArgs = parse_args(arguments)?;
    let title = required_text(args.title, "title")?;
    let call = ctx.repository_call(arguments).await?;

    let request = ApiRequest::post(
        call.path("/issues"),
        json!({"title": title, "body": args.body.unwrap_or_default()}),
    );
    let issue = issue_summary(call.dialect, &ctx.send(request).await?);

    Ok(json!({
        "message": format!("Created issue #{} in {}", issue["number"], call.name()),
        "repository": call.name(),
        "issue": issue,
    }))
}

async fn handle_edit_issue(ctx: &ToolContext<'_>, arguments: &Value) -> Result<Value> {
    let args: EditArgs = parse_args(arguments)?;
    let number = required_id(args.number, "number")?;
    let changes = args.changes()?;
    let call = ctx.repository_call(arguments).await?;

    let request = ApiRequest::patch(call.path(&format!("/issues/{number}")), changes);
    let issue = issue_summary(call.dialect, &ctx.send(request).await?);

    Ok(json!({
        "message": format!("Updated issue #{number} in {}", call.name()),
        "repository": call.name(),
        "issue": issue,
    }))
}

/// Issue and pull request conversations share the issue comments endpoint.
async fn handle_list_comments(
    ctx: &ToolContext<'_>,
    arguments: &Value,
    kind: &str,
) -> Result<Value> {
    let args: NumberArgs = parse_args(arguments)?;
    let number = required_id(args.number, "number")?;
    let call = ctx.repository_call(arguments).await?;

    let request = ApiRequest::get(call.path(&format!("/issues/{number}/comments")));
    let comments: Vec<Value> = expect_array(ctx.send(request).await?)?
        .iter()
        .map(|item| comment_summary(call.dialect, item))
        .collect();

    Ok(json!({
        "message": format!(
            "{} on {kind} {}#{number}",
            count_label(comments.len(), "comment"),
            call.name()
        ),
        "repository": call.name(),
        "number": number,
        "comments": comments,
    }))
}

async fn handle_create_issue_comment(ctx: &ToolContext<'_>, arguments: &Value) -> Result<Value> {
    let args: CommentArgs = parse_args(arguments)?;
    let number = required_id(args.number, "number")?;
    let body = required_text(args.body, "body")?;
    let call = ctx.repository_call(arguments).await?;

    let request = ApiRequest::post(
        call.path(&format!("/issues/{number}/comments")),
        json!({"body": body}),
    );
    let comment = comment_summary(call.dialect, &ctx.send(request).await?);

    Ok(json!({
        "message": format!("Added comment {} to {}#{number}", comment["id"], call.name()),
        "repository": call.name(),
        "comment": comment,
    }))
}

async fn handle_edit_issue_comment(ctx: &ToolContext<'_>, arguments: &Value) -> Result<Value> {
    let args: EditCommentArgs = parse_args(arguments)?;
    let comment_id = required_id(args.comment_id, "comment_id")?;
    let body = required_text(args.body, "body")?;
    let call = ctx.repository_call(arguments).await?;

    let request = ApiRequest::patch(
        call.path(&format!("/issues/comments/{comment_id}")),
        json!({"body": body}),
    );
    let comment = comment_summary(call.dialect, &ctx.send(request).await?);

    Ok(json!({
        "message": format!("Updated comment {comment_id} in {}", call.name()),
        "repository": call.name(),
        "comment": comment,
    }))
}

// ============================================================================
// Pull Request Handlers
// ============================================================================

async fn handle_list_pull_requests(ctx: &ToolContext<'_>, arguments: &Value) -> Result<Value> {
    let args: ListArgs = parse_args(arguments)?;
    let page = positive(args.page, "page")?;
    let limit = positive(args.limit, "limit")?;
    let call = ctx.repository_call(arguments).await?;

    let request = ApiRequest::get(call.path("/pulls"))
        .query_opt("state", args.state.map(|s| s.as_str()))
        .query_opt("page", page)
        .query_opt("limit", limit);

    let pull_requests: Vec<Value> = expect_array(ctx.send(request).await?)?
        .iter()
        .map(|item| pull_request_summary(call.dialect, item))
        .collect();

    Ok(json!({
        "message": format!(
            "{} in {}",
            count_label(pull_requests.len(), "pull request"),
            call.name()
        ),
        "repository": call.name(),
        "pull_requests": pull_requests,
    }))
}

async fn handle_get_pull_request(ctx: &ToolContext<'_>, arguments: &Value) -> Result<Value> {
    let args: NumberArgs = parse_args(arguments)?;
    let number = required_id(args.number, "number")?;
    let call = ctx.repository_call(arguments).await?;

    let body = ctx
        .send(ApiRequest::get(call.path(&format!("/pulls/{number}"))))
        .await?;

    Ok(json!({
        "message": format!("Pull request #{number} in {}", call.name()),
        "repository": call.name(),
        "pull_request": pull_request_summary(call.dialect, &body),
    }))
}

async fn handle_create_pull_request(ctx: &ToolContext<'_>, arguments: &Value) -> Result<Value> {
    let args: CreatePullRequestArgs = parse_args(arguments)?;
    let title = required_text(args.title, "title")?;
    let head = required_text(args.head, "head")?;
    let base = required_text(args.base, "base")?;
    let call = ctx.repository_call(arguments).await?;

    let request = ApiRequest::post(
        call.path("/pulls"),
        json!({
            "title": title,
            "head": head,
            "base": base,
            "body": args.body.unwrap_or_default(),
        }),
    );
    let pull_request = pull_request_summary(call.dialect, &ctx.send(request).await?);

    Ok(json!({
        "message": format!(
            "Created pull request #{} in {} ({head} -> {base})",
            pull_request["number"],
            call.name()
        ),
        "repository": call.name(),
        "pull_request": pull_request,
    }))
}

async fn handle_edit_pull_request(ctx: &ToolContext<'_>, arguments: &Value) -> Result<Value> {
    let args: EditArgs = parse_args(arguments)?;
    let number = required_id(args.number, "number")?;
    let changes = args.changes()?;
    let call = ctx.repository_call(arguments).await?;

    let request = ApiRequest::patch(call.path(&format!("/pulls/{number}")), changes);
    let pull_request = pull_request_summary(call.dialect, &ctx.send(request).await?);

    Ok(json!({
        "message": format!("Updated pull request #{number} in {}", call.name()),
        "repository": call.name(),
        "pull_request": pull_request,
    }))
}

// ============================================================================
// Notification Handlers
// ============================================================================

async fn handle_list_notifications(ctx: &ToolContext<'_>, arguments: &Value) -> Result<Value> {
    let args: NotificationListArgs = parse_args(arguments)?;

    // The repository target is optional here; without one the whole inbox is listed.
    let resolution = match RepositoryTarget::from_arguments(arguments) {
        Ok(target) => Some(resolve_repository(&target)?),
        Err(CoreError::MissingTarget) => None,
        Err(e) => return Err(e.into()),
    };

    let path = match &resolution {
        Some(resolution) => {
            let repository = resolution.repository();
            format!(
                "/repos/{}/{}/notifications",
                repository.owner(),
                repository.name()
            )
        }
        None => "/notifications".to_string(),
    };
    let request = ApiRequest::get(path).query_opt("all", args.all.then_some(true));

    let notifications: Vec<Value> = expect_array(ctx.send(request).await?)?
        .iter()
        .map(notification_summary)
        .collect();

    let repository = resolution.map(|r| r.repository().to_string());
    let scope = repository
        .as_deref()
        .map(|name| format!(" for {name}"))
        .unwrap_or_default();

    Ok(json!({
        "message": format!("{}{scope}", count_label(notifications.len(), "notification")),
        "repository": repository,
        "notifications": notifications,
    }))
}

async fn handle_mark_notification_read(
    ctx: &ToolContext<'_>,
    arguments: &Value,
) -> Result<Value> {
    let args: NotificationArgs = parse_args(arguments)?;
    let id = required_id(args.id, "id")?;

    let request = ApiRequest::new(Method::Patch, format!("/notifications/threads/{id}"))
        .query("to-status", "read");
    ctx.send(request).await?;

    Ok(json!({
        "message": format!("Marked notification {id} as read"),
        "id": id,
    }))
}

// ============================================================================
// Diagnostic Handlers
// ============================================================================

fn handle_resolve_repository(arguments: &Value) -> Result<Value> {
    let target = RepositoryTarget::from_arguments(arguments)?;
    let resolution = resolve_repository(&target)?;

    let message = match resolution.remote_name() {
        "" => format!("Resolved {}", resolution.repository()),
        remote => format!("Resolved {} via remote {remote}", resolution.repository()),
    };

    Ok(json!({
        "message": message,
        "resolution": serde_json::to_value(&resolution)?,
    }))
}

/// Remembers the version seen by the dialect probe so it can be reported
/// without a second request.
struct RecordingProbe<P> {
    inner: P,
    seen: Mutex<Option<VersionInfo>>,
}

#[async_trait]
impl<P: VersionProbe> VersionProbe for RecordingProbe<P> {
    async fn version(&self) -> forge_core::Result<VersionInfo> {
        let info = self.inner.version().await?;
        if let Ok(mut seen) = self.seen.lock() {
            *seen = Some(info.clone());
        }
        Ok(info)
    }
}

async fn handle_server_info(ctx: &ToolContext<'_>) -> Result<Value> {
    let probe = RecordingProbe {
        inner: TransportProbe(ctx.transport),
        seen: Mutex::new(None),
    };
    let dialect = detect_dialect(ctx.config.dialect, &probe, &ctx.cancel).await?;

    let recorded = probe.seen.lock().ok().and_then(|mut seen| seen.take());
    let version = match (recorded, ctx.config.dialect) {
        (Some(info), _) => Some(info),
        // An auto probe already ran; it failed or was inconclusive
        (None, DialectSetting::Auto) => None,
        // Explicit dialects skip the probe, so ask once here
        (None, _) => {
            let fetched = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(CoreError::Cancelled.into()),
                fetched = probe.inner.version() => fetched,
            };
            match fetched {
                Ok(info) => Some(info),
                Err(e) => {
                    tracing::warn!(error = %e, "could not read backend version");
                    None
                }
            }
        }
    };

    let detected = version.as_ref().and_then(classify_version);
    let version = version.map(|info| info.version);
    let message = match &version {
        Some(version) => format!("{dialect} backend, version {version}"),
        None => format!("{dialect} backend, version unknown"),
    };

    Ok(json!({
        "message": message,
        "url": ctx.config.remote_url.as_str(),
        "version": version,
        "dialect": dialect,
        "detected_dialect": detected,
        "dialect_setting": ctx.config.dialect.to_string(),
        "compat": ctx.config.compat,
        "debug": ctx.config.debug,
    }))
}
