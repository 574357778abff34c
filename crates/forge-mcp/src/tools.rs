//! MCP Tool definitions
//!
//! Every repository tool takes the target as either a local working copy
//! (`directory`) or an explicit `owner/repo` name (`repository`).
//!
//! # Tool Categories
//!
//! ## Issues
//! - `list_issues`, `get_issue`, `create_issue`, `edit_issue`
//! - `list_issue_comments`, `create_issue_comment`, `edit_issue_comment`
//!
//! ## Pull Requests
//! - `list_pull_requests`, `get_pull_request`, `create_pull_request`,
//!   `edit_pull_request`, `list_pull_request_comments`
//!
//! ## Notifications
//! - `list_notifications` (target optional)
//! - `mark_notification_read`
//!
//! ## Diagnostics (debug mode only)
//! - `resolve_repository` - Show how a target resolves, without calling the backend
//! - `server_info` - Report the backend version and the dialect in use

use forge_core::ToolOutput;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Tools only listed and callable when the server runs in debug mode.
pub const DEBUG_TOOLS: [&str; 2] = ["resolve_repository", "server_info"];

/// Tool definition for MCP protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Result from a tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    pub is_error: bool,
}

/// Content types for tool results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

impl ToolResult {
    /// Create a successful result from formatted output
    pub fn output(output: ToolOutput) -> Self {
        Self {
            content: vec![ToolContent::Text { text: output.text }],
            structured_content: Some(output.structured),
            is_error: false,
        }
    }

    /// Create an error result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            structured_content: None,
            is_error: true,
        }
    }

    /// Text of the first content block
    pub fn text(&self) -> &str {
        match self.content.first() {
            Some(ToolContent::Text { text }) => text,
            None => "",
        }
    }
}

/// Schema for a tool that targets a repository.
///
/// `directory` and `repository` are both optional in the schema; the
/// handler enforces that at least one is present.
fn repository_schema(properties: Value, required: &[&str]) -> Value {
    let mut merged = Map::new();
    merged.insert(
        "directory".to_string(),
        json!({
            "type": "string",
            "description": "Local git working copy; the repository is read from its origin remote (or first remote). Takes precedence over repository"
        }),
    );
    merged.insert(
        "repository".to_string(),
        json!({
            "type": "string",
            "description": "Repository as owner/repo, used when no directory is given"
        }),
    );
    if let Value::Object(extra) = properties {
        merged.extend(extra);
    }

    json!({
        "type": "object",
        "properties": merged,
        "required": required,
    })
}

fn state_property(allow_all: bool) -> Value {
    let states: &[&str] = if allow_all {
        &["open", "closed", "all"]
    } else {
        &["open", "closed"]
    };
    json!({
        "type": "string",
        "enum": states,
        "description": "Issue or pull request state"
    })
}

fn number_property(description: &str) -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "description": description
    })
}

fn paging_properties() -> Map<String, Value> {
    let mut paging = Map::new();
    paging.insert(
        "page".to_string(),
        json!({"type": "integer", "minimum": 1, "description": "Page number (1-based)"}),
    );
    paging.insert(
        "limit".to_string(),
        json!({"type": "integer", "minimum": 1, "description": "Page size"}),
    );
    paging
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Get the tool definitions exposed by the server.
///
/// Diagnostic tools are only included when `debug` is set.
pub fn get_tool_definitions(debug: bool) -> Vec<ToolDefinition> {
    let mut list_issues = paging_properties();
    list_issues.insert("state".to_string(), state_property(true));
    list_issues.insert(
        "labels".to_string(),
        json!({"type": "array", "items": {"type": "string"}, "description": "Only issues with all of these labels"}),
    );

    let mut list_pulls = paging_properties();
    list_pulls.insert("state".to_string(), state_property(true));

    let mut tools = vec![
        // Issues
        tool(
            "list_issues",
            "List issues in a repository",
            repository_schema(Value::Object(list_issues), &[]),
        ),
        tool(
            "get_issue",
            "Get a single issue",
            repository_schema(json!({"number": number_property("Issue number")}), &["number"]),
        ),
        tool(
            "create_issue",
            "Create an issue",
            repository_schema(
                json!({
                    "title": {"type": "string", "description": "Issue title"},
                    "body": {"type": "string", "description": "Issue description (markdown)"}
                }),
                &["title"],
            ),
        ),
        tool(
            "edit_issue",
            "Edit the title, body, or state of an issue",
            repository_schema(
                json!({
                    "number": number_property("Issue number"),
                    "title": {"type": "string", "description": "New title"},
                    "body": {"type": "string", "description": "New description"},
                    "state": state_property(false)
                }),
                &["number"],
            ),
        ),
        tool(
            "list_issue_comments",
            "List comments on an issue",
            repository_schema(json!({"number": number_property("Issue number")}), &["number"]),
        ),
        tool(
            "create_issue_comment",
            "Comment on an issue or pull request",
            repository_schema(
                json!({
                    "number": number_property("Issue or pull request number"),
                    "body": {"type": "string", "description": "Comment text (markdown)"}
                }),
                &["number", "body"],
            ),
        ),
        tool(
            "edit_issue_comment",
            "Replace the text of a comment",
            repository_schema(
                json!({
                    "comment_id": number_property("Comment id"),
                    "body": {"type": "string", "description": "New comment text"}
                }),
                &["comment_id", "body"],
            ),
        ),
        // Pull requests
        tool(
            "list_pull_requests",
            "List pull requests in a repository",
            repository_schema(Value::Object(list_pulls), &[]),
        ),
        tool(
            "get_pull_request",
            "Get a single pull request",
            repository_schema(
                json!({"number": number_property("Pull request number")}),
                &["number"],
            ),
        ),
        tool(
            "create_pull_request",
            "Open a pull request",
            repository_schema(
                json!({
                    "title": {"type": "string", "description": "Pull request title"},
                    "head": {"type": "string", "description": "Branch with the changes"},
                    "base": {"type": "string", "description": "Branch to merge into"},
                    "body": {"type": "string", "description": "Pull request description"}
                }),
                &["title", "head", "base"],
            ),
        ),
        tool(
            "edit_pull_request",
            "Edit the title, body, or state of a pull request",
            repository_schema(
                json!({
                    "number": number_property("Pull request number"),
                    "title": {"type": "string", "description": "New title"},
                    "body": {"type": "string", "description": "New description"},
                    "state": state_property(false)
                }),
                &["number"],
            ),
        ),
        tool(
            "list_pull_request_comments",
            "List conversation comments on a pull request",
            repository_schema(
                json!({"number": number_property("Pull request number")}),
                &["number"],
            ),
        ),
        // Notifications
        tool(
            "list_notifications",
            "List notifications, optionally for one repository",
            repository_schema(
                json!({"all": {"type": "boolean", "description": "Include read notifications"}}),
                &[],
            ),
        ),
        tool(
            "mark_notification_read",
            "Mark a notification thread as read",
            json!({
                "type": "object",
                "properties": {"id": number_property("Notification thread id")},
                "required": ["id"]
            }),
        ),
    ];

    if debug {
        tools.push(tool(
            "resolve_repository",
            "Show how a directory or repository argument resolves",
            repository_schema(json!({}), &[]),
        ));
        tools.push(tool(
            "server_info",
            "Report the backend version and the dialect in use",
            json!({"type": "object", "properties": {}}),
        ));
    }

    tools
}
