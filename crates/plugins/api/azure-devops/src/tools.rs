//! Azure DevOps tool catalog.
//!
//! Each tool is a descriptor plus an async handler over a shared
//! [`AzureDevOpsClient`]. Required fields and schema defaults are enforced by
//! the dispatcher before a handler runs.

use std::sync::Arc;

use devops_core::{Arguments, Error, Result, ToolDescriptor, ToolFuture, ToolRegistryBuilder, ToolResult};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::client::{AzureDevOpsClient, BuildQuery};
use crate::format::{self, PullRequestSummary};
use crate::patch::{self, PatchDocument};
use crate::types::{branch_ref, CreatePullRequest, Reviewer, RunPipelineRequest};
use crate::wiql;

/// Handler signature shared by every Azure tool.
pub type AzureToolFn = fn(Arc<AzureDevOpsClient>, Arguments) -> ToolFuture;

const WORK_ITEM_TYPES: &[&str] = &["Bug", "Task", "Feature", "User Story", "Epic"];
const WORK_ITEM_STATES: &[&str] = &["New", "Active", "Resolved", "Closed", "Removed"];
const EXPAND_OPTIONS: &[&str] = &["none", "relations", "fields", "links", "all"];
const RUN_STATUSES: &[&str] = &["inProgress", "completed", "cancelling", "postponed"];

/// Every Azure tool in registration order.
pub fn catalog() -> Vec<(ToolDescriptor, AzureToolFn)> {
    vec![
        tool(
            ToolDescriptor::new(
                "create_work_item",
                "Create a work item (Bug, Task, Feature, User Story, Epic) in Azure DevOps",
                json!({
                    "type": "object",
                    "properties": {
                        "title": {"type": "string", "description": "Work item title"},
                        "type": {"type": "string", "enum": WORK_ITEM_TYPES, "description": "Work item type"},
                        "project": {"type": "string", "description": "Project name (defaults to the configured project)"},
                        "description": {"type": "string", "description": "Description (HTML allowed)"},
                        "assignee": {"type": "string", "description": "Assignee e-mail or display name"},
                        "priority": {"type": "integer", "minimum": 1, "maximum": 4, "default": 2, "description": "Priority (1 = highest)"},
                        "area_path": {"type": "string", "description": "Area path"},
                        "iteration_path": {"type": "string", "description": "Iteration path"},
                        "tags": {"type": "string", "description": "Semicolon-separated tags"}
                    },
                    "required": ["title", "type"]
                }),
            ),
            |client, args| Box::pin(create_work_item(client, args)),
        ),
        tool(
            ToolDescriptor::new(
                "query_work_items",
                "Search work items by title text or with a WIQL query",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "Title text, or a full WIQL query starting with SELECT"},
                        "project": {"type": "string", "description": "Project to search in"},
                        "top": {"type": "integer", "minimum": 1, "maximum": 100, "default": 20, "description": "Maximum number of results"}
                    },
                    "required": ["query"]
                }),
            ),
            |client, args| Box::pin(query_work_items(client, args)),
        ),
        tool(
            ToolDescriptor::new(
                "list_work_items",
                "List the most recently changed work items of a project",
                json!({
                    "type": "object",
                    "properties": {
                        "project": {"type": "string", "description": "Project name (defaults to the configured project)"},
                        "limit": {"type": "integer", "minimum": 1, "maximum": 200, "default": 10, "description": "Maximum number of work items"}
                    }
                }),
            ),
            |client, args| Box::pin(list_work_items(client, args)),
        ),
        tool(
            ToolDescriptor::new(
                "get_work_item",
                "Get the details of a work item",
                json!({
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer", "description": "Work item ID"},
                        "expand": {"type": "string", "enum": EXPAND_OPTIONS, "default": "fields", "description": "Extra data to include"}
                    },
                    "required": ["id"]
                }),
            ),
            |client, args| Box::pin(get_work_item(client, args)),
        ),
        tool(
            ToolDescriptor::new(
                "update_work_item",
                "Update the title, description, state or assignee of a work item, or add a comment",
                json!({
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer", "description": "Work item ID"},
                        "title": {"type": "string", "description": "New title"},
                        "description": {"type": "string", "description": "New description"},
                        "state": {"type": "string", "enum": WORK_ITEM_STATES, "description": "New state"},
                        "assignee": {"type": "string", "description": "New assignee"},
                        "comment": {"type": "string", "description": "Comment added to the history"}
                    },
                    "required": ["id"]
                }),
            ),
            |client, args| Box::pin(update_work_item(client, args)),
        ),
        tool(
            ToolDescriptor::new(
                "run_pipeline",
                "Start a pipeline run on a branch",
                json!({
                    "type": "object",
                    "properties": {
                        "pipeline_id": {"type": "integer", "description": "Pipeline ID"},
                        "branch": {"type": "string", "default": "main", "description": "Branch to run on"},
                        "project": {"type": "string", "description": "Project name (defaults to the configured project)"},
                        "parameters": {"type": "object", "description": "Template parameters"}
                    },
                    "required": ["pipeline_id"]
                }),
            ),
            |client, args| Box::pin(run_pipeline(client, args)),
        ),
        tool(
            ToolDescriptor::new(
                "get_pipeline_runs",
                "List recent runs of one pipeline, or recent builds of all pipelines",
                json!({
                    "type": "object",
                    "properties": {
                        "pipeline_id": {"type": "integer", "description": "Pipeline ID (omit for all pipelines)"},
                        "project": {"type": "string", "description": "Project name (defaults to the configured project)"},
                        "status": {"type": "string", "enum": RUN_STATUSES, "description": "Status filter"},
                        "top": {"type": "integer", "minimum": 1, "maximum": 50, "default": 10, "description": "Maximum number of runs"}
                    }
                }),
            ),
            |client, args| Box::pin(get_pipeline_runs(client, args)),
        ),
        tool(
            ToolDescriptor::new(
                "get_pipeline_status",
                "Show the status of the latest builds of a pipeline",
                json!({
                    "type": "object",
                    "properties": {
                        "pipeline_id": {"type": "integer", "description": "Pipeline (build definition) ID"},
                        "project": {"type": "string", "description": "Project name (defaults to the configured project)"},
                        "limit": {"type": "integer", "minimum": 1, "maximum": 50, "default": 5, "description": "Number of builds"}
                    },
                    "required": ["pipeline_id"]
                }),
            ),
            |client, args| Box::pin(get_pipeline_status(client, args)),
        ),
        tool(
            ToolDescriptor::new(
                "get_repositories",
                "List Git repositories of a project or of the whole organization",
                json!({
                    "type": "object",
                    "properties": {
                        "project": {"type": "string", "description": "Project name (defaults to the configured project)"}
                    }
                }),
            ),
            |client, args| Box::pin(get_repositories(client, args)),
        ),
        tool(
            ToolDescriptor::new(
                "create_pull_request",
                "Create a pull request and optionally link work items to it",
                json!({
                    "type": "object",
                    "properties": {
                        "repository_id": {"type": "string", "description": "Repository ID or name"},
                        "title": {"type": "string", "description": "Pull request title"},
                        "description": {"type": "string", "default": "", "description": "Pull request description"},
                        "source_branch": {"type": "string", "description": "Source branch"},
                        "target_branch": {"type": "string", "default": "main", "description": "Target branch"},
                        "reviewers": {"type": "array", "items": {"type": "string"}, "description": "Reviewer IDs"},
                        "work_items": {"type": "array", "items": {"type": "integer"}, "description": "Work item IDs to link"}
                    },
                    "required": ["repository_id", "title", "source_branch"]
                }),
            ),
            |client, args| Box::pin(create_pull_request(client, args)),
        ),
        tool(
            ToolDescriptor::new(
                "get_build_artifacts",
                "List the artifacts published by a build",
                json!({
                    "type": "object",
                    "properties": {
                        "build_id": {"type": "integer", "description": "Build ID"},
                        "project": {"type": "string", "description": "Project name (defaults to the configured project)"}
                    },
                    "required": ["build_id"]
                }),
            ),
            |client, args| Box::pin(get_build_artifacts(client, args)),
        ),
    ]
}

fn tool(descriptor: ToolDescriptor, handler: AzureToolFn) -> (ToolDescriptor, AzureToolFn) {
    (descriptor, handler)
}

/// Descriptors only, for listing the catalog without a client.
pub fn tool_descriptors() -> Vec<ToolDescriptor> {
    catalog().into_iter().map(|(descriptor, _)| descriptor).collect()
}

/// Register every Azure tool against a shared client.
pub fn register_tools(
    mut builder: ToolRegistryBuilder,
    client: Arc<AzureDevOpsClient>,
) -> ToolRegistryBuilder {
    for (descriptor, handler) in catalog() {
        let client = client.clone();
        builder = builder.register(descriptor, move |args: Arguments| handler(client.clone(), args));
    }
    builder
}

// =============================================================================
// Work items
// =============================================================================

async fn create_work_item(client: Arc<AzureDevOpsClient>, args: Arguments) -> Result<ToolResult> {
    let title = args.require_str("title")?;
    let work_item_type = one_of(&args, "type", WORK_ITEM_TYPES)?
        .ok_or_else(|| Error::MissingArgument("type".to_string()))?;
    let project = client.resolve_project(args.non_empty_str("project")?)?;
    let assignee = args.non_empty_str("assignee")?;
    let priority = bounded(&args, "priority", 2, 1, 4)?;

    let doc = PatchDocument::new()
        .add(patch::TITLE, title)
        .add_opt(patch::DESCRIPTION, args.non_empty_str("description")?)
        .add_opt(patch::ASSIGNED_TO, assignee)
        .add(patch::PRIORITY, priority)
        .add_opt(patch::AREA_PATH, args.non_empty_str("area_path")?)
        .add_opt(patch::ITERATION_PATH, args.non_empty_str("iteration_path")?)
        .add_opt(patch::TAGS, args.non_empty_str("tags")?);

    let item = client.create_work_item(&project, work_item_type, &doc).await?;
    info!(id = item.id, project = %project, "Work item created");

    Ok(ToolResult::text(format::created_work_item(
        &item,
        work_item_type,
        &project,
        assignee,
    )))
}

async fn query_work_items(client: Arc<AzureDevOpsClient>, args: Arguments) -> Result<ToolResult> {
    let query = args.require_str("query")?;
    let project = args.non_empty_str("project")?.or(client.default_project());
    let top = bounded(&args, "top", 20, 1, 100)? as usize;

    let ids = client
        .query_wiql(&wiql::from_user_query(query, project))
        .await?;
    let ids: Vec<i64> = ids.into_iter().take(top).collect();
    let items = client.get_work_items(&ids).await?;

    Ok(ToolResult::text(format::work_item_list(query, &items)))
}

async fn list_work_items(client: Arc<AzureDevOpsClient>, args: Arguments) -> Result<ToolResult> {
    let project = client.resolve_project(args.non_empty_str("project")?)?;
    let limit = bounded(&args, "limit", 10, 1, 200)? as usize;

    let ids = client.query_wiql(&wiql::project_items(&project)).await?;
    let ids: Vec<i64> = ids.into_iter().take(limit).collect();
    let items = client.get_work_items(&ids).await?;

    Ok(ToolResult::text(format::work_item_list(
        &format!("project {}", project),
        &items,
    )))
}

async fn get_work_item(client: Arc<AzureDevOpsClient>, args: Arguments) -> Result<ToolResult> {
    let id = args.require_i64("id")?;
    let expand = one_of(&args, "expand", EXPAND_OPTIONS)?.unwrap_or("fields");

    let item = client.get_work_item(id, expand).await?;
    Ok(ToolResult::text(format::work_item_details(&item)))
}

async fn update_work_item(client: Arc<AzureDevOpsClient>, args: Arguments) -> Result<ToolResult> {
    let id = args.require_i64("id")?;

    let doc = PatchDocument::new()
        .replace_opt(patch::TITLE, args.str("title")?)
        .replace_opt(patch::DESCRIPTION, args.str("description")?)
        .replace_opt(patch::STATE, one_of(&args, "state", WORK_ITEM_STATES)?)
        .replace_opt(patch::ASSIGNED_TO, args.str("assignee")?)
        .add_opt(patch::HISTORY, args.str("comment")?);

    if doc.is_empty() {
        return Err(Error::invalid_argument(
            "id",
            "no changes to apply; pass at least one field to update",
        ));
    }

    let item = client.update_work_item(id, &doc).await?;
    info!(id = item.id, operations = doc.len(), "Work item updated");

    Ok(ToolResult::text(format::updated_work_item(&item)))
}

// =============================================================================
// Pipelines and builds
// =============================================================================

async fn run_pipeline(client: Arc<AzureDevOpsClient>, args: Arguments) -> Result<ToolResult> {
    let pipeline_id = args.require_i64("pipeline_id")?;
    let branch = args.non_empty_str("branch")?.unwrap_or("main");
    let project = client.resolve_project(args.non_empty_str("project")?)?;
    let parameters = args.object("parameters")?.cloned();

    let run = client
        .run_pipeline(&project, pipeline_id, &RunPipelineRequest::new(branch, parameters))
        .await?;
    info!(pipeline_id, run_id = run.id, branch, "Pipeline run started");

    Ok(ToolResult::text(format::started_run(&run, branch, &project)))
}

async fn get_pipeline_runs(client: Arc<AzureDevOpsClient>, args: Arguments) -> Result<ToolResult> {
    let project = client.resolve_project(args.non_empty_str("project")?)?;
    let status = one_of(&args, "status", RUN_STATUSES)?;
    let top = bounded(&args, "top", 10, 1, 50)? as u32;

    let text = match args.i64("pipeline_id")? {
        Some(pipeline_id) => {
            let runs = client
                .list_pipeline_runs(&project, pipeline_id, top, status)
                .await?;
            format::pipeline_runs(pipeline_id, &runs)
        }
        None => {
            let builds = client
                .list_builds(
                    &project,
                    BuildQuery {
                        definition: None,
                        top: Some(top),
                        status,
                    },
                )
                .await?;
            format::build_runs(&builds)
        }
    };

    Ok(ToolResult::text(text))
}

async fn get_pipeline_status(client: Arc<AzureDevOpsClient>, args: Arguments) -> Result<ToolResult> {
    let pipeline_id = args.require_i64("pipeline_id")?;
    let project = client.resolve_project(args.non_empty_str("project")?)?;
    let limit = bounded(&args, "limit", 5, 1, 50)? as u32;

    let builds = client
        .list_builds(
            &project,
            BuildQuery {
                definition: Some(pipeline_id),
                top: Some(limit),
                status: None,
            },
        )
        .await?;

    Ok(ToolResult::text(format::pipeline_status(pipeline_id, &builds)))
}

async fn get_build_artifacts(client: Arc<AzureDevOpsClient>, args: Arguments) -> Result<ToolResult> {
    let build_id = args.require_i64("build_id")?;
    let project = client.resolve_project(args.non_empty_str("project")?)?;

    let artifacts = client.list_build_artifacts(&project, build_id).await?;
    Ok(ToolResult::text(format::build_artifacts(build_id, &artifacts)))
}

// =============================================================================
// Repositories and pull requests
// =============================================================================

async fn get_repositories(client: Arc<AzureDevOpsClient>, args: Arguments) -> Result<ToolResult> {
    let project = args.non_empty_str("project")?.or(client.default_project());

    let repos = client.list_repositories(project).await?;
    Ok(ToolResult::text(format::repositories(project, &repos)))
}

async fn create_pull_request(client: Arc<AzureDevOpsClient>, args: Arguments) -> Result<ToolResult> {
    let repository_id = args.require_str("repository_id")?;
    let title = args.require_str("title")?;
    let source_branch = args.require_str("source_branch")?;
    let target_branch = args.non_empty_str("target_branch")?.unwrap_or("main");
    let description = args.str("description")?.unwrap_or_default();
    let reviewers = args.list("reviewers", |v| v.as_str().map(str::to_string))?;
    let work_items = args.list("work_items", Value::as_i64)?;

    let body = CreatePullRequest {
        source_ref_name: branch_ref(source_branch),
        target_ref_name: branch_ref(target_branch),
        title: title.to_string(),
        description: description.to_string(),
        reviewers: reviewers
            .iter()
            .map(|id| Reviewer { id: id.clone() })
            .collect(),
    };

    let pr = client.create_pull_request(repository_id, &body).await?;
    info!(pull_request_id = pr.pull_request_id, repository = repository_id, "Pull request created");

    for work_item in &work_items {
        if let Err(e) = client
            .link_work_item(repository_id, pr.pull_request_id, *work_item)
            .await
        {
            warn!(
                work_item = *work_item,
                pull_request_id = pr.pull_request_id,
                error = %e,
                "Failed to link work item to pull request"
            );
        }
    }

    Ok(ToolResult::text(format::created_pull_request(
        &pr,
        &PullRequestSummary {
            title,
            source_branch,
            target_branch,
            reviewers: &reviewers,
            work_items: &work_items,
        },
    )))
}

// =============================================================================
// Argument helpers
// =============================================================================

/// Optional string argument restricted to `allowed`.
fn one_of<'a>(args: &'a Arguments, key: &str, allowed: &[&str]) -> Result<Option<&'a str>> {
    match args.str(key)? {
        Some(value) if !allowed.contains(&value) => Err(Error::invalid_argument(
            key,
            format!("expected one of {}, got '{}'", allowed.join(", "), value),
        )),
        other => Ok(other),
    }
}

/// Integer argument clamped into `min..=max`.
fn bounded(args: &Arguments, key: &str, default: i64, min: i64, max: i64) -> Result<i64> {
    Ok(args.i64(key)?.unwrap_or(default).clamp(min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use devops_core::{Dispatcher, ToolRegistry};
    use httpmock::prelude::*;
    use serde_json::json;

    fn dispatcher(server: &MockServer, project: Option<&str>) -> Dispatcher {
        let client = Arc::new(
            AzureDevOpsClient::with_base_url(&server.base_url(), project, Some("pat")).unwrap(),
        );
        let registry = register_tools(ToolRegistry::builder(), client).build().unwrap();
        Dispatcher::new(registry)
    }

    #[test]
    fn test_catalog_order_and_names() {
        let names: Vec<String> = tool_descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "create_work_item",
                "query_work_items",
                "list_work_items",
                "get_work_item",
                "update_work_item",
                "run_pipeline",
                "get_pipeline_runs",
                "get_pipeline_status",
                "get_repositories",
                "create_pull_request",
                "get_build_artifacts",
            ]
        );
    }

    #[test]
    fn test_required_fields_are_declared() {
        for descriptor in tool_descriptors() {
            let properties = descriptor.properties().expect("properties");
            for field in descriptor.required_fields() {
                assert!(
                    properties.contains_key(field),
                    "{} requires undeclared {}",
                    descriptor.name,
                    field
                );
            }
        }
    }

    #[tokio::test]
    async fn test_create_work_item() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/Ops/_apis/wit/workitems/$Task")
                .json_body(json!([
                    {"op": "add", "path": "/fields/System.Title", "value": "T"},
                    {"op": "add", "path": "/fields/Microsoft.VSTS.Common.Priority", "value": 2}
                ]));
            then.status(201)
                .json_body(json!({"id": 42, "fields": {"System.Title": "T"}}));
        });

        let result = dispatcher(&server, Some("Ops"))
            .call_tool("create_work_item", Some(json!({"title": "T", "type": "Task"})))
            .await;

        mock.assert();
        let text = result.joined_text();
        assert!(text.contains("#42"), "{}", text);
        assert!(text.contains("**Title:** T"), "{}", text);
    }

    #[tokio::test]
    async fn test_missing_required_field_makes_no_call() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.any_request();
            then.status(201).json_body(json!({"id": 1}));
        });

        let result = dispatcher(&server, Some("Ops"))
            .call_tool("create_work_item", Some(json!({"type": "Task"})))
            .await;

        mock.assert_calls(0);
        assert!(result
            .joined_text()
            .starts_with("❌ Error executing tool create_work_item:"));
        assert!(result.joined_text().contains("title"));
    }

    #[tokio::test]
    async fn test_missing_project_makes_no_call() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.any_request();
            then.status(200).json_body(json!({"value": []}));
        });

        let result = dispatcher(&server, None)
            .call_tool("get_build_artifacts", Some(json!({"build_id": 7})))
            .await;

        mock.assert_calls(0);
        assert!(result.joined_text().contains("project"));
    }

    #[tokio::test]
    async fn test_empty_pipeline_runs() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/Ops/_apis/pipelines/3/runs")
                .query_param("$top", "10");
            then.status(200).json_body(json!({"count": 0, "value": []}));
        });

        let result = dispatcher(&server, Some("Ops"))
            .call_tool("get_pipeline_runs", Some(json!({"pipeline_id": 3})))
            .await;

        mock.assert();
        assert_eq!(result.joined_text(), format::NO_RUNS);
    }

    #[tokio::test]
    async fn test_get_pipeline_runs_without_id_lists_builds() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/Ops/_apis/build/builds")
                .query_param("$top", "50")
                .query_param("statusFilter", "completed");
            then.status(200).json_body(json!({"value": [
                {"id": 9, "status": "completed", "result": "succeeded", "definition": {"name": "CI"}}
            ]}));
        });

        let result = dispatcher(&server, Some("Ops"))
            .call_tool(
                "get_pipeline_runs",
                Some(json!({"status": "completed", "top": 500})),
            )
            .await;

        mock.assert();
        assert!(result.joined_text().contains("**#9** - CI"));
    }

    #[tokio::test]
    async fn test_query_escapes_text_and_truncates() {
        let server = MockServer::start();
        let wiql = server.mock(|when, then| {
            when.method(POST)
                .path("/_apis/wit/wiql")
                .body_includes("CONTAINS 'it''s'");
            then.status(200)
                .json_body(json!({"workItems": [{"id": 1}, {"id": 2}, {"id": 3}]}));
        });
        let batch = server.mock(|when, then| {
            when.method(GET)
                .path("/_apis/wit/workitems")
                .query_param("ids", "1,2");
            then.status(200).json_body(json!({"value": [
                {"id": 1, "fields": {"System.Title": "One"}},
                {"id": 2, "fields": {"System.Title": "Two"}}
            ]}));
        });

        let result = dispatcher(&server, Some("Ops"))
            .call_tool("query_work_items", Some(json!({"query": "it's", "top": 2})))
            .await;

        wiql.assert();
        batch.assert();
        assert!(result.joined_text().contains("**Found:** 2 work items"));
    }

    #[tokio::test]
    async fn test_query_without_matches() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/_apis/wit/wiql");
            then.status(200).json_body(json!({"workItems": []}));
        });

        let result = dispatcher(&server, Some("Ops"))
            .call_tool("query_work_items", Some(json!({"query": "nothing"})))
            .await;

        assert_eq!(
            result.joined_text(),
            "🔍 **No results for query:** 'nothing'"
        );
    }

    #[tokio::test]
    async fn test_update_without_changes_is_rejected() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.any_request();
            then.status(200);
        });

        let result = dispatcher(&server, Some("Ops"))
            .call_tool("update_work_item", Some(json!({"id": 5})))
            .await;

        mock.assert_calls(0);
        assert!(result.joined_text().contains("no changes to apply"));
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_state() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.any_request();
            then.status(200);
        });

        let result = dispatcher(&server, Some("Ops"))
            .call_tool("update_work_item", Some(json!({"id": 5, "state": "Done"})))
            .await;

        mock.assert_calls(0);
        assert!(result.joined_text().contains("expected one of"));
    }

    #[tokio::test]
    async fn test_create_pull_request_links_work_items_best_effort() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/_apis/git/repositories/repo-1/pullrequests")
                .json_body(json!({
                    "sourceRefName": "refs/heads/feature/x",
                    "targetRefName": "refs/heads/main",
                    "title": "Add x",
                    "description": ""
                }));
            then.status(201).json_body(json!({
                "pullRequestId": 77,
                "_links": {"web": {"href": "https://dev.azure.com/o/p/_git/repo/pullrequest/77"}}
            }));
        });
        let linked = server.mock(|when, then| {
            when.method(PATCH)
                .path("/_apis/git/repositories/repo-1/pullRequests/77/workitems/5");
            then.status(200).json_body(json!({}));
        });
        let failed = server.mock(|when, then| {
            when.method(PATCH)
                .path("/_apis/git/repositories/repo-1/pullRequests/77/workitems/6");
            then.status(400).body("bad link");
        });

        let result = dispatcher(&server, Some("Ops"))
            .call_tool(
                "create_pull_request",
                Some(json!({
                    "repository_id": "repo-1",
                    "title": "Add x",
                    "source_branch": "feature/x",
                    "work_items": [5, 6]
                })),
            )
            .await;

        create.assert();
        linked.assert();
        failed.assert();
        let text = result.joined_text();
        assert!(text.contains("#77"), "{}", text);
        assert!(text.contains("feature/x → main"));
        assert!(text.contains("**Linked work items:** 5, 6"));
    }

    #[tokio::test]
    async fn test_api_error_is_reported_in_band() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/_apis/wit/workitems/404");
            then.status(404).body("not found");
        });

        let result = dispatcher(&server, Some("Ops"))
            .call_tool("get_work_item", Some(json!({"id": 404})))
            .await;

        assert_eq!(
            result.joined_text(),
            "❌ Error executing tool get_work_item: API error 404: not found"
        );
    }
}
