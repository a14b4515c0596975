//! Azure DevOps REST payloads.
//!
//! Responses are deserialized leniently: every field the tools only display
//! is optional, so a sparse or newer payload still renders.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Shared
// =============================================================================

/// `{ "count": n, "value": [...] }` wrapper used by list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub html: Option<Link>,
    #[serde(default)]
    pub web: Option<Link>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
}

impl Links {
    /// Browser link, preferring `html` over `web`.
    pub fn browser_url(&self) -> Option<&str> {
        self.html
            .as_ref()
            .or(self.web.as_ref())
            .map(|link| link.href.as_str())
    }
}

// =============================================================================
// Work items
// =============================================================================

/// Work item with its raw field map (`System.Title`, `System.State`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default, rename = "_links")]
    pub links: Option<Links>,
}

impl WorkItem {
    /// String value of a field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Display name of an identity field; older APIs return a plain string.
    pub fn identity(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map
                .get("displayName")
                .or_else(|| map.get("uniqueName"))
                .and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn title(&self) -> &str {
        self.field("System.Title").unwrap_or("(no title)")
    }

    pub fn state(&self) -> &str {
        self.field("System.State").unwrap_or("Unknown")
    }

    pub fn work_item_type(&self) -> &str {
        self.field("System.WorkItemType").unwrap_or("Unknown")
    }

    pub fn url(&self) -> Option<&str> {
        self.links.as_ref().and_then(Links::browser_url)
    }
}

/// Result of a WIQL query: ids only.
#[derive(Debug, Clone, Deserialize)]
pub struct WiqlResult {
    #[serde(default, rename = "workItems")]
    pub work_items: Vec<WorkItemRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkItemRef {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WiqlRequest {
    pub query: String,
}

// =============================================================================
// Pipelines and builds
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
}

/// Run from the Pipelines API (`/_apis/pipelines/{id}/runs`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub pipeline: Option<PipelineRef>,
    #[serde(default, rename = "_links")]
    pub links: Option<Links>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// Build from the Build API (`/_apis/build/builds`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: i64,
    #[serde(default)]
    pub build_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub queue_time: Option<String>,
    #[serde(default)]
    pub finish_time: Option<String>,
    #[serde(default)]
    pub source_branch: Option<String>,
    #[serde(default)]
    pub definition: Option<DefinitionRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefinitionRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of `POST pipelines/{id}/runs`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPipelineRequest {
    pub resources: RunResources,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_parameters: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResources {
    pub repositories: RunRepositories,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRepositories {
    #[serde(rename = "self")]
    pub self_repo: RepositoryRef,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRef {
    pub ref_name: String,
}

impl RunPipelineRequest {
    pub fn new(branch: &str, parameters: Option<Map<String, Value>>) -> Self {
        Self {
            resources: RunResources {
                repositories: RunRepositories {
                    self_repo: RepositoryRef {
                        ref_name: branch_ref(branch),
                    },
                },
            },
            template_parameters: parameters.filter(|p| !p.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildArtifact {
    pub name: String,
    #[serde(default)]
    pub resource: Option<ArtifactResource>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactResource {
    #[serde(default)]
    pub download_url: Option<String>,
}

// =============================================================================
// Projects, repositories and pull requests
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePullRequest {
    pub source_ref_name: String,
    pub target_ref_name: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reviewers: Vec<Reviewer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reviewer {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub pull_request_id: i64,
    #[serde(default, rename = "_links")]
    pub links: Option<Links>,
}

/// `refs/heads/<branch>`, leaving already-qualified refs alone.
pub fn branch_ref(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{}", branch)
    }
}

/// Strip the `refs/heads/` prefix for display.
pub fn short_branch(reference: &str) -> &str {
    reference.strip_prefix("refs/heads/").unwrap_or(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_work_item_accessors() {
        let item: WorkItem = serde_json::from_value(json!({
            "id": 7,
            "fields": {
                "System.Title": "Fix login",
                "System.State": "Active",
                "System.AssignedTo": {"displayName": "Jane Doe", "uniqueName": "jane@x.com"}
            },
            "_links": {"html": {"href": "https://dev.azure.com/o/p/_workitems/edit/7"}}
        }))
        .unwrap();

        assert_eq!(item.title(), "Fix login");
        assert_eq!(item.state(), "Active");
        assert_eq!(item.work_item_type(), "Unknown");
        assert_eq!(item.identity("System.AssignedTo"), Some("Jane Doe"));
        assert_eq!(item.url(), Some("https://dev.azure.com/o/p/_workitems/edit/7"));
    }

    #[test]
    fn test_sparse_payloads_deserialize() {
        let build: Build = serde_json::from_value(json!({"id": 1})).unwrap();
        assert!(build.definition.is_none());

        let list: ListResponse<Repository> = serde_json::from_value(json!({"count": 0})).unwrap();
        assert!(list.value.is_empty());
    }

    #[test]
    fn test_run_pipeline_request_shape() {
        let body = serde_json::to_value(RunPipelineRequest::new("develop", None)).unwrap();
        assert_eq!(
            body["resources"]["repositories"]["self"]["refName"],
            "refs/heads/develop"
        );
        assert!(body.get("templateParameters").is_none());

        let mut params = Map::new();
        params.insert("env".into(), json!("dev"));
        let body = serde_json::to_value(RunPipelineRequest::new("main", Some(params))).unwrap();
        assert_eq!(body["templateParameters"]["env"], "dev");
    }

    #[test]
    fn test_branch_refs() {
        assert_eq!(branch_ref("main"), "refs/heads/main");
        assert_eq!(branch_ref("refs/tags/v1"), "refs/tags/v1");
        assert_eq!(short_branch("refs/heads/feature/x"), "feature/x");
        assert_eq!(short_branch("main"), "main");
    }
}
