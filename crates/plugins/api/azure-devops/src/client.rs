//! Azure DevOps REST client.
//!
//! Authenticates with a personal access token as HTTP Basic credentials
//! (empty user name) and pins every call to one `api-version`.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use devops_core::config::AzureSettings;
use devops_core::{Error, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::patch::{self, PatchDocument};
use crate::types::{
    Build, BuildArtifact, CreatePullRequest, ListResponse, Pipeline, PipelineRun, Project,
    PullRequest, Repository, RunPipelineRequest, WiqlRequest, WiqlResult, WorkItem,
};

/// Pipeline runs can take a while to be accepted.
pub const PIPELINE_RUN_TIMEOUT: Duration = Duration::from_secs(300);

/// Filters for the Build API list call.
#[derive(Debug, Clone, Default)]
pub struct BuildQuery<'a> {
    pub definition: Option<i64>,
    pub top: Option<u32>,
    pub status: Option<&'a str>,
}

/// Azure DevOps API client.
pub struct AzureDevOpsClient {
    base_url: String,
    default_project: Option<String>,
    api_version: String,
    auth_header: Option<String>,
    pipeline_timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for AzureDevOpsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureDevOpsClient")
            .field("base_url", &self.base_url)
            .field("default_project", &self.default_project)
            .field("api_version", &self.api_version)
            .field("authenticated", &self.auth_header.is_some())
            .finish()
    }
}

impl AzureDevOpsClient {
    /// Create a client from resolved settings.
    pub fn new(settings: &AzureSettings) -> Result<Self> {
        Self::build(
            &settings.org_url,
            settings.project.as_deref(),
            settings.pat.as_deref(),
            &settings.api_version,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    /// Create a client against an explicit base URL (for testing with httpmock).
    pub fn with_base_url(
        base_url: &str,
        project: Option<&str>,
        pat: Option<&str>,
    ) -> Result<Self> {
        Self::build(
            base_url,
            project,
            pat,
            devops_core::config::DEFAULT_API_VERSION,
            Duration::from_secs(devops_core::config::DEFAULT_HTTP_TIMEOUT_SECS),
        )
    }

    fn build(
        base_url: &str,
        project: Option<&str>,
        pat: Option<&str>,
        api_version: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("devops-mcp/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_project: project
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            api_version: api_version.to_string(),
            auth_header: pat.map(basic_auth_header),
            pipeline_timeout: PIPELINE_RUN_TIMEOUT,
            client,
        })
    }

    pub fn default_project(&self) -> Option<&str> {
        self.default_project.as_deref()
    }

    /// The explicit project, else the configured default.
    pub fn resolve_project(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .or(self.default_project())
            .map(str::to_string)
            .ok_or_else(|| Error::MissingArgument("project".to_string()))
    }

    /// Build a request for `path` (relative to the organization URL).
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(method = %method, url = %url, "Azure DevOps request");

        let builder = self
            .client
            .request(method, url)
            .query(&[("api-version", self.api_version.as_str())])
            .header(ACCEPT, "application/json");

        match &self.auth_header {
            Some(auth) => builder.header(AUTHORIZATION, auth),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let response = check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| Error::InvalidData(format!("Failed to parse response: {}", e)))
    }

    fn patch_request(&self, method: Method, path: &str, doc: &PatchDocument) -> Result<RequestBuilder> {
        Ok(self
            .request(method, path)
            .header(CONTENT_TYPE, patch::CONTENT_TYPE)
            .body(serde_json::to_vec(doc)?))
    }

    // =========================================================================
    // Work items
    // =========================================================================

    pub async fn create_work_item(
        &self,
        project: &str,
        work_item_type: &str,
        doc: &PatchDocument,
    ) -> Result<WorkItem> {
        let path = format!("{}/_apis/wit/workitems/${}", project, work_item_type);
        let request = self.patch_request(Method::POST, &path, doc)?;
        self.send(request).await
    }

    /// Run a WIQL query and return the matching ids in result order.
    pub async fn query_wiql(&self, query: &str) -> Result<Vec<i64>> {
        let body = WiqlRequest {
            query: query.to_string(),
        };
        let result: WiqlResult = self
            .send(self.request(Method::POST, "_apis/wit/wiql").json(&body))
            .await?;
        Ok(result.work_items.into_iter().map(|r| r.id).collect())
    }

    /// Fetch several work items with their fields. No call is made for an empty id list.
    pub async fn get_work_items(&self, ids: &[i64]) -> Result<Vec<WorkItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let list: ListResponse<WorkItem> = self
            .send(
                self.request(Method::GET, "_apis/wit/workitems")
                    .query(&[("ids", ids.as_str()), ("$expand", "fields")]),
            )
            .await?;
        Ok(list.value)
    }

    pub async fn get_work_item(&self, id: i64, expand: &str) -> Result<WorkItem> {
        let path = format!("_apis/wit/workitems/{}", id);
        self.send(self.request(Method::GET, &path).query(&[("$expand", expand)]))
            .await
    }

    pub async fn update_work_item(&self, id: i64, doc: &PatchDocument) -> Result<WorkItem> {
        let path = format!("_apis/wit/workitems/{}", id);
        let request = self.patch_request(Method::PATCH, &path, doc)?;
        self.send(request).await
    }

    // =========================================================================
    // Pipelines and builds
    // =========================================================================

    pub async fn list_pipelines(&self, project: &str) -> Result<Vec<Pipeline>> {
        let path = format!("{}/_apis/pipelines", project);
        let list: ListResponse<Pipeline> = self.send(self.request(Method::GET, &path)).await?;
        Ok(list.value)
    }

    pub async fn run_pipeline(
        &self,
        project: &str,
        pipeline_id: i64,
        body: &RunPipelineRequest,
    ) -> Result<PipelineRun> {
        let path = format!("{}/_apis/pipelines/{}/runs", project, pipeline_id);
        self.send(
            self.request(Method::POST, &path)
                .timeout(self.pipeline_timeout)
                .json(body),
        )
        .await
    }

    pub async fn list_pipeline_runs(
        &self,
        project: &str,
        pipeline_id: i64,
        top: u32,
        status: Option<&str>,
    ) -> Result<Vec<PipelineRun>> {
        let path = format!("{}/_apis/pipelines/{}/runs", project, pipeline_id);
        let mut request = self
            .request(Method::GET, &path)
            .query(&[("$top", top.to_string())]);
        if let Some(status) = status {
            request = request.query(&[("statusFilter", status)]);
        }

        let list: ListResponse<PipelineRun> = self.send(request).await?;
        Ok(list.value)
    }

    pub async fn list_builds(&self, project: &str, query: BuildQuery<'_>) -> Result<Vec<Build>> {
        let path = format!("{}/_apis/build/builds", project);
        let mut request = self.request(Method::GET, &path);
        if let Some(definition) = query.definition {
            request = request.query(&[("definitions", definition.to_string())]);
        }
        if let Some(top) = query.top {
            request = request.query(&[("$top", top.to_string())]);
        }
        if let Some(status) = query.status {
            request = request.query(&[("statusFilter", status)]);
        }

        let list: ListResponse<Build> = self.send(request).await?;
        Ok(list.value)
    }

    pub async fn list_build_artifacts(&self, project: &str, build_id: i64) -> Result<Vec<BuildArtifact>> {
        let path = format!("{}/_apis/build/builds/{}/artifacts", project, build_id);
        let list: ListResponse<BuildArtifact> = self.send(self.request(Method::GET, &path)).await?;
        Ok(list.value)
    }

    // =========================================================================
    // Projects, repositories and pull requests
    // =========================================================================

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let list: ListResponse<Project> = self
            .send(self.request(Method::GET, "_apis/projects"))
            .await?;
        Ok(list.value)
    }

    /// Repositories of one project, or of the whole organization.
    pub async fn list_repositories(&self, project: Option<&str>) -> Result<Vec<Repository>> {
        let path = match project {
            Some(project) => format!("{}/_apis/git/repositories", project),
            None => "_apis/git/repositories".to_string(),
        };
        let list: ListResponse<Repository> = self.send(self.request(Method::GET, &path)).await?;
        Ok(list.value)
    }

    pub async fn create_pull_request(
        &self,
        repository_id: &str,
        body: &CreatePullRequest,
    ) -> Result<PullRequest> {
        let path = format!("_apis/git/repositories/{}/pullrequests", repository_id);
        self.send(self.request(Method::POST, &path).json(body)).await
    }

    /// Link a work item to a pull request.
    pub async fn link_work_item(
        &self,
        repository_id: &str,
        pull_request_id: i64,
        work_item_id: i64,
    ) -> Result<()> {
        let path = format!(
            "_apis/git/repositories/{}/pullRequests/{}/workitems/{}",
            repository_id, pull_request_id, work_item_id
        );
        let response = self
            .request(Method::PATCH, &path)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        check_status(response).await.map(|_| ())
    }
}

/// Only 200 and 201 count as success; anything else becomes an API error
/// carrying the response body.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status().as_u16();
    if matches!(status, 200 | 201) {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    warn!(status = status, message = %message, "Azure DevOps API error response");
    Err(Error::from_status(status, message))
}

fn basic_auth_header(pat: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!(":{}", pat)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::TITLE;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> AzureDevOpsClient {
        AzureDevOpsClient::with_base_url(&server.base_url(), Some("Ops"), Some("pat-123")).unwrap()
    }

    #[test]
    fn test_basic_auth_header() {
        // base64(":pat-123")
        assert_eq!(basic_auth_header("pat-123"), "Basic OnBhdC0xMjM=");
    }

    #[test]
    fn test_resolve_project() {
        let with_default =
            AzureDevOpsClient::with_base_url("http://localhost/", Some("Ops"), None).unwrap();
        assert_eq!(with_default.resolve_project(None).unwrap(), "Ops");
        assert_eq!(with_default.resolve_project(Some("Web")).unwrap(), "Web");
        assert_eq!(with_default.resolve_project(Some("  ")).unwrap(), "Ops");

        let without = AzureDevOpsClient::with_base_url("http://localhost", None, None).unwrap();
        assert!(matches!(
            without.resolve_project(None),
            Err(Error::MissingArgument(ref f)) if f == "project"
        ));
    }

    #[test]
    fn test_debug_hides_token() {
        let client = AzureDevOpsClient::with_base_url("http://x", None, Some("secret")).unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("authenticated: true"));
    }

    #[tokio::test]
    async fn test_request_headers_and_api_version() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/_apis/projects")
                .query_param("api-version", "7.1")
                .header("authorization", "Basic OnBhdC0xMjM=")
                .header("accept", "application/json");
            then.status(200)
                .json_body(json!({"count": 1, "value": [{"name": "Ops"}]}));
        });

        let projects = client(&server).list_projects().await.unwrap();

        mock.assert();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "Ops");
    }

    #[tokio::test]
    async fn test_create_work_item_sends_patch_document() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/Ops/_apis/wit/workitems/$Bug")
                .header("content-type", "application/json-patch+json")
                .json_body(json!([
                    {"op": "add", "path": "/fields/System.Title", "value": "Crash"}
                ]));
            then.status(201)
                .json_body(json!({"id": 5, "fields": {"System.Title": "Crash"}}));
        });

        let doc = PatchDocument::new().add(TITLE, "Crash");
        let item = client(&server)
            .create_work_item("Ops", "Bug", &doc)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(item.id, 5);
        assert_eq!(item.title(), "Crash");
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/_apis/wit/workitems/9");
            then.status(404).body("work item 9 does not exist");
        });

        let err = client(&server).get_work_item(9, "fields").await.unwrap_err();

        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 404);
                assert!(message.contains("does not exist"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_content_is_not_success() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PATCH)
                .path("/_apis/git/repositories/repo/pullRequests/1/workitems/2");
            then.status(204);
        });

        let err = client(&server).link_work_item("repo", 1, 2).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 204, .. }));
    }

    #[tokio::test]
    async fn test_get_work_items_batches_ids() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/_apis/wit/workitems")
                .query_param("ids", "3,1")
                .query_param("$expand", "fields");
            then.status(200).json_body(json!({
                "count": 2,
                "value": [
                    {"id": 3, "fields": {"System.Title": "Three"}},
                    {"id": 1, "fields": {"System.Title": "One"}}
                ]
            }));
        });

        let c = client(&server);
        let items = c.get_work_items(&[3, 1]).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 3);

        assert!(c.get_work_items(&[]).await.unwrap().is_empty());
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn test_invalid_json_is_invalid_data() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/Ops/_apis/pipelines");
            then.status(200).body("<html>sign in</html>");
        });

        let err = client(&server).list_pipelines("Ops").await.unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_list_builds_filters() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/Ops/_apis/build/builds")
                .query_param("definitions", "12")
                .query_param("$top", "5");
            then.status(200).json_body(json!({"value": [{"id": 100}]}));
        });

        let builds = client(&server)
            .list_builds(
                "Ops",
                BuildQuery {
                    definition: Some(12),
                    top: Some(5),
                    status: None,
                },
            )
            .await
            .unwrap();

        mock.assert();
        assert_eq!(builds[0].id, 100);
    }
}
