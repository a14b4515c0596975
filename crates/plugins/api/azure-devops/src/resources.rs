//! Read-only `azuredevops://` resources.

use std::sync::Arc;

use async_trait::async_trait;
use devops_core::{Error, ResourceDescriptor, ResourceProvider, Result};
use tracing::warn;

use crate::client::AzureDevOpsClient;
use crate::format;
use crate::wiql;

pub const PROJECTS_URI: &str = "azuredevops://projects";
pub const PIPELINES_URI: &str = "azuredevops://pipelines";
pub const ACTIVE_WORK_ITEMS_URI: &str = "azuredevops://work-items/active";
pub const REPOSITORIES_URI: &str = "azuredevops://repositories";

/// Active work items shown by the resource.
const ACTIVE_ITEMS_SHOWN: usize = 10;

const NO_PROJECT: &str = "⚠️ No default project configured";

/// Resource provider backed by the Azure DevOps client.
///
/// REST failures are rendered into the resource text rather than returned
/// as errors; only an unknown URI is an error.
pub struct AzureResources {
    client: Arc<AzureDevOpsClient>,
}

impl AzureResources {
    pub fn new(client: Arc<AzureDevOpsClient>) -> Self {
        Self { client }
    }

    async fn projects(&self) -> Result<String> {
        let projects = self.client.list_projects().await?;
        Ok(format::project_names(&projects))
    }

    async fn pipelines(&self, project: &str) -> Result<String> {
        let pipelines = self.client.list_pipelines(project).await?;
        Ok(format::pipeline_names(project, &pipelines))
    }

    async fn active_work_items(&self, project: &str) -> Result<String> {
        let ids = self.client.query_wiql(&wiql::active_items(project)).await?;
        let shown: Vec<i64> = ids.into_iter().take(ACTIVE_ITEMS_SHOWN).collect();
        Ok(format::active_work_item_ids(project, &shown))
    }

    async fn repositories(&self) -> Result<String> {
        let repos = self
            .client
            .list_repositories(self.client.default_project())
            .await?;
        Ok(format::repository_names(&repos))
    }
}

#[async_trait]
impl ResourceProvider for AzureResources {
    fn resources(&self) -> Vec<ResourceDescriptor> {
        vec![
            ResourceDescriptor::new(PROJECTS_URI, "Projects")
                .with_description("Projects of the Azure DevOps organization")
                .with_mime_type("text/plain"),
            ResourceDescriptor::new(PIPELINES_URI, "Pipelines")
                .with_description("Pipelines of the default project")
                .with_mime_type("text/plain"),
            ResourceDescriptor::new(ACTIVE_WORK_ITEMS_URI, "Active work items")
                .with_description("New and Active work items of the default project")
                .with_mime_type("text/plain"),
            ResourceDescriptor::new(REPOSITORIES_URI, "Repositories")
                .with_description("Git repositories of the default project")
                .with_mime_type("text/plain"),
        ]
    }

    async fn read(&self, uri: &str) -> Result<String> {
        let project = self.client.default_project();

        let result = match (uri, project) {
            (PROJECTS_URI, _) => self.projects().await,
            (PIPELINES_URI, Some(project)) => self.pipelines(project).await,
            (ACTIVE_WORK_ITEMS_URI, Some(project)) => self.active_work_items(project).await,
            (PIPELINES_URI | ACTIVE_WORK_ITEMS_URI, None) => return Ok(NO_PROJECT.to_string()),
            (REPOSITORIES_URI, _) => self.repositories().await,
            _ => return Err(Error::UnknownResource(uri.to_string())),
        };

        Ok(result.unwrap_or_else(|e| {
            warn!(uri = uri, error = %e, "Resource read failed");
            format!("❌ Failed to read {}: {}", uri, e)
        }))
    }
}
