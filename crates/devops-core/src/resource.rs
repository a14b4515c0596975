//! Read-only resources exposed alongside tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Entry of the `resources/list` catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ResourceDescriptor {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Source of readable resources.
///
/// `read` returns [`Error::UnknownResource`](crate::Error::UnknownResource)
/// for URIs not listed by `resources`.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    fn resources(&self) -> Vec<ResourceDescriptor>;

    async fn read(&self, uri: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_serialization() {
        let descriptor = ResourceDescriptor::new("azuredevops://projects", "Projects")
            .with_description("All projects")
            .with_mime_type("text/plain");

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["uri"], "azuredevops://projects");
        assert_eq!(json["mimeType"], "text/plain");

        let bare = serde_json::to_string(&ResourceDescriptor::new("x://y", "Y")).unwrap();
        assert!(!bare.contains("mimeType"));
        assert!(!bare.contains("description"));
    }
}
