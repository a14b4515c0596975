//! JSON-Patch documents for work-item mutations.
//!
//! Azure DevOps creates and updates work items from an
//! `application/json-patch+json` array of operations on `/fields/<name>`.

use serde::Serialize;
use serde_json::Value;

pub const CONTENT_TYPE: &str = "application/json-patch+json";

pub const TITLE: &str = "System.Title";
pub const DESCRIPTION: &str = "System.Description";
pub const STATE: &str = "System.State";
pub const ASSIGNED_TO: &str = "System.AssignedTo";
pub const AREA_PATH: &str = "System.AreaPath";
pub const ITERATION_PATH: &str = "System.IterationPath";
pub const TAGS: &str = "System.Tags";
pub const HISTORY: &str = "System.History";
pub const PRIORITY: &str = "Microsoft.VSTS.Common.Priority";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Add,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    pub op: Op,
    pub path: String,
    pub value: Value,
}

/// Ordered list of patch operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PatchDocument(Vec<Operation>);

impl PatchDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(Op::Add, field, value.into())
    }

    pub fn replace(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(Op::Replace, field, value.into())
    }

    /// `add` only when a value is present.
    pub fn add_opt<V: Into<Value>>(self, field: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.add(field, value),
            None => self,
        }
    }

    /// `replace` only when a value is present.
    pub fn replace_opt<V: Into<Value>>(self, field: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.replace(field, value),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn push(mut self, op: Op, field: &str, value: Value) -> Self {
        self.0.push(Operation {
            op,
            path: format!("/fields/{}", field),
            value,
        });
        self
    }
}
