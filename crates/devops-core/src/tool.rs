//! Tool model: descriptors, arguments, results and the handler trait.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Static description of a tool, as returned by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Create a descriptor from a JSON schema.
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Names listed in the schema's `required` array.
    pub fn required_fields(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// The schema's `properties` object, if any.
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.input_schema.get("properties").and_then(Value::as_object)
    }

    /// `(property, default)` pairs for every property that declares a default.
    pub fn defaults(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.properties()
            .into_iter()
            .flat_map(|props| props.iter())
            .filter_map(|(name, schema)| schema.get("default").map(|default| (name, default)))
    }
}

/// One block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

/// Output of a tool call: an ordered sequence of content blocks.
///
/// Failures use the same shape; only the text says something went wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
}

impl ToolResult {
    /// A result holding a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
        }
    }

    /// The in-band error envelope for a failed call.
    pub fn failure(tool: &str, error: &Error) -> Self {
        Self::text(format!("❌ Error executing tool {}: {}", tool, error))
    }

    /// All text blocks joined by newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ToolContent::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Arguments of a single tool call.
///
/// Defaults from the tool's schema are already filled in by the time a
/// handler sees them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Build from an optional JSON value; anything but an object or null is rejected.
    pub fn from_value(value: Option<Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::Object(map)) => Ok(Self(map)),
            Some(other) => Err(Error::invalid_argument(
                "arguments",
                format!("expected an object, got {}", other),
            )),
        }
    }

    /// True when the key is present with a non-null value.
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(v) if !v.is_null())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub(crate) fn insert_default(&mut self, key: &str, value: &Value) {
        if !self.contains(key) {
            self.0.insert(key.to_string(), value.clone());
        }
    }

    /// Optional string argument.
    pub fn str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(type_error(key, "a string", other)),
        }
    }

    /// Required string argument.
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.str(key)?
            .ok_or_else(|| Error::MissingArgument(key.to_string()))
    }

    /// Optional non-empty string argument; blank strings count as absent.
    pub fn non_empty_str(&self, key: &str) -> Result<Option<&str>> {
        Ok(self.str(key)?.filter(|s| !s.trim().is_empty()))
    }

    /// Optional integer argument. Integral floats and numeric strings are accepted.
    pub fn i64(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Some)
                .ok_or_else(|| type_error(key, "an integer", &Value::Number(n.clone()))),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| type_error(key, "an integer", &Value::String(s.clone()))),
            Some(other) => Err(type_error(key, "an integer", other)),
        }
    }

    /// Required integer argument.
    pub fn require_i64(&self, key: &str) -> Result<i64> {
        self.i64(key)?
            .ok_or_else(|| Error::MissingArgument(key.to_string()))
    }

    /// Optional boolean argument.
    pub fn bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(type_error(key, "a boolean", other)),
        }
    }

    /// Optional JSON object argument.
    pub fn object(&self, key: &str) -> Result<Option<&Map<String, Value>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(type_error(key, "an object", other)),
        }
    }

    /// Optional array argument, with every element converted by `convert`.
    pub fn list<T>(&self, key: &str, convert: impl Fn(&Value) -> Option<T>) -> Result<Vec<T>> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| convert(item).ok_or_else(|| type_error(key, "a list", item)))
                .collect(),
            Some(other) => Err(type_error(key, "a list", other)),
        }
    }
}

fn type_error(key: &str, expected: &str, got: &Value) -> Error {
    Error::invalid_argument(key, format!("expected {}, got {}", expected, got))
}

/// Boxed future returned by tool handlers.
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<ToolResult>> + Send>>;

/// A single tool implementation.
///
/// Any `Fn(Arguments) -> impl Future<Output = Result<ToolResult>>` closure is
/// a handler, so plugins register closures capturing an `Arc` of their state.
pub trait ToolHandler: Send + Sync {
    fn call(&self, args: Arguments) -> ToolFuture;
}

impl<F, Fut> ToolHandler for F
where
    F: Fn(Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolResult>> + Send + 'static,
{
    fn call(&self, args: Arguments) -> ToolFuture {
        Box::pin(self(args))
    }
}
