//! Query tools exposed to agents.
//!
//! Every tool implements [`Tool`] and is registered in a [`ToolRegistry`].
//! The HTTP API (`POST /tools/{name}`) and the MCP bridge both dispatch
//! through the registry, so the two transports always offer the same set.
//!
//! | Tool | Parameters | Result |
//! |------|------------|--------|
//! | `search_documentation` | `query`, `source?`, `section?`, `limit?` | ranked results |
//! | `read_documentation` | `source`, `path` | one document, or `found: false` |
//! | `get_sections` | `source?` | sorted section names |
//! | `get_statistics` | none | counts per source and total |
//!
//! Each call opens the store, performs one operation and closes it again;
//! nothing is cached between calls.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::get::get_document;
use crate::models::Source;
use crate::search::search_documents;
use crate::stats::{get_statistics, list_sections};

/// An operation agents can invoke by name with JSON parameters.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route and MCP tool name, e.g. `"search_documentation"`.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) for the parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute with parameters already checked by [`validate_params`].
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Caller-side problem with a tool's parameters.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct InvalidParams(pub String);

/// What a tool can reach while it runs.
#[derive(Clone)]
pub struct ToolContext {
    config: Arc<Config>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Serializable tool info for `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        }
    }
}

/// Validate parameters against the tool's schema, then execute.
pub async fn invoke(tool: &dyn Tool, params: Value, ctx: &ToolContext) -> Result<Value> {
    let params = validate_params(&tool.parameters_schema(), &params)?;
    tool.execute(params, ctx).await
}

/// Check required fields and JSON types against a schema.
///
/// Unknown parameters are passed through untouched.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(InvalidParams(format!(
                "parameters must be an object, got {}",
                json_type_name(other)
            ))
            .into())
        }
    };

    let required = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>())
        .unwrap_or_default();
    for field in required {
        if !params_obj.contains_key(field) {
            return Err(InvalidParams(format!("missing required parameter: {}", field)).into());
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (name, prop_schema) in properties {
            let Some(value) = params_obj.get(name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let Some(expected) = prop_schema.get("type").and_then(|t| t.as_str()) else {
                continue;
            };
            let type_ok = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                return Err(InvalidParams(format!(
                    "parameter '{}' must be of type '{}', got {}",
                    name,
                    expected,
                    json_type_name(value)
                ))
                .into());
            }
        }
    }

    Ok(Value::Object(params_obj))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn optional_source(params: &Value) -> Result<Option<Source>> {
    match params.get("source").and_then(Value::as_str) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e: crate::error::Error| InvalidParams(e.to_string()).into()),
    }
}

fn source_enum() -> Value {
    let mut names: Vec<&str> = Source::identifiers();
    names.extend(["core", "client"]);
    json!(names)
}

/// Ranked full-text search.
pub struct SearchDocumentationTool;

#[async_trait]
impl Tool for SearchDocumentationTool {
    fn name(&self) -> &str {
        "search_documentation"
    }

    fn description(&self) -> &str {
        "Search the Apache Airflow documentation (core and Python client)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search terms; AND/OR/NOT are supported between words" },
                "source": { "type": "string", "enum": source_enum(), "description": "Restrict to one documentation source" },
                "section": { "type": "string", "description": "Restrict to one section, as listed by get_sections" },
                "limit": { "type": "integer", "description": "Maximum number of results (1-50)", "minimum": 1 }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = params["query"].as_str().unwrap_or("");
        let source = optional_source(&params)?;
        let section = params
            .get("section")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty());
        let limit = params.get("limit").and_then(Value::as_i64);

        let results = search_documents(ctx.config(), query, source, section, limit).await?;
        Ok(json!({ "count": results.len(), "results": results }))
    }
}

/// Full text of one page.
pub struct ReadDocumentationTool;

#[async_trait]
impl Tool for ReadDocumentationTool {
    fn name(&self) -> &str {
        "read_documentation"
    }

    fn description(&self) -> &str {
        "Read the full text of one documentation page by source and path"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": { "type": "string", "enum": source_enum(), "description": "Documentation source" },
                "path": { "type": "string", "description": "Path of the page within the source, as returned by search_documentation" }
            },
            "required": ["source", "path"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let Some(source) = optional_source(&params)? else {
            bail!(InvalidParams("source must not be empty".to_string()));
        };
        let path = params["path"].as_str().unwrap_or("").trim();
        if path.is_empty() {
            bail!(InvalidParams("path must not be empty".to_string()));
        }

        Ok(match get_document(ctx.config(), source, path).await? {
            Some(doc) => json!({ "found": true, "document": doc }),
            None => json!({
                "found": false,
                "message": format!("No document found in {} at '{}'", source, path),
            }),
        })
    }
}

/// Section names for browsing.
pub struct GetSectionsTool;

#[async_trait]
impl Tool for GetSectionsTool {
    fn name(&self) -> &str {
        "get_sections"
    }

    fn description(&self) -> &str {
        "List documentation sections, optionally for one source"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": { "type": "string", "enum": source_enum(), "description": "Restrict to one documentation source" }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let source = optional_source(&params)?;
        let sections = list_sections(ctx.config(), source).await?;
        Ok(json!({ "sections": sections }))
    }
}

/// Document counts.
pub struct GetStatisticsTool;

#[async_trait]
impl Tool for GetStatisticsTool {
    fn name(&self) -> &str {
        "get_statistics"
    }

    fn description(&self) -> &str {
        "Count indexed documentation pages per source"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let stats = get_statistics(ctx.config()).await?;
        Ok(serde_json::to_value(&stats)?)
    }
}

/// Tools by name, in registration order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry holding the four documentation tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchDocumentationTool));
        registry.register(Box::new(ReadDocumentationTool));
        registry.register(Box::new(GetSectionsTool));
        registry.register(Box::new(GetStatisticsTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
