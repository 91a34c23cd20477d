//! Tool System
//!
//! Tools are registered once at startup and looked up by name when the
//! backend requests them. Each tool declares a [`ToolSpec`] that adapters
//! translate into their backend's function-declaration shape.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::Arguments;

/// Declared JSON type of a tool parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Object,
}

impl ParamType {
    /// JSON Schema type name
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
        }
    }

    /// Whether `value` is acceptable for this type
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => as_integer(value).is_some(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
        }
    }
}

/// Integer view of a JSON value.
///
/// Whole floats (`5.0`) and numeric strings are accepted since some backends
/// emit integers in those forms.
#[allow(clippy::cast_possible_truncation)]
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Tool definition (for LLM function calling)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Ordered parameter definitions
    pub parameters: Vec<ParameterSpec>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParameterSpec) -> Self {
        self.parameters.push(param);
        self
    }

    /// JSON Schema object describing the parameters
    pub fn json_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({ "type": p.param_type.as_str(), "description": p.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check arguments against the declared parameters
    pub fn validate(&self, args: &Arguments) -> Result<()> {
        for param in &self.parameters {
            match args.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(AgentError::ToolValidation(format!(
                        "Missing required parameter '{}' for tool '{}'",
                        param.name, self.name
                    )));
                }
                Some(value) if !value.is_null() && !param.param_type.accepts(value) => {
                    return Err(AgentError::ToolValidation(format!(
                        "Parameter '{}' for tool '{}' must be {}, got {}",
                        param.name, self.name, param.param_type, value
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Typed view over a tool call's arguments
#[derive(Clone, Debug, Default)]
pub struct ToolArgs<'a> {
    args: Option<&'a Arguments>,
}

impl<'a> ToolArgs<'a> {
    pub fn new(args: &'a Arguments) -> Self {
        Self { args: Some(args) }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.args.and_then(|a| a.get(name)).filter(|v| !v.is_null())
    }

    /// Required string argument
    pub fn str(&self, name: &str) -> Result<&'a str> {
        self.opt_str(name)
            .ok_or_else(|| AgentError::ToolValidation(format!("Missing string argument '{name}'")))
    }

    pub fn opt_str(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Required integer argument
    pub fn int(&self, name: &str) -> Result<i64> {
        self.opt_int(name)
            .ok_or_else(|| AgentError::ToolValidation(format!("Missing integer argument '{name}'")))
    }

    pub fn opt_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(as_integer)
    }

    pub fn opt_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// The caller's stated reason for the call, empty when absent
    pub fn reasoning(&self) -> &'a str {
        self.opt_str("reasoning").unwrap_or_default()
    }
}

/// Executable body of a tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run with the decoded arguments and return the text fed back to the backend
    async fn invoke(&self, args: ToolArgs<'_>) -> Result<String>;
}

/// A handler that carries its own spec
pub trait Tool: ToolHandler {
    fn spec(&self) -> ToolSpec;
}

/// Registered tool: spec plus handler
#[derive(Clone)]
pub struct ToolEntry {
    pub spec: ToolSpec,
    pub handler: Arc<dyn ToolHandler>,
}

/// Registry for available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `spec.name`
    pub fn register(&mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) -> Result<()> {
        if self.tools.contains_key(&spec.name) {
            return Err(AgentError::DuplicateTool(spec.name));
        }
        tracing::debug!(tool = %spec.name, "Registered tool");
        self.tools.insert(spec.name.clone(), ToolEntry { spec, handler });
        Ok(())
    }

    /// Register a tool that describes itself
    pub fn register_tool<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        let spec = tool.spec();
        self.register(spec, Arc::new(tool))
    }

    /// Look up a tool by name
    pub fn resolve(&self, name: &str) -> Result<&ToolEntry> {
        self.tools
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    /// All specs in registration order
    pub fn describe_all(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec.clone()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
