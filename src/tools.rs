//! Tool contract and registry (spec §4.1).
//!
//! Tools always return strings — the runtime never interprets tool output
//! as anything richer than text handed back to the provider. Schema
//! conversion supports three authoring styles: full JSON Schema passthrough,
//! an extended property map (`{"field": {"type": "...", "optional": bool}}`),
//! and bare simple-type notation (`{"field": "string"}`).

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Arbitrary context handed to every tool call: working directory, a view
/// of the run's config, the agent's scratchpad (if any), plus whatever
/// caller-supplied keys were configured.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub working_directory: String,
    pub config: HashMap<String, Value>,
    pub scratchpad: Option<Arc<tokio::sync::Mutex<HashMap<String, String>>>>,
    pub extra: HashMap<String, Value>,
}

pub type ToolHandler = Arc<
    dyn Fn(Value, ToolContext) -> Pin<Box<dyn Future<Output = std::result::Result<String, String>> + Send>>
        + Send
        + Sync,
>;

/// A single callable tool: name, description, JSON-Schema input shape, and
/// an async handler. Tools always resolve to `Ok(String)` or `Err(String)`
/// — never a richer value — per the tool contract.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    input_schema: Value,
    handler: ToolHandler,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: impl Fn(Value, ToolContext) -> Pin<Box<dyn Future<Output = std::result::Result<String, String>> + Send>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema: convert_schema_to_openai(schema),
            handler: Arc::new(handler),
        }
    }

    pub async fn execute(&self, input: Value, context: ToolContext) -> std::result::Result<String, String> {
        (self.handler)(input, context).await
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    /// Provider-facing `{"type": "function", "function": {...}}` shape
    /// (OpenAI-compatible tool-calling format).
    pub fn to_openai_format(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

/// Converts a simple-type-notation or extended-property schema into full
/// JSON Schema. Schemas that already look like JSON Schema (have both
/// `type` and `properties`) pass through untouched.
pub fn convert_schema_to_openai(schema: Value) -> Value {
    if let Value::Object(ref map) = schema {
        if map.contains_key("type") && map.contains_key("properties") {
            return schema;
        }
    }

    let Value::Object(map) = schema else {
        return serde_json::json!({"type": "object", "properties": {}, "required": []});
    };

    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for (field, spec) in map {
        match spec {
            Value::String(type_str) => {
                properties.insert(field.clone(), type_to_json_schema(&type_str));
                required.push(Value::String(field));
            }
            Value::Object(ref prop_map) => {
                let type_str = prop_map.get("type").and_then(|v| v.as_str()).unwrap_or("string");
                let mut prop_schema = type_to_json_schema(type_str);
                if let Some(desc) = prop_map.get("description") {
                    if let Value::Object(ref mut obj) = prop_schema {
                        obj.insert("description".to_string(), desc.clone());
                    }
                }
                if let Some(default) = prop_map.get("default") {
                    if let Value::Object(ref mut obj) = prop_schema {
                        obj.insert("default".to_string(), default.clone());
                    }
                }
                let optional = prop_map.get("optional").and_then(|v| v.as_bool()).unwrap_or(false);
                properties.insert(field.clone(), prop_schema);
                if !optional {
                    required.push(Value::String(field));
                }
            }
            _ => {
                properties.insert(field, serde_json::json!({"type": "string"}));
            }
        }
    }

    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

pub fn type_to_json_schema(type_str: &str) -> Value {
    match type_str {
        "string" | "str" => serde_json::json!({"type": "string"}),
        "integer" | "int" | "i32" | "i64" | "u32" | "u64" => serde_json::json!({"type": "integer"}),
        "number" | "float" | "f32" | "f64" => serde_json::json!({"type": "number"}),
        "boolean" | "bool" => serde_json::json!({"type": "boolean"}),
        "array" | "list" | "vec" => serde_json::json!({"type": "array", "items": {"type": "string"}}),
        "object" | "dict" | "map" => serde_json::json!({"type": "object"}),
        _ => serde_json::json!({"type": "string"}),
    }
}

/// Fluent builder for [`Tool`], mirroring the common `tool(...).param(...)
/// .build(...)` authoring style.
pub struct ToolBuilder {
    name: String,
    description: String,
    schema: Value,
}

pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder {
        name: name.into(),
        description: description.into(),
        schema: Value::Object(serde_json::Map::new()),
    }
}

impl ToolBuilder {
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn param(mut self, name: impl Into<String>, type_str: impl Into<String>) -> Self {
        if !self.schema.is_object() {
            self.schema = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(ref mut map) = self.schema {
            map.insert(name.into(), Value::String(type_str.into()));
        }
        self
    }

    pub fn build(
        self,
        handler: impl Fn(Value, ToolContext) -> Pin<Box<dyn Future<Output = std::result::Result<String, String>> + Send>>
            + Send
            + Sync
            + 'static,
    ) -> Tool {
        Tool::new(self.name, self.description, self.schema, handler)
    }
}

/// Resolves tool-name strings to implementations, and builds the
/// provider-facing tool-definition list. Rejects duplicate names (and
/// provider-reserved names) at construction time rather than at call time.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<Tool>>,
    order: Vec<String>,
}

/// Names the OpenAI-compatible wire format reserves; registering a tool
/// under one of these is rejected at build time (spec §9 open question).
const RESERVED_NAMES: &[&str] = &["function_call", "tool_calls"];

impl ToolRegistry {
    pub fn build(tools: Vec<Tool>) -> Result<Self> {
        let mut registry = ToolRegistry::default();
        for t in tools {
            if RESERVED_NAMES.contains(&t.name()) {
                return Err(Error::invalid_input(format!(
                    "tool name '{}' is reserved by the provider wire format",
                    t.name()
                )));
            }
            if registry.tools.contains_key(t.name()) {
                return Err(Error::invalid_input(format!("duplicate tool name: {}", t.name())));
            }
            registry.order.push(t.name().to_string());
            registry.tools.insert(t.name().to_string(), Arc::new(t));
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Provider-facing tool definitions, in registration order.
    pub fn definitions(&self) -> Vec<Value> {
        self.order.iter().filter_map(|name| self.tools.get(name)).map(|t| t.to_openai_format()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_tool(name: &str) -> Tool {
        Tool::new(name, "echoes input", serde_json::json!({"text": "string"}), |input, _ctx| {
            Box::pin(async move { Ok(input.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string()) })
        })
    }

    #[test]
    fn type_conversion_maps_known_aliases() {
        assert_eq!(type_to_json_schema("int"), serde_json::json!({"type": "integer"}));
        assert_eq!(type_to_json_schema("bool"), serde_json::json!({"type": "boolean"}));
        assert_eq!(type_to_json_schema("unknown"), serde_json::json!({"type": "string"}));
    }

    #[test]
    fn full_json_schema_passes_through() {
        let schema = serde_json::json!({"type": "object", "properties": {"x": {"type": "number"}}});
        assert_eq!(convert_schema_to_openai(schema.clone()), schema);
    }

    #[test]
    fn simple_notation_converts_to_object_schema() {
        let schema = convert_schema_to_openai(serde_json::json!({"text": "string"}));
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["required"][0], "text");
    }

    #[test]
    fn extended_notation_honors_optional() {
        let schema = convert_schema_to_openai(serde_json::json!({
            "text": {"type": "string", "optional": true}
        }));
        assert_eq!(schema["required"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn tool_executes_and_returns_string() {
        let t = echo_tool("echo");
        let result = t.execute(serde_json::json!({"text": "hi"}), ToolContext::default()).await;
        assert_eq!(result.unwrap(), "hi");
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let result = ToolRegistry::build(vec![echo_tool("echo"), echo_tool("echo")]);
        assert!(result.is_err());
    }

    #[test]
    fn registry_rejects_reserved_names() {
        let result = ToolRegistry::build(vec![echo_tool("tool_calls")]);
        assert!(result.is_err());
    }

    #[test]
    fn registry_definitions_preserve_order() {
        let registry = ToolRegistry::build(vec![echo_tool("a"), echo_tool("b")]).unwrap();
        let defs = registry.definitions();
        assert_eq!(defs[0]["function"]["name"], "a");
        assert_eq!(defs[1]["function"]["name"], "b");
    }
}
