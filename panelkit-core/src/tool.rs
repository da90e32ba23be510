//! Tool descriptors: the adapter table from structured tool calls to
//! inbound panel events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::event::PanelEvent;

/// `source` of events produced from tool calls
pub const TOOL_SOURCE: &str = "tool-call";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallTemplate {
    /// Inbound event type the call is emitted as
    pub event: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments
    pub inputs: Value,
    /// JSON schema of what the triggered notification carries
    pub outputs: Value,
    pub tags: Vec<String>,
    pub tool_call_template: ToolCallTemplate,
}

fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {}, "required": [] })
}

fn add_property(schema: &mut Value, name: &str, kind: &str, description: &str, required: bool) {
    if let Some(props) = schema.get_mut("properties").and_then(Value::as_object_mut) {
        props.insert(name.to_string(), json!({ "type": kind, "description": description }));
    }
    if required {
        if let Some(list) = schema.get_mut("required").and_then(Value::as_array_mut) {
            list.push(Value::String(name.to_string()));
        }
    }
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str, event: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            inputs: empty_schema(),
            outputs: empty_schema(),
            tags: Vec::new(),
            tool_call_template: ToolCallTemplate {
                event: event.to_string(),
            },
        }
    }

    pub fn input(mut self, name: &str, kind: &str, description: &str) -> Self {
        add_property(&mut self.inputs, name, kind, description, true);
        self
    }

    pub fn optional_input(mut self, name: &str, kind: &str, description: &str) -> Self {
        add_property(&mut self.inputs, name, kind, description, false);
        self
    }

    pub fn output(mut self, name: &str, kind: &str, description: &str) -> Self {
        add_property(&mut self.outputs, name, kind, description, true);
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn event(&self) -> &str {
        &self.tool_call_template.event
    }

    pub fn required_inputs(&self) -> Vec<&str> {
        self.inputs
            .get("required")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    UnknownTool { name: String },
    /// Arguments are not a JSON object
    InvalidArguments { tool: String },
    MissingArgument { tool: String, argument: String },
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTool { name } => write!(f, "unknown tool: {}", name),
            Self::InvalidArguments { tool } => write!(f, "arguments for {} must be an object", tool),
            Self::MissingArgument { tool, argument } => {
                write!(f, "{} requires argument '{}'", tool, argument)
            }
        }
    }
}

impl std::error::Error for ToolError {}

#[derive(Clone, Debug)]
struct RegisteredTool {
    panel_id: String,
    descriptor: ToolDescriptor,
}

/// Tools of every registered panel, addressable by tool name
#[derive(Clone, Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, panel_id: &str, tools: Vec<ToolDescriptor>) {
        for descriptor in tools {
            self.tools.insert(
                descriptor.name.clone(),
                RegisteredTool {
                    panel_id: panel_id.to_string(),
                    descriptor,
                },
            );
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name).map(|t| &t.descriptor)
    }

    /// Panel that owns tool `name`
    pub fn panel_of(&self, name: &str) -> Option<&str> {
        self.tools.get(name).map(|t| t.panel_id.as_str())
    }

    pub fn for_panel<'a>(&'a self, panel_id: &'a str) -> impl Iterator<Item = &'a ToolDescriptor> + 'a {
        self.tools
            .values()
            .filter(move |t| t.panel_id == panel_id)
            .map(|t| &t.descriptor)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values().map(|t| &t.descriptor)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Turn a tool call into the inbound event it triggers
    pub fn invoke(&self, name: &str, args: Value) -> Result<PanelEvent, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;

        let args = match args {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => {
                return Err(ToolError::InvalidArguments {
                    tool: name.to_string(),
                });
            }
        };

        if let Some(missing) = tool.required_inputs().into_iter().find(|r| !args.contains_key(*r)) {
            return Err(ToolError::MissingArgument {
                tool: name.to_string(),
                argument: missing.to_string(),
            });
        }

        Ok(PanelEvent::new(tool.event(), TOOL_SOURCE, Value::Object(args)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(
            "user-collections",
            vec![
                ToolDescriptor::new("create_collection", "Create a collection", "user-collections:create-collection")
                    .input("name", "string", "Collection name")
                    .optional_input("description", "string", "Optional description")
                    .output("collection", "object", "The created collection")
                    .tags(&["collections", "create"]),
            ],
        );
        registry
    }

    #[test]
    fn test_invoke_builds_inbound_event() {
        let event = registry()
            .invoke("create_collection", json!({ "name": "Reading" }))
            .unwrap();
        assert_eq!(event.event_type, "user-collections:create-collection");
        assert_eq!(event.source, TOOL_SOURCE);
        assert_eq!(event.payload["name"], "Reading");
    }

    #[test]
    fn test_invoke_validates_arguments() {
        let registry = registry();
        assert_eq!(
            registry.invoke("create_collection", json!({})).unwrap_err(),
            ToolError::MissingArgument {
                tool: "create_collection".into(),
                argument: "name".into()
            }
        );
        assert!(matches!(
            registry.invoke("create_collection", json!([1])),
            Err(ToolError::InvalidArguments { .. })
        ));
        assert!(matches!(
            registry.invoke("nope", Value::Null),
            Err(ToolError::UnknownTool { .. })
        ));
    }

    #[test]
    fn test_descriptor_schema_shape() {
        let registry = registry();
        let tool = registry.get("create_collection").unwrap();
        assert_eq!(tool.required_inputs(), vec!["name"]);
        assert_eq!(tool.inputs["properties"]["description"]["type"], "string");
        assert_eq!(registry.panel_of("create_collection"), Some("user-collections"));

        let json = serde_json::to_value(tool).unwrap();
        assert_eq!(json["tool_call_template"]["event"], "user-collections:create-collection");
    }
}
