// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node-type introspection boundary.
//!
//! A [`SchemaProvider`] enumerates the node kinds a renderer knows about.
//! [`StaticSchema`] is a file-backed provider so the registry can be built
//! without the renderer present.

use crate::node::BaseType;
use crate::parameter::{ParamType, ParamValue};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One parameter as reported by the schema provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamEntry {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub param_type: ParamType,
    /// Default value; the type's zero value when absent
    #[serde(default)]
    pub default: Option<ParamValue>,
    /// Ordered options of an enum parameter
    #[serde(default)]
    pub enum_options: Vec<String>,
}

impl ParamEntry {
    /// Create an entry with the type's zero value as default
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            default: None,
            enum_options: Vec::new(),
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: ParamValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Set enum options
    pub fn with_enum_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Resolved default: explicit value, first enum option, or zero value
    pub fn resolved_default(&self) -> ParamValue {
        if let Some(value) = &self.default {
            return value.clone();
        }
        match (&self.param_type, self.enum_options.first()) {
            (ParamType::Enum, Some(first)) => ParamValue::Enum(first.clone()),
            (param_type, _) => ParamValue::default_for(param_type),
        }
    }
}

/// One node kind as reported by the schema provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Kind name
    pub name: String,
    /// Base type
    pub base_type: BaseType,
    /// Output type, if the kind declares one
    #[serde(default)]
    pub output_type: Option<ParamType>,
    /// Parameters in declaration order
    #[serde(default)]
    pub params: Vec<ParamEntry>,
}

impl NodeEntry {
    /// Create an entry with no output type and no parameters
    pub fn new(name: impl Into<String>, base_type: BaseType) -> Self {
        Self {
            name: name.into(),
            base_type,
            output_type: None,
            params: Vec::new(),
        }
    }

    /// Declare the output type
    pub fn with_output(mut self, output_type: ParamType) -> Self {
        self.output_type = Some(output_type);
        self
    }

    /// Append a parameter
    pub fn with_param(mut self, param: ParamEntry) -> Self {
        self.params.push(param);
        self
    }
}

/// Source of node kind definitions
pub trait SchemaProvider {
    /// Enumerate every node kind
    fn node_entries(&self) -> Result<Vec<NodeEntry>, SchemaError>;
}

/// Schema held in memory, typically loaded from a RON or JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticSchema {
    /// Node kinds
    pub nodes: Vec<NodeEntry>,
}

impl StaticSchema {
    /// Build from entries
    pub fn new(nodes: Vec<NodeEntry>) -> Self {
        Self { nodes }
    }

    /// Parse RON text
    pub fn from_ron_str(text: &str) -> Result<Self, SchemaError> {
        Ok(ron::from_str(text)?)
    }

    /// Parse JSON text
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a schema file; `.json` files are parsed as JSON, anything else as RON
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_ron_str(&content),
        }
    }
}

impl SchemaProvider for StaticSchema {
    fn node_entries(&self) -> Result<Vec<NodeEntry>, SchemaError> {
        Ok(self.nodes.clone())
    }
}

/// Error while reading or validating a schema
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON parse error
    #[error("Invalid RON schema: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// JSON parse error
    #[error("Invalid JSON schema: {0}")]
    Json(#[from] serde_json::Error),

    /// Two kinds share a name
    #[error("Node kind {0} declared twice")]
    DuplicateKind(String),

    /// A default value does not match its parameter type
    #[error("Default of {kind}.{param} does not match its type")]
    InvalidDefault {
        /// Kind name
        kind: String,
        /// Parameter name
        param: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ron_schema() {
        let text = r#"(
            nodes: [
                (
                    name: "lambert",
                    base_type: "shader",
                    output_type: Some(Rgb),
                    params: [
                        (name: "Kd", param_type: Float, default: Some(Float(0.7))),
                        (name: "mode", param_type: Enum, enum_options: ["a", "b"]),
                    ],
                ),
                (name: "options", base_type: "options"),
            ],
        )"#;
        let schema = StaticSchema::from_ron_str(text).unwrap();
        assert_eq!(schema.nodes.len(), 2);
        assert_eq!(schema.nodes[0].base_type, BaseType::Shader);
        assert_eq!(schema.nodes[0].params[1].resolved_default(), ParamValue::Enum("a".into()));
        assert!(schema.nodes[1].params.is_empty());
    }

    #[test]
    fn test_parse_json_schema() {
        let text = r#"{"nodes": [{"name": "polymesh", "base_type": "shape",
            "params": [{"name": "shader", "param_type": {"Array": "Node"}}]}]}"#;
        let schema = StaticSchema::from_json_str(text).unwrap();
        let param = &schema.nodes[0].params[0];
        assert!(param.param_type.is_node_array());
        assert_eq!(param.resolved_default(), ParamValue::Array(Vec::new()));
    }
}
