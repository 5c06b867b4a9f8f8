// SPDX-License-Identifier: MIT OR Apache-2.0
//! Catalog of node kinds derived from a schema provider.

use crate::events::EventBus;
use crate::node::{BaseType, Node};
use crate::parameter::{ParamType, Parameter};
use crate::schema::{NodeEntry, SchemaError, SchemaProvider};
use indexmap::IndexMap;
use std::sync::Arc;

/// Name of the output port synthesized for kinds without an output type
pub const DEFAULT_OUTPUT_PORT: &str = "out";

/// Template a node is instantiated from
#[derive(Debug, Clone, PartialEq)]
pub struct NodeKind {
    /// Kind name
    pub name: String,
    /// Base type
    pub base_type: BaseType,
    /// Declared output type
    pub output_type: Option<ParamType>,
    /// Input ports a new node pre-populates
    pub input_ports: Vec<String>,
    /// Output ports a new node pre-populates
    pub output_ports: Vec<String>,
    /// Parameter templates cloned onto new nodes
    pub parameters: Vec<Parameter>,
}

impl NodeKind {
    /// Derive ports and parameter templates from a schema entry.
    ///
    /// Outputs: one port named after the declared output type, otherwise
    /// [`DEFAULT_OUTPUT_PORT`], except `options` which has no output.
    /// Inputs: shaders expose colour and float parameters; every other base
    /// type exposes only node and node-array parameters.
    pub fn from_entry(entry: &NodeEntry) -> Result<Self, SchemaError> {
        let output_ports = match (&entry.output_type, &entry.base_type) {
            (Some(output_type), _) => vec![output_type.type_name().to_string()],
            (None, BaseType::Options) => Vec::new(),
            (None, _) => vec![DEFAULT_OUTPUT_PORT.to_string()],
        };

        let mut input_ports = Vec::new();
        let mut parameters = Vec::with_capacity(entry.params.len());
        for param in &entry.params {
            let exposed = match entry.base_type {
                BaseType::Shader => param.param_type.is_shading_input(),
                _ => param.param_type.is_node_link(),
            };
            if exposed {
                input_ports.push(param.name.clone());
            }

            let default = param.resolved_default();
            if !default.matches(&param.param_type) {
                return Err(SchemaError::InvalidDefault {
                    kind: entry.name.clone(),
                    param: param.name.clone(),
                });
            }
            let mut template = Parameter::new(param.name.clone(), param.param_type.clone(), default);
            if param.param_type == ParamType::Enum {
                template = template.with_enum_options(param.enum_options.clone());
            }
            parameters.push(template);
        }

        Ok(Self {
            name: entry.name.clone(),
            base_type: entry.base_type.clone(),
            output_type: entry.output_type.clone(),
            input_ports,
            output_ports,
            parameters,
        })
    }

    /// Output port that links from this kind attach to
    pub fn source_port(&self) -> &str {
        self.output_ports
            .first()
            .map_or(DEFAULT_OUTPUT_PORT, String::as_str)
    }

    /// Get a parameter template by name
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }
}

/// Registry of available node kinds
#[derive(Debug, Default)]
pub struct NodeRegistry {
    kinds: IndexMap<String, Arc<NodeKind>>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from every kind the provider reports
    pub fn from_schema(provider: &dyn SchemaProvider) -> Result<Self, SchemaError> {
        let entries = provider.node_entries()?;
        let mut registry = Self::new();
        for entry in &entries {
            if registry.contains(&entry.name) {
                return Err(SchemaError::DuplicateKind(entry.name.clone()));
            }
            registry.register(NodeKind::from_entry(entry)?);
        }
        tracing::info!(kinds = registry.len(), "registered node kinds");
        Ok(registry)
    }

    /// Register a node kind, replacing any kind with the same name
    pub fn register(&mut self, kind: NodeKind) {
        self.kinds.insert(kind.name.clone(), Arc::new(kind));
    }

    /// Get a node kind by name
    pub fn get(&self, name: &str) -> Option<&Arc<NodeKind>> {
        self.kinds.get(name)
    }

    /// Whether a kind is registered
    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// Get all registered kinds
    pub fn kinds(&self) -> impl Iterator<Item = &NodeKind> {
        self.kinds.values().map(|kind| &**kind)
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Kind names grouped by base type, each group sorted
    pub fn kinds_by_base_type(&self) -> IndexMap<BaseType, Vec<&str>> {
        let mut groups: IndexMap<BaseType, Vec<&str>> = IndexMap::new();
        for kind in self.kinds.values() {
            groups
                .entry(kind.base_type.clone())
                .or_default()
                .push(kind.name.as_str());
        }
        for names in groups.values_mut() {
            names.sort_unstable();
        }
        groups
    }

    /// Create a bare node (no ports, no parameters) of a registered kind
    pub fn instantiate(&self, kind: &str, name: &str, bus: EventBus) -> Option<Node> {
        let Some(kind) = self.kinds.get(kind) else {
            tracing::error!(kind, "node kind not registered");
            return None;
        };
        Some(Node::new(name, Arc::clone(kind), bus))
    }
}
