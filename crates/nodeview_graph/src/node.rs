// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::events::{EventBus, GraphEvent};
use crate::parameter::Parameter;
use crate::port::{Port, PortDirection};
use crate::registry::NodeKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Coarse category of a node kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BaseType {
    /// Global render options
    Options,
    /// Cameras
    Camera,
    /// Lights
    Light,
    /// Geometry
    Shape,
    /// Shading networks
    Shader,
    /// Overrides
    Override,
    /// Output drivers
    Driver,
    /// Pixel filters
    Filter,
    /// Colour management
    ColorManager,
    /// Scene operators
    Operator,
    /// Anything the schema reports that is not listed above
    Other(String),
}

impl BaseType {
    /// Parse a schema base type name
    pub fn from_name(name: &str) -> Self {
        match name {
            "options" => Self::Options,
            "camera" => Self::Camera,
            "light" => Self::Light,
            "shape" => Self::Shape,
            "shader" => Self::Shader,
            "override" => Self::Override,
            "driver" => Self::Driver,
            "filter" => Self::Filter,
            "color_manager" => Self::ColorManager,
            "operator" => Self::Operator,
            other => Self::Other(other.to_string()),
        }
    }

    /// Schema name of this base type
    pub fn as_str(&self) -> &str {
        match self {
            Self::Options => "options",
            Self::Camera => "camera",
            Self::Light => "light",
            Self::Shape => "shape",
            Self::Shader => "shader",
            Self::Override => "override",
            Self::Driver => "driver",
            Self::Filter => "filter",
            Self::ColorManager => "color_manager",
            Self::Operator => "operator",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for BaseType {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<BaseType> for String {
    fn from(base_type: BaseType) -> Self {
        base_type.as_str().to_string()
    }
}

impl std::fmt::Display for BaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node instance in the graph.
///
/// Adding ports publishes events on the bus the node was created with.
/// Connections are made through [`crate::Graph::connect`] because they
/// touch two nodes.
#[derive(Debug)]
pub struct Node {
    name: String,
    kind: Arc<NodeKind>,
    parameters: IndexMap<String, Parameter>,
    inputs: IndexMap<String, Port>,
    outputs: IndexMap<String, Port>,
    bus: EventBus,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, kind: Arc<NodeKind>, bus: EventBus) -> Self {
        Self {
            name: name.into(),
            kind,
            parameters: IndexMap::new(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            bus,
        }
    }

    /// Node name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind this node was instantiated from
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Kind name
    pub fn kind_name(&self) -> &str {
        &self.kind.name
    }

    /// Base type of the kind
    pub fn base_type(&self) -> &BaseType {
        &self.kind.base_type
    }

    /// Add every port the kind declares
    pub fn add_registered_ports(&mut self) {
        let kind = Arc::clone(&self.kind);
        for port in &kind.input_ports {
            self.add_input_port(port);
        }
        for port in &kind.output_ports {
            self.add_output_port(port);
        }
    }

    /// Clone every parameter template of the kind onto this node
    pub fn add_registered_parameters(&mut self) {
        for template in &self.kind.parameters {
            self.parameters
                .insert(template.name().to_string(), template.clone());
        }
    }

    /// Get a parameter by name
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    /// Get a mutable parameter by name
    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters.get_mut(name)
    }

    /// All parameters
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    /// Add an input port. Returns `false` if it already exists.
    pub fn add_input_port(&mut self, name: &str) -> bool {
        if self.inputs.contains_key(name) {
            return false;
        }
        self.inputs
            .insert(name.to_string(), Port::new(name, PortDirection::Input));
        self.bus.publish_immediate(GraphEvent::InputPortAdded {
            node: self.name.clone(),
            port: name.to_string(),
        });
        true
    }

    /// Add an output port. Returns `false` if it already exists.
    pub fn add_output_port(&mut self, name: &str) -> bool {
        if self.outputs.contains_key(name) {
            return false;
        }
        self.outputs
            .insert(name.to_string(), Port::new(name, PortDirection::Output));
        self.bus.publish_immediate(GraphEvent::OutputPortAdded {
            node: self.name.clone(),
            port: name.to_string(),
        });
        true
    }

    /// Get an input port by name
    pub fn input_port(&self, name: &str) -> Option<&Port> {
        self.inputs.get(name)
    }

    /// Get an output port by name
    pub fn output_port(&self, name: &str) -> Option<&Port> {
        self.outputs.get(name)
    }

    /// Get a port by direction and name
    pub fn port(&self, direction: PortDirection, name: &str) -> Option<&Port> {
        match direction {
            PortDirection::Input => self.inputs.get(name),
            PortDirection::Output => self.outputs.get(name),
        }
    }

    pub(crate) fn port_mut(&mut self, direction: PortDirection, name: &str) -> Option<&mut Port> {
        match direction {
            PortDirection::Input => self.inputs.get_mut(name),
            PortDirection::Output => self.outputs.get_mut(name),
        }
    }

    /// Input ports in creation order
    pub fn input_ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.values()
    }

    /// Output ports in creation order
    pub fn output_ports(&self) -> impl Iterator<Item = &Port> {
        self.outputs.values()
    }

    /// Get all ports
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.values().chain(self.outputs.values())
    }

    pub(crate) fn ports_mut(&mut self) -> impl Iterator<Item = &mut Port> {
        self.inputs.values_mut().chain(self.outputs.values_mut())
    }
}
