// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene files: the persisted form of a graph.
//!
//! A scene lists nodes with their explicitly set parameter values and the
//! links that feed their input parameters. Loading builds the graph in two
//! passes so links may refer to nodes declared later in the file.

use crate::graph::{Graph, GraphError};
use crate::parameter::{ParamValue, ParameterError};
use crate::port::PortAddress;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scene format version
pub const SCENE_FORMAT_VERSION: u32 = 1;

/// Node name the scene root uses; never instantiated
pub const ROOT_NODE: &str = "root";

/// Nodes supplying a linked parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SceneLink {
    /// A single supplying node
    Single(String),
    /// Several supplying nodes (array parameters)
    Many(Vec<String>),
}

impl SceneLink {
    /// Supplying node names in order
    pub fn targets(&self) -> &[String] {
        match self {
            Self::Single(name) => std::slice::from_ref(name),
            Self::Many(names) => names,
        }
    }
}

/// One node in a scene file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    /// Node name
    pub name: String,
    /// Kind name
    pub kind: String,
    /// Explicitly set parameter values
    #[serde(default)]
    pub values: IndexMap<String, ParamValue>,
    /// Linked parameters
    #[serde(default)]
    pub links: IndexMap<String, SceneLink>,
}

impl SceneNode {
    /// Create a node entry with no values or links
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            values: IndexMap::new(),
            links: IndexMap::new(),
        }
    }

    /// Set a parameter value
    pub fn with_value(mut self, param: impl Into<String>, value: ParamValue) -> Self {
        self.values.insert(param.into(), value);
        self
    }

    /// Link a parameter
    pub fn with_link(mut self, param: impl Into<String>, link: SceneLink) -> Self {
        self.links.insert(param.into(), link);
        self
    }
}

/// A scene file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Nodes in file order
    #[serde(default)]
    pub nodes: Vec<SceneNode>,
}

fn default_version() -> u32 {
    SCENE_FORMAT_VERSION
}

impl Default for SceneDocument {
    fn default() -> Self {
        Self {
            version: SCENE_FORMAT_VERSION,
            nodes: Vec::new(),
        }
    }
}

impl SceneDocument {
    /// Build from nodes
    pub fn new(nodes: Vec<SceneNode>) -> Self {
        Self {
            version: SCENE_FORMAT_VERSION,
            nodes,
        }
    }

    /// Get a node by name
    pub fn node(&self, name: &str) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Parse RON text
    pub fn from_ron_str(text: &str) -> Result<Self, SceneError> {
        let document: Self = ron::from_str(text)?;
        if document.version > SCENE_FORMAT_VERSION {
            return Err(SceneError::UnsupportedVersion(document.version));
        }
        Ok(document)
    }

    /// Render as pretty RON
    pub fn to_ron_string(&self) -> Result<String, SceneError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load a scene file
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Save a scene file
    pub fn save(&self, path: &Path) -> Result<(), SceneError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }
}

/// How much of each kind's registered structure a load creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadMode {
    /// Every registered port
    #[default]
    Full,
    /// Only the output port and the ports the scene actually uses
    Preview,
}

/// A link whose supplying node or port could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingLink {
    /// Node holding the linked parameter
    pub node: String,
    /// Linked parameter
    pub param: String,
    /// Name the link refers to
    pub target: String,
}

/// What a scene load did and skipped
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Nodes created, in file order
    pub created: Vec<String>,
    /// Scene nodes that could not be created
    pub skipped: Vec<(String, GraphError)>,
    /// Values that were not restored
    pub rejected_values: Vec<ParameterError>,
    /// Values naming parameters the kind does not have
    pub unknown_params: Vec<(String, String)>,
    /// Links that could not be connected
    pub dangling_links: Vec<DanglingLink>,
    /// Connections made
    pub connections: usize,
}

impl LoadReport {
    /// Whether everything in the scene was loaded
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
            && self.rejected_values.is_empty()
            && self.unknown_params.is_empty()
            && self.dangling_links.is_empty()
    }
}

/// Build the nodes and connections of `document` into `graph`
pub fn populate_graph(graph: &mut Graph, document: &SceneDocument, mode: LoadMode) -> LoadReport {
    let mut report = LoadReport::default();

    for scene_node in &document.nodes {
        if scene_node.name == ROOT_NODE {
            continue;
        }
        match create_scene_node(graph, scene_node, mode, &mut report) {
            Ok(()) => report.created.push(scene_node.name.clone()),
            Err(err) => {
                tracing::warn!(node = %scene_node.name, "skipping scene node: {err}");
                report.skipped.push((scene_node.name.clone(), err));
            }
        }
    }

    for scene_node in &document.nodes {
        if !report.created.contains(&scene_node.name) {
            continue;
        }
        for (param, link) in &scene_node.links {
            for target in link.targets() {
                connect_link(graph, &scene_node.name, param, target, &mut report);
            }
        }
    }

    tracing::info!(
        nodes = report.created.len(),
        connections = report.connections,
        skipped = report.skipped.len(),
        "scene loaded"
    );
    report
}

fn create_scene_node(
    graph: &mut Graph,
    scene_node: &SceneNode,
    mode: LoadMode,
    report: &mut LoadReport,
) -> Result<(), GraphError> {
    let node = graph.create_node(&scene_node.kind, Some(&scene_node.name))?;
    if mode == LoadMode::Full {
        node.add_registered_ports();
    }
    node.add_registered_parameters();

    let source_port = node.kind().source_port().to_string();
    node.add_output_port(&source_port);

    let link_params: Vec<String> = node
        .parameters()
        .filter(|param| param.param_type().is_node_link())
        .map(|param| param.name().to_string())
        .collect();
    for param in link_params.iter().chain(scene_node.links.keys()) {
        node.add_input_port(param);
    }

    for (name, value) in &scene_node.values {
        let Some(param) = node.parameter_mut(name) else {
            tracing::warn!(node = %scene_node.name, param = %name, "unknown parameter in scene");
            report
                .unknown_params
                .push((scene_node.name.clone(), name.clone()));
            continue;
        };
        if let Err(err) = param.set_value(value.clone()) {
            tracing::warn!(node = %scene_node.name, "{err}");
            report.rejected_values.push(err);
        }
    }
    Ok(())
}

fn connect_link(graph: &mut Graph, node: &str, param: &str, target: &str, report: &mut LoadReport) {
    let dangling = || DanglingLink {
        node: node.to_string(),
        param: param.to_string(),
        target: target.to_string(),
    };
    let Some(source) = graph.node(target) else {
        tracing::warn!(node, param, target, "link refers to a missing node");
        report.dangling_links.push(dangling());
        return;
    };
    let from = PortAddress::output(target, source.kind().source_port());
    let to = PortAddress::input(node, param);

    match graph.connect(&from, &to) {
        Ok(outcome) if outcome.is_connected() => report.connections += 1,
        Ok(outcome) => tracing::debug!(node, param, target, ?outcome, "link not connected"),
        Err(err) => {
            tracing::warn!(node, param, target, "cannot connect link: {err}");
            report.dangling_links.push(dangling());
        }
    }
}

/// Capture `graph` as a scene document.
///
/// Every connected input port becomes a link; array parameters and ports
/// with several peers are written as [`SceneLink::Many`].
pub fn capture_scene(graph: &Graph) -> SceneDocument {
    let nodes = graph
        .nodes()
        .map(|node| {
            let values = node
                .parameters()
                .filter_map(|param| {
                    param
                        .explicit_value()
                        .map(|value| (param.name().to_string(), value.clone()))
                })
                .collect();

            let links = node
                .input_ports()
                .filter(|port| !port.peers().is_empty())
                .map(|port| {
                    let targets: Vec<String> = port.peers().iter().map(|peer| peer.node.clone()).collect();
                    let is_array = node
                        .parameter(port.name())
                        .is_some_and(|param| param.param_type().is_node_array());
                    let link = match targets.as_slice() {
                        [single] if !is_array => SceneLink::Single(single.clone()),
                        _ => SceneLink::Many(targets),
                    };
                    (port.name().to_string(), link)
                })
                .collect();

            SceneNode {
                name: node.name().to_string(),
                kind: node.kind_name().to_string(),
                values,
                links,
            }
        })
        .collect();

    SceneDocument::new(nodes)
}

/// Error reading or writing a scene file
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Invalid scene file: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Cannot serialize scene: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer version
    #[error("Scene version {0} is newer than supported version {SCENE_FORMAT_VERSION}")]
    UnsupportedVersion(u32),
}
