// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure owning every live node.

use crate::connection::{ConnectOutcome, ConnectRejection, Connection};
use crate::events::{EventBus, EventKind, GraphEvent, SubscriptionId};
use crate::node::Node;
use crate::port::{Port, PortAddress, PortDirection};
use crate::registry::NodeRegistry;
use indexmap::map::Entry;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What `create_node` does when the name is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NamePolicy {
    /// Fail with [`GraphError::DuplicateName`]
    #[default]
    Reject,
    /// Detach and replace the existing node
    Replace,
}

/// A node graph
#[derive(Debug)]
pub struct Graph {
    registry: Arc<NodeRegistry>,
    bus: EventBus,
    nodes: IndexMap<String, Node>,
    name_policy: NamePolicy,
}

impl Graph {
    /// Create a new empty graph publishing on `bus`
    pub fn new(registry: Arc<NodeRegistry>, bus: EventBus) -> Self {
        Self {
            registry,
            bus,
            nodes: IndexMap::new(),
            name_policy: NamePolicy::default(),
        }
    }

    /// Set the name collision policy
    pub fn with_name_policy(mut self, policy: NamePolicy) -> Self {
        self.name_policy = policy;
        self
    }

    /// Name collision policy
    pub fn name_policy(&self) -> NamePolicy {
        self.name_policy
    }

    /// The registry nodes are instantiated from
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// The bus this graph publishes on
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Create a bare node of a registered kind.
    ///
    /// The name defaults to the kind name. Publishes `NodeCreated`; ports and
    /// parameters are added by the caller (see [`Graph::instantiate`]).
    pub fn create_node(&mut self, kind: &str, name: Option<&str>) -> Result<&mut Node, GraphError> {
        let name = name.unwrap_or(kind);
        let Some(node) = self.registry.instantiate(kind, name, self.bus.clone()) else {
            tracing::warn!(kind, "could not find node kind in registry");
            return Err(GraphError::UnknownKind(kind.to_string()));
        };

        if self.nodes.contains_key(name) {
            match self.name_policy {
                NamePolicy::Reject => {
                    tracing::warn!(name, "node name already in use");
                    return Err(GraphError::DuplicateName(name.to_string()));
                }
                NamePolicy::Replace => {
                    tracing::warn!(name, "replacing existing node");
                    self.detach(name);
                }
            }
        }

        self.bus.publish_immediate(GraphEvent::NodeCreated {
            name: name.to_string(),
            kind: node.kind_name().to_string(),
            base_type: node.base_type().clone(),
        });

        let node = match self.nodes.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(node);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(node),
        };
        Ok(node)
    }

    /// Create a node and populate its registered ports and parameters
    pub fn instantiate(&mut self, kind: &str, name: Option<&str>) -> Result<&mut Node, GraphError> {
        let node = self.create_node(kind, name)?;
        node.add_registered_ports();
        node.add_registered_parameters();
        Ok(node)
    }

    /// Drop every node
    pub fn clear_nodes(&mut self) {
        tracing::debug!(count = self.nodes.len(), "clearing nodes");
        self.nodes.clear();
        self.bus.publish_immediate(GraphEvent::NodesCleared);
    }

    /// Get a node by name
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Get a mutable node by name
    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.get_mut(name)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node names
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Resolve a port address
    pub fn port(&self, address: &PortAddress) -> Result<&Port, GraphError> {
        let node = self
            .nodes
            .get(&address.node)
            .ok_or_else(|| GraphError::NodeNotFound(address.node.clone()))?;
        node.port(address.direction, &address.port)
            .ok_or_else(|| GraphError::PortNotFound(address.clone()))
    }

    /// Connect two ports.
    ///
    /// `from` is the initiating side: when it is an input, `to` is taken as
    /// the source. Rule violations change nothing and publish nothing.
    pub fn connect(&mut self, from: &PortAddress, to: &PortAddress) -> Result<ConnectOutcome, GraphError> {
        let from_port = self.port(from)?;
        self.port(to)?;

        if from.node == to.node {
            return Ok(ConnectOutcome::Rejected(ConnectRejection::SameNode));
        }
        if !from_port.can_connect(to.direction) {
            return Ok(ConnectOutcome::Rejected(ConnectRejection::SameDirection));
        }
        if from_port.is_connected_to(to) {
            return Ok(ConnectOutcome::Rejected(ConnectRejection::AlreadyConnected));
        }

        self.port_mut(from)?.add_peer(to.clone());
        self.port_mut(to)?.add_peer(from.clone());

        let (source, target) = match from.direction {
            PortDirection::Input => (to, from),
            PortDirection::Output => (from, to),
        };
        let connection = Connection::new(&source.node, &source.port, &target.node, &target.port);
        tracing::debug!(
            from = %connection.from_node,
            to = %connection.to_node,
            "connected ports"
        );
        self.bus.publish_deferred(GraphEvent::PortConnected {
            from_node: connection.from_node.clone(),
            to_node: connection.to_node.clone(),
            port_in: connection.to_port.clone(),
            port_out: connection.from_port.clone(),
        });
        Ok(ConnectOutcome::Connected(connection))
    }

    /// Connect `from_node.port_out` to `to_node.port_in`
    pub fn connect_names(
        &mut self,
        from_node: &str,
        port_out: &str,
        to_node: &str,
        port_in: &str,
    ) -> Result<ConnectOutcome, GraphError> {
        self.connect(
            &PortAddress::output(from_node, port_out),
            &PortAddress::input(to_node, port_in),
        )
    }

    /// Apply a request event published by a view.
    ///
    /// Returns `Ok(None)` for events that are not requests.
    pub fn apply_request(&mut self, event: &GraphEvent) -> Result<Option<ConnectOutcome>, GraphError> {
        match event {
            GraphEvent::ConnectRequested {
                from_node,
                to_node,
                port_in,
                port_out,
            } => self
                .connect_names(from_node, port_out, to_node, port_in)
                .map(Some),
            _ => Ok(None),
        }
    }

    /// Subscribe a shared graph to `ConnectRequested` events.
    ///
    /// The handler locks the graph, so callers must not hold that lock
    /// while flushing.
    pub fn attach_requests(graph: &Arc<Mutex<Graph>>, bus: &EventBus) -> SubscriptionId {
        let graph = Arc::clone(graph);
        bus.subscribe(EventKind::ConnectRequested, move |event| {
            match graph.lock().apply_request(event) {
                Ok(Some(ConnectOutcome::Rejected(reason))) => {
                    tracing::debug!(?reason, "connect request rejected");
                }
                Ok(_) => {}
                Err(err) => tracing::warn!("connect request failed: {err}"),
            }
        })
    }

    /// Every connection once, as output -> input
    pub fn connections(&self) -> Vec<Connection> {
        let mut connections = Vec::new();
        for node in self.nodes.values() {
            for port in node.output_ports() {
                for peer in port.peers() {
                    connections.push(Connection::new(node.name(), port.name(), &peer.node, &peer.port));
                }
            }
        }
        connections
    }

    fn port_mut(&mut self, address: &PortAddress) -> Result<&mut Port, GraphError> {
        let node = self
            .nodes
            .get_mut(&address.node)
            .ok_or_else(|| GraphError::NodeNotFound(address.node.clone()))?;
        node.port_mut(address.direction, &address.port)
            .ok_or_else(|| GraphError::PortNotFound(address.clone()))
    }

    /// Remove every back-reference other nodes hold to `name`
    fn detach(&mut self, name: &str) {
        let peers: Vec<String> = match self.nodes.get(name) {
            Some(node) => node
                .ports()
                .flat_map(|port| port.peers().iter().map(|peer| peer.node.clone()))
                .collect(),
            None => return,
        };
        for peer in peers {
            if let Some(node) = self.nodes.get_mut(&peer) {
                for port in node.ports_mut() {
                    port.remove_peers_on(name);
                }
            }
        }
    }
}

/// Error from a graph operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Kind not registered
    #[error("Unknown node kind: {0}")]
    UnknownKind(String),

    /// Name collision under [`NamePolicy::Reject`]
    #[error("Node name already in use: {0}")]
    DuplicateName(String),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(PortAddress),
}
