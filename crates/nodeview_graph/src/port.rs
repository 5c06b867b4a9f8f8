// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use serde::{Deserialize, Serialize};

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

impl PortDirection {
    /// The direction a port must have to connect to this one
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }

    /// Short label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "in",
            Self::Output => "out",
        }
    }
}

/// Name-based address of a port inside a graph.
///
/// Ports never hold references to other ports; peers are recorded as
/// addresses and resolved through the owning graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortAddress {
    /// Owning node name
    pub node: String,
    /// Port name
    pub port: String,
    /// Port direction
    pub direction: PortDirection,
}

impl PortAddress {
    /// Address of an input port
    pub fn input(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
            direction: PortDirection::Input,
        }
    }

    /// Address of an output port
    pub fn output(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
            direction: PortDirection::Output,
        }
    }
}

impl std::fmt::Display for PortAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} ({})", self.node, self.port, self.direction.as_str())
    }
}

/// A port on a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    name: String,
    direction: PortDirection,
    peers: Vec<PortAddress>,
}

impl Port {
    /// Create an unconnected port
    pub fn new(name: impl Into<String>, direction: PortDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            peers: Vec::new(),
        }
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Port direction
    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    /// Ports connected to this one
    pub fn peers(&self) -> &[PortAddress] {
        &self.peers
    }

    /// Whether `other` is already a peer
    pub fn is_connected_to(&self, other: &PortAddress) -> bool {
        self.peers.contains(other)
    }

    /// Check if a connection to a port of `direction` is valid
    pub fn can_connect(&self, direction: PortDirection) -> bool {
        self.direction == direction.opposite()
    }

    pub(crate) fn add_peer(&mut self, peer: PortAddress) {
        if !self.peers.contains(&peer) {
            self.peers.push(peer);
        }
    }

    pub(crate) fn remove_peers_on(&mut self, node: &str) {
        self.peers.retain(|peer| peer.node != node);
    }
}
