// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::port::PortAddress;
use serde::{Deserialize, Serialize};

/// A connection between an output port and an input port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Source node name
    pub from_node: String,
    /// Source (output) port name
    pub from_port: String,
    /// Target node name
    pub to_node: String,
    /// Target (input) port name
    pub to_port: String,
}

impl Connection {
    /// Create a new connection
    pub fn new(
        from_node: impl Into<String>,
        from_port: impl Into<String>,
        to_node: impl Into<String>,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            from_node: from_node.into(),
            from_port: from_port.into(),
            to_node: to_node.into(),
            to_port: to_port.into(),
        }
    }

    /// Address of the output end
    pub fn source(&self) -> PortAddress {
        PortAddress::output(&self.from_node, &self.from_port)
    }

    /// Address of the input end
    pub fn target(&self) -> PortAddress {
        PortAddress::input(&self.to_node, &self.to_port)
    }
}

/// Why a connect request changed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectRejection {
    /// Both ports belong to the same node
    SameNode,
    /// Both ports have the same direction
    SameDirection,
    /// The ports are already connected
    AlreadyConnected,
}

/// Result of a well-formed connect request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A new connection was recorded and published
    Connected(Connection),
    /// Connection rules forbid the request; nothing changed
    Rejected(ConnectRejection),
}

impl ConnectOutcome {
    /// Whether a new connection was made
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}
