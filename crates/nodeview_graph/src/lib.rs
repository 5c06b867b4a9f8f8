// SPDX-License-Identifier: MIT OR Apache-2.0
//! Observable node graph for renderer scene descriptions.
//!
//! This crate provides the headless model behind the viewer:
//! - Nodes, ports and typed parameters
//! - A deferred event bus that decouples the graph from its observers
//! - A node-kind registry built from a schema provider
//! - Scene file loading and saving
//!
//! ## Architecture
//!
//! The [`Graph`] owns every node. Mutations publish [`GraphEvent`]s onto an
//! [`EventBus`]; views subscribe per [`EventKind`] and only observe changes
//! when the bus is flushed. Ports refer to their peers by name
//! ([`PortAddress`]), never by reference.

pub mod connection;
pub mod events;
pub mod graph;
pub mod node;
pub mod parameter;
pub mod port;
pub mod registry;
pub mod scene;
pub mod schema;

pub use connection::{ConnectOutcome, ConnectRejection, Connection};
pub use events::{Delivery, EventBus, EventKind, FlushStats, GraphEvent, PendingEvents, SubscriptionId};
pub use graph::{Graph, GraphError, NamePolicy};
pub use node::{BaseType, Node};
pub use parameter::{ParamHints, ParamType, ParamValue, Parameter, ParameterError};
pub use port::{Port, PortAddress, PortDirection};
pub use registry::{NodeKind, NodeRegistry, DEFAULT_OUTPUT_PORT};
pub use scene::{capture_scene, populate_graph, LoadMode, LoadReport, SceneDocument, SceneError, SceneLink, SceneNode};
pub use schema::{NodeEntry, ParamEntry, SchemaError, SchemaProvider, StaticSchema};
