// SPDX-License-Identifier: MIT OR Apache-2.0
//! Presentation shadow of the graph.
//!
//! [`GraphCanvas`] never reads the model. It is rebuilt purely from the
//! events the graph publishes, so it can lag behind the model until the bus
//! is flushed.

use crate::noodle::{Noodle, NoodleId};
use crate::style::{NodeColors, NodeStyle};
use egui::{Pos2, Rect, Vec2};
use indexmap::IndexMap;
use nodeview_graph::{BaseType, EventBus, EventKind, GraphEvent, PortAddress, PortDirection, SubscriptionId};
use parking_lot::Mutex;
use std::sync::Arc;

/// Node visual dimensions
const NODE_MIN_WIDTH: f32 = 100.0;
const NODE_MIN_HEIGHT: f32 = 60.0;
const CHAR_WIDTH: f32 = 8.0;
const PORT_SPACING: f32 = 20.0;
const NODE_PADDING: f32 = 10.0;
const PORT_SIZE: f32 = 10.0;

/// Side length of the default scene
pub const DEFAULT_SCENE_SIZE: f32 = 32000.0;

/// Padding around nodes when fitting the view
pub const DEFAULT_FOCUS_PADDING: f32 = 60.0;

/// A port drawn on a node
#[derive(Debug, Clone, PartialEq)]
pub struct PortItem {
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Centre relative to the node's top-left corner
    pub offset: Vec2,
    /// Connected presentation ports
    pub peers: Vec<PortAddress>,
}

impl PortItem {
    fn new(name: &str, direction: PortDirection) -> Self {
        Self {
            name: name.to_string(),
            direction,
            offset: Vec2::ZERO,
            peers: Vec::new(),
        }
    }
}

/// A node drawn on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct NodeItem {
    /// Node name
    pub name: String,
    /// Kind name
    pub kind: String,
    /// Base type
    pub base_type: BaseType,
    /// Top-left corner in scene coordinates
    pub position: Pos2,
    /// Width and height
    pub size: Vec2,
    /// Fill and label colours
    pub colors: NodeColors,
    inputs: IndexMap<String, PortItem>,
    outputs: IndexMap<String, PortItem>,
}

impl NodeItem {
    fn new(name: &str, kind: &str, base_type: BaseType, colors: NodeColors) -> Self {
        let mut item = Self {
            name: name.to_string(),
            kind: kind.to_string(),
            base_type,
            position: Pos2::ZERO,
            size: Vec2::ZERO,
            colors,
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
        };
        item.relayout();
        item
    }

    /// Scene rectangle
    pub fn rect(&self) -> Rect {
        Rect::from_min_size(self.position, self.size)
    }

    /// Scene centre
    pub fn centre(&self) -> Pos2 {
        self.rect().center()
    }

    /// Input ports in creation order
    pub fn inputs(&self) -> impl Iterator<Item = &PortItem> {
        self.inputs.values()
    }

    /// Output ports in creation order
    pub fn outputs(&self) -> impl Iterator<Item = &PortItem> {
        self.outputs.values()
    }

    /// Get a port by direction and name
    pub fn port(&self, direction: PortDirection, name: &str) -> Option<&PortItem> {
        match direction {
            PortDirection::Input => self.inputs.get(name),
            PortDirection::Output => self.outputs.get(name),
        }
    }

    fn port_mut(&mut self, direction: PortDirection, name: &str) -> Option<&mut PortItem> {
        match direction {
            PortDirection::Input => self.inputs.get_mut(name),
            PortDirection::Output => self.outputs.get_mut(name),
        }
    }

    /// Scene position of a port centre
    pub fn port_centre(&self, direction: PortDirection, name: &str) -> Option<Pos2> {
        self.port(direction, name).map(|port| self.position + port.offset)
    }

    /// Scene rectangle of a port
    pub fn port_rect(&self, direction: PortDirection, name: &str) -> Option<Rect> {
        self.port_centre(direction, name)
            .map(|centre| Rect::from_center_size(centre, Vec2::splat(PORT_SIZE)))
    }

    fn add_port(&mut self, name: &str, direction: PortDirection) -> bool {
        let ports = match direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        };
        if ports.contains_key(name) {
            return false;
        }
        ports.insert(name.to_string(), PortItem::new(name, direction));
        self.relayout();
        true
    }

    /// Recompute the node size and spread ports evenly along each edge
    fn relayout(&mut self) {
        let chars = self.name.chars().count().max(self.kind.chars().count()) as f32;
        let width = NODE_MIN_WIDTH.max(chars * CHAR_WIDTH + NODE_PADDING);
        let rows = self.inputs.len().max(self.outputs.len()) as f32;
        let height = NODE_MIN_HEIGHT.max(rows * PORT_SPACING + NODE_PADDING);
        self.size = Vec2::new(width, height);

        distribute(&mut self.inputs, 0.0, height);
        distribute(&mut self.outputs, width, height);
    }

    fn remove_peers_on(&mut self, node: &str) {
        for port in self.inputs.values_mut().chain(self.outputs.values_mut()) {
            port.peers.retain(|peer| peer.node != node);
        }
    }
}

/// Place `n` ports at the interior points of `linspace(0, height, n + 2)`
fn distribute(ports: &mut IndexMap<String, PortItem>, x: f32, height: f32) {
    let step = height / (ports.len() + 1) as f32;
    for (index, port) in ports.values_mut().enumerate() {
        port.offset = Vec2::new(x, step * (index + 1) as f32);
    }
}

fn port_centre(nodes: &IndexMap<String, NodeItem>, address: &PortAddress) -> Option<Pos2> {
    nodes
        .get(&address.node)?
        .port_centre(address.direction, &address.port)
}

/// Reactive presentation of a graph
#[derive(Debug)]
pub struct GraphCanvas {
    scene_rect: Rect,
    style: NodeStyle,
    nodes: IndexMap<String, NodeItem>,
    noodles: IndexMap<NoodleId, Noodle>,
    selection: Vec<String>,
    viewport: Rect,
}

impl Default for GraphCanvas {
    fn default() -> Self {
        Self::new(
            Rect::from_min_size(Pos2::ZERO, Vec2::splat(DEFAULT_SCENE_SIZE)),
            NodeStyle::default(),
        )
    }
}

impl GraphCanvas {
    /// Create an empty canvas over `scene_rect`
    pub fn new(scene_rect: Rect, style: NodeStyle) -> Self {
        Self {
            scene_rect,
            style,
            nodes: IndexMap::new(),
            noodles: IndexMap::new(),
            selection: Vec::new(),
            viewport: scene_rect,
        }
    }

    /// Subscribe a shared canvas to every model event it mirrors.
    ///
    /// The handlers lock the canvas, so callers must not hold that lock
    /// while flushing.
    pub fn attach(canvas: &Arc<Mutex<Self>>, bus: &EventBus) -> Vec<SubscriptionId> {
        [
            EventKind::NodeCreated,
            EventKind::InputPortAdded,
            EventKind::OutputPortAdded,
            EventKind::PortConnected,
            EventKind::NodesCleared,
        ]
        .into_iter()
        .map(|kind| {
            let canvas = Arc::clone(canvas);
            bus.subscribe(kind, move |event| canvas.lock().handle_event(event))
        })
        .collect()
    }

    /// Apply one model event
    pub fn handle_event(&mut self, event: &GraphEvent) {
        match event {
            GraphEvent::NodeCreated { name, kind, base_type } => {
                self.add_node(name, kind, base_type);
            }
            GraphEvent::InputPortAdded { node, port } => {
                self.add_port(node, port, PortDirection::Input);
            }
            GraphEvent::OutputPortAdded { node, port } => {
                self.add_port(node, port, PortDirection::Output);
            }
            GraphEvent::PortConnected {
                from_node,
                to_node,
                port_in,
                port_out,
            } => {
                self.connect_ports(
                    &PortAddress::output(from_node, port_out),
                    &PortAddress::input(to_node, port_in),
                );
            }
            GraphEvent::NodesCleared => self.clear(),
            GraphEvent::NodesSelected { .. } | GraphEvent::ConnectRequested { .. } => {}
        }
    }

    fn add_node(&mut self, name: &str, kind: &str, base_type: &BaseType) {
        if self.nodes.contains_key(name) {
            tracing::debug!(name, "replacing presentation node");
            self.remove_node(name);
        }
        let mut item = NodeItem::new(name, kind, base_type.clone(), self.style.colors_for(base_type));
        item.position = self.scene_rect.center() - item.size / 2.0;
        self.nodes.insert(name.to_string(), item);
    }

    fn add_port(&mut self, node: &str, port: &str, direction: PortDirection) {
        let Some(item) = self.nodes.get_mut(node) else {
            tracing::warn!(node, port, "port added to unknown presentation node");
            return;
        };
        if item.add_port(port, direction) {
            self.refresh_noodles_of(node);
        }
    }

    /// Record a connection and draw its noodle.
    ///
    /// Returns `false` when either end is missing or already connected.
    fn connect_ports(&mut self, source: &PortAddress, target: &PortAddress) -> bool {
        let (Some(start), Some(end)) = (port_centre(&self.nodes, source), port_centre(&self.nodes, target)) else {
            tracing::warn!(%source, %target, "dropping connection with a dangling end");
            return false;
        };

        let Some(out_port) = self
            .nodes
            .get_mut(&source.node)
            .and_then(|node| node.port_mut(source.direction, &source.port))
        else {
            return false;
        };
        if out_port.peers.contains(target) {
            tracing::debug!(%source, %target, "presentation ports already connected");
            return false;
        }
        out_port.peers.push(target.clone());
        if let Some(in_port) = self
            .nodes
            .get_mut(&target.node)
            .and_then(|node| node.port_mut(target.direction, &target.port))
        {
            in_port.peers.push(source.clone());
        }

        let noodle = Noodle::new(source.clone(), target.clone(), start, end, self.style.noodle_stroke());
        self.noodles.insert(noodle.id(), noodle);
        true
    }

    fn remove_node(&mut self, name: &str) {
        self.nodes.shift_remove(name);
        for node in self.nodes.values_mut() {
            node.remove_peers_on(name);
        }
        self.noodles.retain(|_, noodle| !noodle.touches(name));
        self.selection.retain(|selected| selected != name);
    }

    /// Discard every node, noodle and the selection
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.noodles.clear();
        self.selection.clear();
        self.viewport = self.scene_rect;
    }

    /// Scene rectangle
    pub fn scene_rect(&self) -> Rect {
        self.scene_rect
    }

    /// Style in use
    pub fn style(&self) -> &NodeStyle {
        &self.style
    }

    /// Get a presentation node by name
    pub fn node(&self, name: &str) -> Option<&NodeItem> {
        self.nodes.get(name)
    }

    /// All presentation nodes
    pub fn nodes(&self) -> impl Iterator<Item = &NodeItem> {
        self.nodes.values()
    }

    /// Number of presentation nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All noodles
    pub fn noodles(&self) -> impl Iterator<Item = &Noodle> {
        self.noodles.values()
    }

    /// Number of noodles
    pub fn noodle_count(&self) -> usize {
        self.noodles.len()
    }

    /// Top-left corner of a node
    pub fn position(&self, name: &str) -> Option<Pos2> {
        self.nodes.get(name).map(|node| node.position)
    }

    /// Move a node and re-route every noodle attached to it
    pub fn move_node(&mut self, name: &str, position: Pos2) -> bool {
        let Some(node) = self.nodes.get_mut(name) else {
            return false;
        };
        node.position = position;
        self.refresh_noodles_of(name);
        true
    }

    /// Move a node by a delta, as a drag does
    pub fn drag_node(&mut self, name: &str, delta: Vec2) -> bool {
        match self.position(name) {
            Some(position) => self.move_node(name, position + delta),
            None => false,
        }
    }

    fn refresh_noodles_of(&mut self, name: &str) {
        let nodes = &self.nodes;
        for noodle in self.noodles.values_mut().filter(|noodle| noodle.touches(name)) {
            if let (Some(start), Some(end)) = (
                port_centre(nodes, noodle.source()),
                port_centre(nodes, noodle.target()),
            ) {
                noodle.update(start, end);
            }
        }
    }

    /// Re-route every noodle from live port centres
    pub fn refresh_noodles(&mut self) {
        let nodes = &self.nodes;
        for noodle in self.noodles.values_mut() {
            if let (Some(start), Some(end)) = (
                port_centre(nodes, noodle.source()),
                port_centre(nodes, noodle.target()),
            ) {
                noodle.update(start, end);
            }
        }
    }

    /// Currently selected node names
    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    /// Replace the selection and publish `NodesSelected`
    pub fn select(&mut self, names: &[String], bus: &EventBus) {
        self.selection = names
            .iter()
            .filter(|name| {
                let known = self.nodes.contains_key(name.as_str());
                if !known {
                    tracing::warn!(name = %name, "cannot select unknown node");
                }
                known
            })
            .cloned()
            .collect();
        bus.publish_immediate(GraphEvent::NodesSelected {
            names: self.selection.clone(),
        });
    }

    /// Ask the model to connect two presentation ports, as a drag release does.
    ///
    /// Either end may be the output. Returns `false` without publishing when
    /// the pair cannot form an output to input connection.
    pub fn request_connect(&self, from: &PortAddress, to: &PortAddress, bus: &EventBus) -> bool {
        let (source, target) = match (from.direction, to.direction) {
            (PortDirection::Output, PortDirection::Input) => (from, to),
            (PortDirection::Input, PortDirection::Output) => (to, from),
            _ => return false,
        };
        if source.node == target.node
            || port_centre(&self.nodes, source).is_none()
            || port_centre(&self.nodes, target).is_none()
        {
            return false;
        }
        bus.publish_immediate(GraphEvent::ConnectRequested {
            from_node: source.node.clone(),
            to_node: target.node.clone(),
            port_in: target.port.clone(),
            port_out: source.port.clone(),
        });
        true
    }

    /// Union of node rectangles grown by `padding`; all nodes when `names` is empty
    pub fn united_rect(&self, names: &[String], padding: f32) -> Option<Rect> {
        let rects: Vec<Rect> = if names.is_empty() {
            self.nodes.values().map(NodeItem::rect).collect()
        } else {
            names
                .iter()
                .filter_map(|name| self.nodes.get(name).map(NodeItem::rect))
                .collect()
        };
        rects
            .into_iter()
            .reduce(Rect::union)
            .map(|rect| rect.expand(padding))
    }

    /// Fit the viewport to the given nodes, or all nodes when none are given
    pub fn focus(&mut self, names: &[String], padding: f32) -> bool {
        match self.united_rect(names, padding) {
            Some(rect) => {
                self.viewport = rect;
                true
            }
            None => false,
        }
    }

    /// Scene region the view shows
    pub fn viewport(&self) -> Rect {
        self.viewport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(name: &str, kind: &str, base_type: BaseType) -> GraphEvent {
        GraphEvent::NodeCreated {
            name: name.into(),
            kind: kind.into(),
            base_type,
        }
    }

    fn input(node: &str, port: &str) -> GraphEvent {
        GraphEvent::InputPortAdded {
            node: node.into(),
            port: port.into(),
        }
    }

    fn output(node: &str, port: &str) -> GraphEvent {
        GraphEvent::OutputPortAdded {
            node: node.into(),
            port: port.into(),
        }
    }

    fn connected(from: &str, port_out: &str, to: &str, port_in: &str) -> GraphEvent {
        GraphEvent::PortConnected {
            from_node: from.into(),
            to_node: to.into(),
            port_in: port_in.into(),
            port_out: port_out.into(),
        }
    }

    fn two_nodes() -> GraphCanvas {
        let mut canvas = GraphCanvas::default();
        for event in [
            created("A", "standard", BaseType::Shader),
            output("A", "out"),
            created("B", "polymesh", BaseType::Shape),
            input("B", "in"),
        ] {
            canvas.handle_event(&event);
        }
        canvas
    }

    #[test]
    fn test_new_node_centred_in_scene() {
        let canvas = two_nodes();
        let node = canvas.node("A").unwrap();
        assert_eq!(node.size, Vec2::new(100.0, 60.0));
        assert_eq!(node.centre(), Pos2::new(16000.0, 16000.0));
        assert_eq!(node.colors, NodeStyle::default().colors_for(&BaseType::Shader));
    }

    #[test]
    fn test_node_size_follows_labels_and_ports() {
        let mut canvas = GraphCanvas::default();
        canvas.handle_event(&created("a_rather_long_name", "x", BaseType::Shader));
        assert_eq!(canvas.node("a_rather_long_name").unwrap().size.x, 18.0 * 8.0 + 10.0);

        for port in ["p0", "p1", "p2", "p3"] {
            canvas.handle_event(&input("a_rather_long_name", port));
        }
        let node = canvas.node("a_rather_long_name").unwrap();
        assert_eq!(node.size.y, 90.0);
        let offsets: Vec<f32> = node.inputs().map(|port| port.offset.y).collect();
        assert_eq!(offsets, vec![18.0, 36.0, 54.0, 72.0]);
        assert!(node.inputs().all(|port| port.offset.x == 0.0));
    }

    #[test]
    fn test_single_port_at_midpoint() {
        let canvas = two_nodes();
        let node = canvas.node("A").unwrap();
        let centre = node.port_centre(PortDirection::Output, "out").unwrap();
        assert_eq!(centre, node.position + Vec2::new(100.0, 30.0));
        assert_eq!(
            node.port_rect(PortDirection::Output, "out").unwrap().size(),
            Vec2::splat(10.0)
        );
    }

    #[test]
    fn test_port_connected_draws_one_noodle() {
        let mut canvas = two_nodes();
        canvas.handle_event(&connected("A", "out", "B", "in"));
        assert_eq!(canvas.noodle_count(), 1);

        let noodle = canvas.noodles().next().unwrap();
        let a = canvas.node("A").unwrap();
        let b = canvas.node("B").unwrap();
        assert_eq!(noodle.start(), a.port_centre(PortDirection::Output, "out").unwrap());
        assert_eq!(noodle.end(), b.port_centre(PortDirection::Input, "in").unwrap());
        assert_eq!(a.port(PortDirection::Output, "out").unwrap().peers.len(), 1);

        canvas.handle_event(&connected("A", "out", "B", "in"));
        assert_eq!(canvas.noodle_count(), 1);
    }

    #[test]
    fn test_dangling_connection_dropped() {
        let mut canvas = two_nodes();
        canvas.handle_event(&connected("A", "out", "Z", "in"));
        canvas.handle_event(&connected("A", "missing", "B", "in"));
        assert_eq!(canvas.noodle_count(), 0);
        assert!(canvas
            .node("A")
            .unwrap()
            .outputs()
            .all(|port| port.peers.is_empty()));
    }

    #[test]
    fn test_dangling_connection_survives_flush() {
        let bus = EventBus::new();
        let canvas = Arc::new(Mutex::new(two_nodes()));
        GraphCanvas::attach(&canvas, &bus);

        bus.publish_deferred(connected("ghost", "out", "B", "in"));
        let stats = bus.flush();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.dropped, 0);
        assert_eq!(canvas.lock().noodle_count(), 0);
    }

    #[test]
    fn test_move_node_reroutes_noodles() {
        let mut canvas = two_nodes();
        canvas.handle_event(&connected("A", "out", "B", "in"));
        assert!(canvas.move_node("B", Pos2::new(500.0, 200.0)));
        let noodle = canvas.noodles().next().unwrap();
        assert_eq!(noodle.end(), Pos2::new(500.0, 230.0));

        assert!(canvas.drag_node("A", Vec2::new(-10.0, 0.0)));
        let start = canvas.noodles().next().unwrap().start();
        assert_eq!(start, canvas.node("A").unwrap().port_centre(PortDirection::Output, "out").unwrap());
        assert!(!canvas.move_node("Z", Pos2::ZERO));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut canvas = two_nodes();
        canvas.handle_event(&connected("A", "out", "B", "in"));
        canvas.select(&["A".to_string()], &EventBus::new());
        canvas.handle_event(&GraphEvent::NodesCleared);
        assert_eq!(canvas.node_count(), 0);
        assert_eq!(canvas.noodle_count(), 0);
        assert!(canvas.selection().is_empty());
    }

    #[test]
    fn test_recreated_node_drops_its_noodles() {
        let mut canvas = two_nodes();
        canvas.handle_event(&connected("A", "out", "B", "in"));
        canvas.handle_event(&created("A", "standard", BaseType::Shader));
        assert_eq!(canvas.noodle_count(), 0);
        assert!(canvas
            .node("B")
            .unwrap()
            .inputs()
            .all(|port| port.peers.is_empty()));
        assert_eq!(canvas.node_count(), 2);
    }

    #[test]
    fn test_select_and_request_connect_publish() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::NodesSelected, EventKind::ConnectRequested] {
            let sink = Arc::clone(&seen);
            bus.subscribe(kind, move |event| sink.lock().push(event.clone()));
        }

        let mut canvas = two_nodes();
        canvas.select(&["B".to_string(), "ghost".to_string()], &bus);
        assert_eq!(canvas.selection(), ["B".to_string()]);

        assert!(canvas.request_connect(&PortAddress::input("B", "in"), &PortAddress::output("A", "out"), &bus));
        assert!(!canvas.request_connect(&PortAddress::input("B", "in"), &PortAddress::input("B", "in"), &bus));
        bus.flush();

        assert_eq!(
            *seen.lock(),
            vec![
                GraphEvent::NodesSelected {
                    names: vec!["B".into()]
                },
                GraphEvent::ConnectRequested {
                    from_node: "A".into(),
                    to_node: "B".into(),
                    port_in: "in".into(),
                    port_out: "out".into(),
                },
            ]
        );
    }

    #[test]
    fn test_united_rect_and_focus() {
        let mut canvas = two_nodes();
        canvas.move_node("A", Pos2::new(0.0, 0.0));
        canvas.move_node("B", Pos2::new(200.0, 100.0));

        let rect = canvas.united_rect(&[], 60.0).unwrap();
        assert_eq!(rect, Rect::from_min_max(Pos2::new(-60.0, -60.0), Pos2::new(360.0, 220.0)));

        let only_a = canvas.united_rect(&["A".to_string()], 0.0).unwrap();
        assert_eq!(only_a, Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 60.0)));

        assert!(canvas.focus(&[], DEFAULT_FOCUS_PADDING));
        assert_eq!(canvas.viewport(), rect);
        assert!(GraphCanvas::default().united_rect(&[], 60.0).is_none());
    }

    #[test]
    fn test_attach_follows_bus() {
        let bus = EventBus::new();
        let canvas = Arc::new(Mutex::new(GraphCanvas::default()));
        let ids = GraphCanvas::attach(&canvas, &bus);
        assert_eq!(ids.len(), 5);

        bus.publish_immediate(created("A", "standard", BaseType::Shader));
        assert_eq!(canvas.lock().node_count(), 0);
        bus.flush();
        assert_eq!(canvas.lock().node_count(), 1);
    }
}
