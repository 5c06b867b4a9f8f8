// SPDX-License-Identifier: MIT OR Apache-2.0
//! Automatic node placement.
//!
//! The engine hands the connectivity of the target nodes to a
//! [`LayoutSolver`], then re-projects the solved positions so the result
//! stays centred where the nodes were before and keeps roughly the solver's
//! proportions.

use crate::canvas::{GraphCanvas, DEFAULT_FOCUS_PADDING};
use crate::solver::{LayeredSolver, LayoutGraph, LayoutSolver, SolverError};
use egui::{Pos2, Rect, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Result type for layout operations
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Layout settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Per-axis scale applied to solver space
    pub scale: [f32; 2],
    /// Padding used when fitting the view afterwards
    pub padding: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            scale: [1.4, 1.8],
            padding: DEFAULT_FOCUS_PADDING,
        }
    }
}

/// What a layout pass did
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutReport {
    /// Nodes that were moved
    pub nodes: Vec<String>,
    /// Edges the solver saw
    pub edges: usize,
    /// Bounds of the original positions
    pub original_bounds: Rect,
    /// Bounds of the new positions
    pub new_bounds: Rect,
}

/// Places nodes on a canvas with a pluggable solver
pub struct LayoutEngine {
    solver: Option<Box<dyn LayoutSolver + Send>>,
    config: LayoutConfig,
}

impl std::fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("solver", &self.solver.as_ref().map(|solver| solver.name().to_string()))
            .field("config", &self.config)
            .finish()
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(Some(Box::new(LayeredSolver::default())), LayoutConfig::default())
    }
}

impl LayoutEngine {
    /// Create an engine; `None` means no solver is available
    pub fn new(solver: Option<Box<dyn LayoutSolver + Send>>, config: LayoutConfig) -> Self {
        Self { solver, config }
    }

    /// Engine without a solver
    pub fn unavailable(config: LayoutConfig) -> Self {
        Self::new(None, config)
    }

    /// Layout settings
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Whether a solver is installed
    pub fn has_solver(&self) -> bool {
        self.solver.is_some()
    }

    /// Lay out `targets`, the selection, or every node, in that order of preference.
    ///
    /// Nothing on the canvas changes unless the solver positions every target.
    pub fn position_nodes(&self, canvas: &mut GraphCanvas, targets: Option<&[String]>) -> Result<LayoutReport> {
        let Some(solver) = &self.solver else {
            return Err(LayoutError::SolverUnavailable);
        };

        let names: Vec<String> = match targets {
            Some(names) if !names.is_empty() => names.to_vec(),
            _ if !canvas.selection().is_empty() => canvas.selection().to_vec(),
            _ => canvas.nodes().map(|node| node.name.clone()).collect(),
        };

        let mut original = IndexMap::with_capacity(names.len());
        let mut graph = LayoutGraph::new();
        for name in &names {
            let node = canvas
                .node(name)
                .ok_or_else(|| LayoutError::NodeNotFound(name.clone()))?;
            original.insert(name.clone(), node.position);
            graph.add_node(name.clone(), node.size);
        }
        if original.is_empty() {
            return Err(LayoutError::NothingToLayout);
        }
        for name in &names {
            let Some(node) = canvas.node(name) else { continue };
            for port in node.outputs() {
                for peer in &port.peers {
                    graph.add_edge(name, &peer.node);
                }
            }
        }

        tracing::debug!(
            solver = solver.name(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "solving layout"
        );
        let solved = solver.solve(&graph)?;
        let mut placed = IndexMap::with_capacity(original.len());
        for name in original.keys() {
            let position = solved
                .get(name)
                .copied()
                .ok_or_else(|| LayoutError::MissingPosition(name.clone()))?;
            placed.insert(name.clone(), position);
        }

        let original_bounds = bounds(original.values().copied());
        let solved_bounds = bounds(placed.values().copied());
        let scale = Vec2::from(self.config.scale);
        let project = |point: Pos2| {
            let offset = point - solved_bounds.center();
            original_bounds.center() + Vec2::new(offset.x * scale.x, offset.y * scale.y)
        };

        for (name, position) in &placed {
            canvas.move_node(name, project(*position));
        }
        canvas.refresh_noodles();
        canvas.focus(&names, self.config.padding);

        let new_bounds = bounds(placed.values().map(|position| project(*position)));
        tracing::info!(nodes = names.len(), edges = graph.edge_count(), "positioned nodes");
        Ok(LayoutReport {
            nodes: names,
            edges: graph.edge_count(),
            original_bounds,
            new_bounds,
        })
    }
}

fn bounds(points: impl Iterator<Item = Pos2>) -> Rect {
    let points: Vec<Pos2> = points.collect();
    Rect::from_points(&points)
}

/// Error from a layout pass
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    /// No solver is installed
    #[error("No layout solver is available")]
    SolverUnavailable,

    /// There are no nodes to position
    #[error("No nodes to lay out")]
    NothingToLayout,

    /// A target is not on the canvas
    #[error("Node not found on canvas: {0}")]
    NodeNotFound(String),

    /// The solver returned no position for a target
    #[error("Solver returned no position for {0}")]
    MissingPosition(String),

    /// The solver failed
    #[error(transparent)]
    Solver(#[from] SolverError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeview_graph::{BaseType, GraphEvent};

    fn canvas_with(nodes: &[&str], edges: &[(&str, &str)]) -> GraphCanvas {
        let mut canvas = GraphCanvas::default();
        for name in nodes {
            canvas.handle_event(&GraphEvent::NodeCreated {
                name: (*name).into(),
                kind: "standard".into(),
                base_type: BaseType::Shader,
            });
            canvas.handle_event(&GraphEvent::InputPortAdded {
                node: (*name).into(),
                port: "in".into(),
            });
            canvas.handle_event(&GraphEvent::OutputPortAdded {
                node: (*name).into(),
                port: "out".into(),
            });
        }
        for (from, to) in edges {
            canvas.handle_event(&GraphEvent::PortConnected {
                from_node: (*from).into(),
                to_node: (*to).into(),
                port_in: "in".into(),
                port_out: "out".into(),
            });
        }
        canvas
    }

    fn assert_close(a: Pos2, b: Pos2) {
        assert!((a - b).length() < 1e-2, "{a:?} != {b:?}");
    }

    fn positions(canvas: &GraphCanvas) -> Vec<Pos2> {
        canvas.nodes().map(|node| node.position).collect()
    }

    struct Forgetful;

    impl LayoutSolver for Forgetful {
        fn name(&self) -> &str {
            "forgetful"
        }

        fn solve(&self, _graph: &LayoutGraph) -> std::result::Result<IndexMap<String, Pos2>, SolverError> {
            Ok(IndexMap::from([("A".to_string(), Pos2::ZERO)]))
        }
    }

    #[test]
    fn test_five_nodes_run_left_to_right() {
        let mut canvas = canvas_with(
            &["A", "B", "C", "D", "E"],
            &[("A", "B"), ("B", "C"), ("A", "D"), ("D", "E")],
        );
        let engine = LayoutEngine::default();
        let report = engine.position_nodes(&mut canvas, None).unwrap();

        assert_eq!(report.nodes.len(), 5);
        assert_eq!(report.edges, 4);
        let x = |name: &str| canvas.position(name).unwrap().x;
        assert!(x("A") < x("B") && x("B") < x("C"));
        assert!(x("A") < x("D") && x("D") < x("E"));

        // All nodes started at the scene centre, so that stays the centre
        assert_close(report.new_bounds.center(), report.original_bounds.center());
    }

    #[test]
    fn test_unconnected_nodes_stay_inside_new_bounds() {
        let names = ["A", "B", "C", "D", "E"];
        let mut canvas = canvas_with(&names, &[]);
        let engine = LayoutEngine::default();
        assert!(engine.has_solver());
        let report = engine.position_nodes(&mut canvas, None).unwrap();
        assert_eq!(report.nodes.len(), 5);
        assert_eq!(report.edges, 0);

        let placed: Vec<Pos2> = names.iter().map(|name| canvas.position(name).unwrap()).collect();
        for (index, position) in placed.iter().enumerate() {
            assert!(report.new_bounds.contains(*position));
            assert!(placed[index + 1..].iter().all(|other| other != position));
        }
        for name in names {
            assert!(canvas.viewport().contains_rect(canvas.node(name).unwrap().rect()));
        }
    }

    #[test]
    fn test_noodles_follow_new_positions() {
        let mut canvas = canvas_with(&["A", "B"], &[("A", "B")]);
        LayoutEngine::default().position_nodes(&mut canvas, None).unwrap();

        let a = canvas.node("A").unwrap();
        let b = canvas.node("B").unwrap();
        let noodle = canvas.noodles().next().unwrap();
        assert_eq!(noodle.start(), a.port_centre(nodeview_graph::PortDirection::Output, "out").unwrap());
        assert_eq!(noodle.end(), b.port_centre(nodeview_graph::PortDirection::Input, "in").unwrap());
        assert!(canvas.viewport().contains_rect(a.rect().union(b.rect())));
    }

    #[test]
    fn test_scale_is_anchored_at_original_centre() {
        let mut canvas = canvas_with(&["A", "B"], &[("A", "B")]);
        canvas.move_node("A", Pos2::new(0.0, 0.0));
        canvas.move_node("B", Pos2::new(1000.0, 1000.0));

        let report = LayoutEngine::default().position_nodes(&mut canvas, None).unwrap();
        assert_close(report.original_bounds.center(), Pos2::new(500.0, 500.0));
        assert_close(report.new_bounds.center(), Pos2::new(500.0, 500.0));

        // Solver puts B one column (100 wide + 80 gap) right of A
        let a = canvas.position("A").unwrap();
        let b = canvas.position("B").unwrap();
        assert!((b.x - a.x - 180.0 * 1.4).abs() < 1e-3);
        assert_eq!(a.y, b.y);
    }

    #[test]
    fn test_targets_and_selection() {
        let mut canvas = canvas_with(&["A", "B", "C"], &[("A", "B")]);
        let before_c = canvas.position("C").unwrap();
        canvas.move_node("A", Pos2::new(10.0, 10.0));
        let targets = vec!["A".to_string(), "B".to_string()];
        let report = LayoutEngine::default().position_nodes(&mut canvas, Some(&targets)).unwrap();
        assert_eq!(report.nodes, targets);
        assert_eq!(canvas.position("C").unwrap(), before_c);

        canvas.select(&["C".to_string()], &nodeview_graph::EventBus::new());
        let report = LayoutEngine::default().position_nodes(&mut canvas, None).unwrap();
        assert_eq!(report.nodes, vec!["C".to_string()]);
        assert_eq!(report.edges, 0);
    }

    #[test]
    fn test_missing_solver_changes_nothing() {
        let mut canvas = canvas_with(&["A", "B"], &[("A", "B")]);
        canvas.move_node("B", Pos2::new(3.0, 4.0));
        let before = positions(&canvas);
        let viewport = canvas.viewport();

        let engine = LayoutEngine::unavailable(LayoutConfig::default());
        assert!(!engine.has_solver());
        assert_eq!(
            engine.position_nodes(&mut canvas, None).unwrap_err(),
            LayoutError::SolverUnavailable
        );
        assert_eq!(positions(&canvas), before);
        assert_eq!(canvas.viewport(), viewport);
    }

    #[test]
    fn test_missing_position_changes_nothing() {
        let mut canvas = canvas_with(&["A", "B"], &[]);
        canvas.move_node("B", Pos2::new(3.0, 4.0));
        let before = positions(&canvas);

        let engine = LayoutEngine::new(Some(Box::new(Forgetful)), LayoutConfig::default());
        assert_eq!(
            engine.position_nodes(&mut canvas, None).unwrap_err(),
            LayoutError::MissingPosition("B".to_string())
        );
        assert_eq!(positions(&canvas), before);
    }

    #[test]
    fn test_empty_canvas() {
        let mut canvas = GraphCanvas::default();
        assert_eq!(
            LayoutEngine::default().position_nodes(&mut canvas, None).unwrap_err(),
            LayoutError::NothingToLayout
        );
    }
}
