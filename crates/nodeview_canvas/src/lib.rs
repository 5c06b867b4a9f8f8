// SPDX-License-Identifier: MIT OR Apache-2.0
//! Views over a NodeView graph.
//!
//! This crate mirrors a [`nodeview_graph::Graph`] without ever reading it
//! directly:
//! - [`GraphCanvas`] rebuilds nodes, ports and noodles from bus events
//! - [`ParameterPanel`] follows the selection and describes editor rows
//! - [`LayoutEngine`] re-positions canvas nodes with a pluggable solver
//!
//! Geometry and colours use `egui` value types so a GUI can paint the
//! canvas as is.

pub mod canvas;
pub mod layout;
pub mod noodle;
pub mod panel;
pub mod solver;
pub mod style;

pub use canvas::{GraphCanvas, NodeItem, PortItem, DEFAULT_FOCUS_PADDING, DEFAULT_SCENE_SIZE};
pub use layout::{LayoutConfig, LayoutEngine, LayoutError, LayoutReport};
pub use noodle::{Noodle, NoodleId};
pub use panel::{FieldEdit, FieldWidget, PanelError, ParameterField, ParameterPanel};
pub use solver::{LayeredSolver, LayoutGraph, LayoutSolver, SolverError};
pub use style::{NodeColors, NodeStyle};
