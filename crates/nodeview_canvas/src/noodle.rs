// SPDX-License-Identifier: MIT OR Apache-2.0
//! Noodles: the curves drawn between connected ports.

use egui::epaint::CubicBezierShape;
use egui::{Color32, Pos2, Stroke};
use nodeview_graph::PortAddress;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a noodle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoodleId(pub Uuid);

impl NoodleId {
    /// Create a new unique noodle ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NoodleId {
    fn default() -> Self {
        Self::new()
    }
}

/// Control points of the curve from `start` to `end`.
///
/// The first control point sits a quarter of the way across and a tenth of
/// the way down, the second three quarters across and nine tenths down.
pub fn control_points(start: Pos2, end: Pos2) -> [Pos2; 4] {
    let delta = end - start;
    [
        start,
        Pos2::new(start.x + delta.x * 0.25, start.y + delta.y * 0.1),
        Pos2::new(start.x + delta.x * 0.75, start.y + delta.y * 0.9),
        end,
    ]
}

/// A curve between an output port and an input port
#[derive(Debug, Clone, PartialEq)]
pub struct Noodle {
    id: NoodleId,
    source: PortAddress,
    target: PortAddress,
    shape: CubicBezierShape,
}

impl Noodle {
    /// Create a noodle between two port centres
    pub fn new(source: PortAddress, target: PortAddress, start: Pos2, end: Pos2, stroke: Stroke) -> Self {
        Self {
            id: NoodleId::new(),
            source,
            target,
            shape: CubicBezierShape::from_points_stroke(
                control_points(start, end),
                false,
                Color32::TRANSPARENT,
                stroke,
            ),
        }
    }

    /// Noodle ID
    pub fn id(&self) -> NoodleId {
        self.id
    }

    /// Output end
    pub fn source(&self) -> &PortAddress {
        &self.source
    }

    /// Input end
    pub fn target(&self) -> &PortAddress {
        &self.target
    }

    /// Whether either end is on `node`
    pub fn touches(&self, node: &str) -> bool {
        self.source.node == node || self.target.node == node
    }

    /// Start point
    pub fn start(&self) -> Pos2 {
        self.shape.points[0]
    }

    /// End point
    pub fn end(&self) -> Pos2 {
        self.shape.points[3]
    }

    /// Curve control points
    pub fn points(&self) -> [Pos2; 4] {
        self.shape.points
    }

    /// Paintable shape
    pub fn shape(&self) -> &CubicBezierShape {
        &self.shape
    }

    /// Re-route the curve between new end points
    pub fn update(&mut self, start: Pos2, end: Pos2) {
        self.shape.points = control_points(start, end);
    }
}
