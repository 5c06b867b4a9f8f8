// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node colours keyed by base type.

use egui::{Color32, Stroke};
use indexmap::IndexMap;
use nodeview_graph::BaseType;
use serde::{Deserialize, Serialize};

/// Fill and label colour of a node, stored as RGBA bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeColors {
    /// Body fill
    pub fill: [u8; 4],
    /// Label text
    pub font: [u8; 4],
}

impl NodeColors {
    /// Create from RGBA bytes
    pub const fn new(fill: [u8; 4], font: [u8; 4]) -> Self {
        Self { fill, font }
    }

    /// Body fill colour
    pub fn fill_color(&self) -> Color32 {
        let [r, g, b, a] = self.fill;
        Color32::from_rgba_unmultiplied(r, g, b, a)
    }

    /// Label colour
    pub fn font_color(&self) -> Color32 {
        let [r, g, b, a] = self.font;
        Color32::from_rgba_unmultiplied(r, g, b, a)
    }
}

impl Default for NodeColors {
    fn default() -> Self {
        Self::new([120, 120, 120, 255], [230, 230, 230, 255])
    }
}

/// Visual style of the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStyle {
    /// Colours for base types without an entry
    pub default: NodeColors,
    /// Colours per base type name
    pub base_types: IndexMap<String, NodeColors>,
    /// Noodle colour
    pub noodle_color: [u8; 4],
    /// Noodle width
    pub noodle_width: f32,
}

impl Default for NodeStyle {
    fn default() -> Self {
        let dark_text = [20, 20, 20, 255];
        let light_text = [230, 230, 230, 255];
        let base_types = [
            ("options", NodeColors::new([200, 200, 200, 255], dark_text)),
            ("camera", NodeColors::new([90, 140, 200, 255], light_text)),
            ("light", NodeColors::new([230, 200, 80, 255], dark_text)),
            ("shape", NodeColors::new([80, 160, 100, 255], light_text)),
            ("shader", NodeColors::new([170, 90, 60, 255], light_text)),
            ("driver", NodeColors::new([110, 80, 150, 255], light_text)),
            ("filter", NodeColors::new([80, 130, 130, 255], light_text)),
        ]
        .into_iter()
        .map(|(name, colors)| (name.to_string(), colors))
        .collect();

        Self {
            default: NodeColors::default(),
            base_types,
            noodle_color: [150, 150, 150, 255],
            noodle_width: 2.0,
        }
    }
}

impl NodeStyle {
    /// Colours for a base type, falling back to the default entry
    pub fn colors_for(&self, base_type: &BaseType) -> NodeColors {
        self.base_types
            .get(base_type.as_str())
            .copied()
            .unwrap_or(self.default)
    }

    /// Noodle stroke
    pub fn noodle_stroke(&self) -> Stroke {
        let [r, g, b, a] = self.noodle_color;
        Stroke::new(self.noodle_width, Color32::from_rgba_unmultiplied(r, g, b, a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colors_fall_back_to_default() {
        let style = NodeStyle::default();
        assert_eq!(style.colors_for(&BaseType::Light).fill, [230, 200, 80, 255]);
        assert_eq!(
            style.colors_for(&BaseType::Other("volume".into())),
            NodeColors::default()
        );
        assert_eq!(style.colors_for(&BaseType::Operator).fill_color(), Color32::from_rgb(120, 120, 120));
    }
}
