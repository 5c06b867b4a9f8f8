// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parameter panel model.
//!
//! Mirrors the current selection and describes, for a single selected node,
//! one editor row per parameter. A GUI paints the rows; edits come back
//! through [`ParameterPanel::commit`].

use nodeview_graph::{EventBus, EventKind, Graph, GraphEvent, ParamType, ParamValue, Parameter, ParameterError, SubscriptionId};
use parking_lot::Mutex;
use std::sync::Arc;

/// Labels of the header rows
const TYPE_LABEL: &str = "type";
const NAME_LABEL: &str = "name";

/// Editor used for one row
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWidget {
    /// Non-editable text
    ReadOnly(String),
    /// Single line text edit
    TextEdit(String),
    /// Checkbox
    Checkbox(bool),
    /// Drop-down with the selected option index
    Select {
        /// Options in order
        options: Vec<String>,
        /// Selected option, if the value is one of the options
        index: Option<usize>,
    },
}

impl FieldWidget {
    /// Whether the row accepts edits
    pub fn is_editable(&self) -> bool {
        !matches!(self, Self::ReadOnly(_))
    }
}

/// One labelled row of the panel
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterField {
    /// Row label, the parameter name for parameter rows
    pub label: String,
    /// Editor
    pub widget: FieldWidget,
}

impl ParameterField {
    fn new(label: impl Into<String>, widget: FieldWidget) -> Self {
        Self {
            label: label.into(),
            widget,
        }
    }
}

/// An edit coming back from a row
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    /// New text of a text edit
    Text(String),
    /// New checkbox state
    Checked(bool),
    /// New option index of a drop-down
    Selected(usize),
}

/// Pick the editor for a parameter
pub fn widget_for(param: &Parameter) -> FieldWidget {
    let value = param.value();
    match param.param_type() {
        ParamType::String | ParamType::Float | ParamType::Byte | ParamType::Int | ParamType::UInt => {
            FieldWidget::TextEdit(value.summary())
        }
        ParamType::Bool => FieldWidget::Checkbox(matches!(value, ParamValue::Bool(true))),
        ParamType::Enum => {
            let options = param.hints().enum_options.clone();
            let index = match value {
                ParamValue::Enum(option) => param.hints().enum_index(option),
                _ => None,
            };
            FieldWidget::Select { options, index }
        }
        ParamType::Rgb
        | ParamType::Rgba
        | ParamType::Vector
        | ParamType::Vector2
        | ParamType::Pointer
        | ParamType::Node
        | ParamType::Matrix
        | ParamType::Array(_) => FieldWidget::ReadOnly(value.summary()),
    }
}

/// Parse text typed into a text edit for a parameter of `param_type`
fn parse_text(param: &str, param_type: &ParamType, text: &str) -> Result<ParamValue, PanelError> {
    let invalid = || PanelError::InvalidInput {
        param: param.to_string(),
        input: text.to_string(),
    };
    let text = text.trim();
    Ok(match param_type {
        ParamType::String => ParamValue::String(text.to_string()),
        ParamType::Float => ParamValue::Float(text.parse().map_err(|_| invalid())?),
        ParamType::Byte => ParamValue::Byte(text.parse().map_err(|_| invalid())?),
        ParamType::Int => ParamValue::Int(text.parse().map_err(|_| invalid())?),
        ParamType::UInt => ParamValue::UInt(text.parse().map_err(|_| invalid())?),
        _ => return Err(PanelError::ReadOnly(param.to_string())),
    })
}

/// Panel state: the selection it mirrors
#[derive(Debug, Clone, Default)]
pub struct ParameterPanel {
    selection: Vec<String>,
}

impl ParameterPanel {
    /// Create an empty panel
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a shared panel to selection changes and scene clears
    pub fn attach(panel: &Arc<Mutex<Self>>, bus: &EventBus) -> Vec<SubscriptionId> {
        [EventKind::NodesSelected, EventKind::NodesCleared]
            .into_iter()
            .map(|kind| {
                let panel = Arc::clone(panel);
                bus.subscribe(kind, move |event| match event {
                    GraphEvent::NodesSelected { names } => panel.lock().set_selection(names.clone()),
                    GraphEvent::NodesCleared => panel.lock().set_selection(Vec::new()),
                    _ => {}
                })
            })
            .collect()
    }

    /// Replace the mirrored selection
    pub fn set_selection(&mut self, names: Vec<String>) {
        self.selection = names;
    }

    /// Mirrored selection
    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    /// The node shown, only when exactly one is selected
    pub fn current(&self) -> Option<&str> {
        match self.selection.as_slice() {
            [name] => Some(name.as_str()),
            _ => None,
        }
    }

    /// Rows for the current node; empty unless exactly one node is selected
    pub fn fields(&self, graph: &Graph) -> Result<Vec<ParameterField>, PanelError> {
        let Some(name) = self.current() else {
            return Ok(Vec::new());
        };
        let node = graph
            .node(name)
            .ok_or_else(|| PanelError::NodeNotFound(name.to_string()))?;

        let mut fields = vec![
            ParameterField::new(TYPE_LABEL, FieldWidget::ReadOnly(node.kind_name().to_string())),
            ParameterField::new(NAME_LABEL, FieldWidget::TextEdit(node.name().to_string())),
        ];
        fields.extend(
            node.parameters()
                .filter(|param| !matches!(param.name(), TYPE_LABEL | NAME_LABEL))
                .map(|param| ParameterField::new(param.name(), widget_for(param))),
        );
        Ok(fields)
    }

    /// Apply an edit to a parameter of the current node
    pub fn commit(&self, graph: &mut Graph, label: &str, edit: FieldEdit) -> Result<(), PanelError> {
        let Some(name) = self.current() else {
            return Err(PanelError::NoSelection);
        };
        if matches!(label, TYPE_LABEL | NAME_LABEL) {
            return Err(PanelError::ReadOnly(label.to_string()));
        }
        let node = graph
            .node_mut(name)
            .ok_or_else(|| PanelError::NodeNotFound(name.to_string()))?;
        let param = node
            .parameter_mut(label)
            .ok_or_else(|| PanelError::UnknownParameter(label.to_string()))?;

        let value = match (edit, param.param_type()) {
            (FieldEdit::Text(text), param_type) => parse_text(label, param_type, &text)?,
            (FieldEdit::Checked(checked), ParamType::Bool) => ParamValue::Bool(checked),
            (FieldEdit::Selected(index), ParamType::Enum) => {
                let option = param.hints().enum_options.get(index).cloned().ok_or_else(|| {
                    PanelError::InvalidInput {
                        param: label.to_string(),
                        input: index.to_string(),
                    }
                })?;
                ParamValue::Enum(option)
            }
            _ => return Err(PanelError::ReadOnly(label.to_string())),
        };
        param.set_value(value)?;
        tracing::debug!(node = name, param = label, "parameter edited");
        Ok(())
    }
}

/// Error from the parameter panel
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PanelError {
    /// The selected node is not in the graph
    #[error("Node {0} not found in the graph")]
    NodeNotFound(String),

    /// No single node is selected
    #[error("No single node is selected")]
    NoSelection,

    /// The node has no such parameter
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// The row does not accept this edit
    #[error("Field {0} is read only")]
    ReadOnly(String),

    /// Text could not be parsed for the parameter type
    #[error("Invalid value {input:?} for {param}")]
    InvalidInput {
        /// Parameter name
        param: String,
        /// Rejected input
        input: String,
    },

    /// The parameter refused the value
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeview_graph::{BaseType, NodeEntry, NodeRegistry, ParamEntry, StaticSchema};

    fn graph() -> Graph {
        let schema = StaticSchema::new(vec![NodeEntry::new("standard", BaseType::Shader)
            .with_output(ParamType::Rgb)
            .with_param(ParamEntry::new("name", ParamType::String))
            .with_param(ParamEntry::new("Kd", ParamType::Float).with_default(ParamValue::Float(0.7)))
            .with_param(ParamEntry::new("Kd_color", ParamType::Rgb))
            .with_param(ParamEntry::new("thin_walled", ParamType::Bool))
            .with_param(ParamEntry::new("mode", ParamType::Enum).with_enum_options(["diffuse", "glossy"]))
            .with_param(ParamEntry::new("samples", ParamType::Int))]);
        let registry = NodeRegistry::from_schema(&schema).unwrap();
        let mut graph = Graph::new(Arc::new(registry), EventBus::new());
        graph.instantiate("standard", Some("mtl")).unwrap();
        graph.instantiate("standard", Some("mtl2")).unwrap();
        graph
    }

    fn panel_for(name: &str) -> ParameterPanel {
        let mut panel = ParameterPanel::new();
        panel.set_selection(vec![name.to_string()]);
        panel
    }

    #[test]
    fn test_fields_for_single_selection() {
        let graph = graph();
        let fields = panel_for("mtl").fields(&graph).unwrap();
        let labels: Vec<&str> = fields.iter().map(|field| field.label.as_str()).collect();
        assert_eq!(labels, vec!["type", "name", "Kd", "Kd_color", "thin_walled", "mode", "samples"]);

        assert_eq!(fields[0].widget, FieldWidget::ReadOnly("standard".into()));
        assert_eq!(fields[1].widget, FieldWidget::TextEdit("mtl".into()));
        assert_eq!(fields[2].widget, FieldWidget::TextEdit("0.7".into()));
        assert!(!fields[3].widget.is_editable());
        assert_eq!(fields[4].widget, FieldWidget::Checkbox(false));
        assert_eq!(
            fields[5].widget,
            FieldWidget::Select {
                options: vec!["diffuse".into(), "glossy".into()],
                index: Some(0),
            }
        );
    }

    #[test]
    fn test_no_fields_without_single_selection() {
        let graph = graph();
        let mut panel = ParameterPanel::new();
        assert!(panel.fields(&graph).unwrap().is_empty());
        panel.set_selection(vec!["mtl".into(), "mtl2".into()]);
        assert!(panel.current().is_none());
        assert!(panel.fields(&graph).unwrap().is_empty());
    }

    #[test]
    fn test_missing_node() {
        let graph = graph();
        assert_eq!(
            panel_for("ghost").fields(&graph).unwrap_err(),
            PanelError::NodeNotFound("ghost".into())
        );
    }

    #[test]
    fn test_commit_edits() {
        let mut graph = graph();
        let panel = panel_for("mtl");
        panel.commit(&mut graph, "Kd", FieldEdit::Text(" 0.25 ".into())).unwrap();
        panel.commit(&mut graph, "thin_walled", FieldEdit::Checked(true)).unwrap();
        panel.commit(&mut graph, "mode", FieldEdit::Selected(1)).unwrap();

        let node = graph.node("mtl").unwrap();
        assert_eq!(node.parameter("Kd").unwrap().value(), &ParamValue::Float(0.25));
        assert_eq!(node.parameter("thin_walled").unwrap().value(), &ParamValue::Bool(true));
        assert_eq!(node.parameter("mode").unwrap().value(), &ParamValue::Enum("glossy".into()));

        assert!(matches!(
            panel.commit(&mut graph, "samples", FieldEdit::Text("many".into())),
            Err(PanelError::InvalidInput { .. })
        ));
        assert!(matches!(
            panel.commit(&mut graph, "mode", FieldEdit::Selected(5)),
            Err(PanelError::InvalidInput { .. })
        ));
        assert_eq!(
            panel.commit(&mut graph, "Kd_color", FieldEdit::Text("1 0 0".into())),
            Err(PanelError::ReadOnly("Kd_color".into()))
        );
        assert_eq!(
            panel.commit(&mut graph, "name", FieldEdit::Text("x".into())),
            Err(PanelError::ReadOnly("name".into()))
        );
    }

    #[test]
    fn test_attach_mirrors_selection() {
        let bus = EventBus::new();
        let panel = Arc::new(Mutex::new(ParameterPanel::new()));
        ParameterPanel::attach(&panel, &bus);
        bus.publish_immediate(GraphEvent::NodesSelected {
            names: vec!["mtl".into()],
        });
        bus.flush();
        assert_eq!(panel.lock().current(), Some("mtl"));

        bus.publish_immediate(GraphEvent::NodesCleared);
        bus.flush();
        assert!(panel.lock().selection().is_empty());
        assert!(panel.lock().fields(&graph()).unwrap().is_empty());
    }
}
