// SPDX-License-Identifier: MIT OR Apache-2.0
//! Viewer session: one bus, one graph and the views following it.

use crate::config::ViewerConfig;
use egui::{Pos2, Rect, Vec2};
use nodeview_canvas::{GraphCanvas, LayoutEngine, LayoutError, LayoutReport, PanelError, ParameterField, ParameterPanel};
use nodeview_graph::{
    capture_scene, populate_graph, EventBus, FlushStats, Graph, GraphError, LoadMode, LoadReport, NodeRegistry,
    SceneDocument, SceneError, SchemaError, StaticSchema,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Everything one open scene needs.
///
/// Shared parts sit behind mutexes because bus handlers update them. Locks
/// are never held across [`Session::settle`].
pub struct Session {
    bus: EventBus,
    graph: Arc<Mutex<Graph>>,
    canvas: Arc<Mutex<GraphCanvas>>,
    panel: Arc<Mutex<ParameterPanel>>,
    layout: LayoutEngine,
    auto_layout: bool,
    settle_limit: usize,
    scene_path: Option<PathBuf>,
}

impl Session {
    /// Build a session from a configuration and a registry
    pub fn new(config: &ViewerConfig, registry: NodeRegistry) -> Self {
        Self::with_layout(
            config,
            registry,
            LayoutEngine::new(Some(Box::new(nodeview_canvas::LayeredSolver::default())), config.layout),
        )
    }

    /// Build a session with a specific layout engine
    pub fn with_layout(config: &ViewerConfig, registry: NodeRegistry, layout: LayoutEngine) -> Self {
        let bus = EventBus::new();
        let graph = Arc::new(Mutex::new(
            Graph::new(Arc::new(registry), bus.clone()).with_name_policy(config.name_policy),
        ));
        let scene_rect = Rect::from_min_size(Pos2::ZERO, Vec2::from(config.scene_size));
        let canvas = Arc::new(Mutex::new(GraphCanvas::new(scene_rect, config.style.clone())));
        let panel = Arc::new(Mutex::new(ParameterPanel::new()));

        GraphCanvas::attach(&canvas, &bus);
        ParameterPanel::attach(&panel, &bus);
        Graph::attach_requests(&graph, &bus);

        Self {
            bus,
            graph,
            canvas,
            panel,
            layout,
            auto_layout: config.auto_layout,
            settle_limit: config.settle_limit.max(1),
            scene_path: None,
        }
    }

    /// Load the schema named by `config` and build a session
    pub fn from_config(config: &ViewerConfig, config_dir: &Path) -> Result<Self> {
        let schema_path = config.schema_path(config_dir);
        tracing::info!(path = %schema_path.display(), "loading node schema");
        let schema = StaticSchema::load(&schema_path)?;
        let registry = NodeRegistry::from_schema(&schema)?;
        Ok(Self::new(config, registry))
    }

    /// The bus every part publishes on
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Shared graph
    pub fn graph(&self) -> &Arc<Mutex<Graph>> {
        &self.graph
    }

    /// Shared canvas
    pub fn canvas(&self) -> &Arc<Mutex<GraphCanvas>> {
        &self.canvas
    }

    /// Shared parameter panel
    pub fn panel(&self) -> &Arc<Mutex<ParameterPanel>> {
        &self.panel
    }

    /// Path of the open scene
    pub fn scene_path(&self) -> Option<&Path> {
        self.scene_path.as_deref()
    }

    /// Flush until no events are pending.
    ///
    /// Handlers may publish follow-up events (a connect request publishes a
    /// connection), so one flush is not always enough.
    pub fn settle(&self) -> Result<FlushStats> {
        let mut total = FlushStats::default();
        for _ in 0..self.settle_limit {
            let stats = self.bus.flush();
            total.delivered += stats.delivered;
            total.dropped += stats.dropped;
            total.handler_calls += stats.handler_calls;
            if self.bus.pending().is_empty() {
                return Ok(total);
            }
        }
        Err(SessionError::Unsettled(self.settle_limit))
    }

    /// Drop every node and start an empty scene
    pub fn new_scene(&mut self) -> Result<()> {
        self.graph.lock().clear_nodes();
        self.scene_path = None;
        self.settle()?;
        tracing::info!("new scene");
        Ok(())
    }

    /// Open a scene file, replacing the current scene
    pub fn open(&mut self, path: &Path, mode: LoadMode) -> Result<LoadReport> {
        let document = SceneDocument::load(path)?;
        if self.scene_path.is_some() || self.graph.lock().node_count() > 0 {
            self.graph.lock().clear_nodes();
        }

        let report = populate_graph(&mut self.graph.lock(), &document, mode);
        self.scene_path = Some(path.to_path_buf());
        self.settle()?;

        if self.auto_layout && !self.layout.has_solver() {
            tracing::warn!("no layout solver available, keeping default positions");
        } else if self.auto_layout {
            match self.position_nodes(None) {
                Ok(_) | Err(SessionError::Layout(LayoutError::NothingToLayout)) => {}
                Err(err) => return Err(err),
            }
        }
        tracing::info!(path = %path.display(), nodes = report.created.len(), "opened scene");
        Ok(report)
    }

    /// Write the current graph to a scene file
    pub fn save(&mut self, path: &Path) -> Result<()> {
        let document = capture_scene(&self.graph.lock());
        document.save(path)?;
        self.scene_path = Some(path.to_path_buf());
        tracing::info!(path = %path.display(), nodes = document.nodes.len(), "saved scene");
        Ok(())
    }

    /// Add a node of `kind` under the first free name `kind`, `kind1`, `kind2`...
    pub fn add_node(&mut self, kind: &str) -> Result<String> {
        let name = {
            let mut graph = self.graph.lock();
            let name = (0..)
                .map(|index| if index == 0 { kind.to_string() } else { format!("{kind}{index}") })
                .find(|candidate| graph.node(candidate).is_none())
                .unwrap_or_else(|| kind.to_string());
            graph.instantiate(kind, Some(&name))?;
            name
        };
        self.settle()?;
        Ok(name)
    }

    /// Select nodes on the canvas; the panel follows after settling
    pub fn select(&self, names: &[String]) -> Result<()> {
        self.canvas.lock().select(names, &self.bus);
        self.settle()?;
        Ok(())
    }

    /// Lay out `targets`, the selection, or every node
    pub fn position_nodes(&self, targets: Option<&[String]>) -> Result<LayoutReport> {
        let report = self.layout.position_nodes(&mut self.canvas.lock(), targets)?;
        Ok(report)
    }

    /// Editor rows for the selected node
    pub fn parameter_fields(&self) -> Result<Vec<ParameterField>> {
        let panel = self.panel.lock();
        let graph = self.graph.lock();
        Ok(panel.fields(&graph)?)
    }
}

/// Error from a session operation
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Schema could not be read
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Scene could not be read or written
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// Graph operation failed
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Layout failed
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// Parameter panel failed
    #[error(transparent)]
    Panel(#[from] PanelError),

    /// Events kept arriving
    #[error("Events still pending after {0} flushes")]
    Unsettled(usize),
}
