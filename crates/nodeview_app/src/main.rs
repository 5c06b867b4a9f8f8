// SPDX-License-Identifier: MIT OR Apache-2.0
//! `NodeView` - node graph viewer for renderer scene files
//!
//! Loads a node schema and a scene file, mirrors the scene into a canvas,
//! lays it out and optionally writes it back:
//!
//! ```text
//! nodeview <config.ron> <scene.ron> [--preview] [--save <out.ron>]
//! ```
//!
//! ## Architecture
//!
//! The binary only wires crates together. The graph model lives in
//! `nodeview_graph`; the canvas, parameter panel and layout engine live in
//! `nodeview_canvas`. All of them communicate through one event bus owned by
//! the [`Session`].

use clap::Parser;
use nodeview_app::{Session, ViewerConfig};
use nodeview_graph::LoadMode;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(name = "nodeview", version)]
#[command(about = "Node graph viewer for renderer scene files")]
struct Args {
    /// Viewer configuration file
    config: PathBuf,

    /// Scene file to open
    scene: PathBuf,

    /// Only create the ports the scene links use
    #[arg(long)]
    preview: bool,

    /// Write the scene back to this file
    #[arg(long, value_name = "OUT")]
    save: Option<PathBuf>,
}

impl Args {
    fn mode(&self) -> LoadMode {
        if self.preview {
            LoadMode::Preview
        } else {
            LoadMode::Full
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = ViewerConfig::load(&args.config)?;
    let config_dir = args.config.parent().unwrap_or(Path::new("."));
    let mut session = Session::from_config(&config, config_dir)?;

    let report = session.open(&args.scene, args.mode())?;
    for (name, err) in &report.skipped {
        tracing::warn!(node = %name, "not loaded: {err}");
    }
    for link in &report.dangling_links {
        tracing::warn!(node = %link.node, param = %link.param, target = %link.target, "dangling link");
    }

    {
        let canvas = session.canvas().lock();
        tracing::info!(
            nodes = canvas.node_count(),
            noodles = canvas.noodle_count(),
            viewport = ?canvas.viewport(),
            "scene ready"
        );
    }

    if let Some(path) = &args.save {
        session.save(path)?;
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "nodeview=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting NodeView v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        tracing::error!("NodeView failed: {e}");
        std::process::exit(1);
    }
}
