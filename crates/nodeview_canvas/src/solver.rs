// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph layout solvers.
//!
//! A solver only sees node names, sizes and directed edges. It returns a
//! position per node in its own coordinate space; the layout engine maps
//! that space back onto the canvas.

use egui::{Pos2, Vec2};
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

/// Directed node-to-node graph handed to a solver.
///
/// Edges are unique and never loop back to their own node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutGraph {
    nodes: IndexMap<String, Vec2>,
    edges: IndexSet<(String, String)>,
}

impl LayoutGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with its size
    pub fn add_node(&mut self, name: impl Into<String>, size: Vec2) {
        self.nodes.insert(name.into(), size);
    }

    /// Add an edge between two known nodes. Returns `false` for unknown
    /// nodes, self edges and duplicates.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        if from == to || !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
            return false;
        }
        self.edges.insert((from.to_string(), to.to_string()))
    }

    /// Node names in insertion order
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Size of a node
    pub fn size(&self, name: &str) -> Option<Vec2> {
        self.nodes.get(name).copied()
    }

    /// Edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().map(|(from, to)| (from.as_str(), to.as_str()))
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// Error raised by a solver
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Layout solver failed: {0}")]
pub struct SolverError(pub String);

/// Computes positions for a [`LayoutGraph`]
pub trait LayoutSolver {
    /// Solver name, for logs
    fn name(&self) -> &str;

    /// Position every node. Missing entries are treated as a failure by
    /// the caller.
    fn solve(&self, graph: &LayoutGraph) -> Result<IndexMap<String, Pos2>, SolverError>;
}

/// Left-to-right layered layout.
///
/// Ranks come from the longest path in a topological order; cycles are
/// broken by node insertion order. Nodes inside a rank are ordered by
/// barycentre sweeps, then ranks become columns.
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredSolver {
    /// Gap between columns
    pub rank_spacing: f32,
    /// Gap between nodes in a column
    pub node_spacing: f32,
    /// Number of down-and-up ordering sweeps
    pub sweeps: usize,
}

impl Default for LayeredSolver {
    fn default() -> Self {
        Self {
            rank_spacing: 80.0,
            node_spacing: 30.0,
            sweeps: 2,
        }
    }
}

impl LayoutSolver for LayeredSolver {
    fn name(&self) -> &str {
        "layered"
    }

    fn solve(&self, graph: &LayoutGraph) -> Result<IndexMap<String, Pos2>, SolverError> {
        let ranks = compute_ranks(graph);
        let max_rank = ranks.values().copied().max().unwrap_or(0);

        let mut rank_nodes: Vec<Vec<String>> = vec![Vec::new(); max_rank + 1];
        for name in graph.node_names() {
            let rank = ranks.get(name).copied().unwrap_or(0);
            rank_nodes[rank].push(name.to_string());
        }
        self.order_rank_nodes(&mut rank_nodes, graph);

        let mut positions = IndexMap::with_capacity(graph.node_count());
        let mut x = 0.0;
        for bucket in &rank_nodes {
            let mut y = 0.0;
            let mut column_width: f32 = 0.0;
            for name in bucket {
                let size = graph
                    .size(name)
                    .ok_or_else(|| SolverError(format!("node {name} has no size")))?;
                positions.insert(name.clone(), Pos2::new(x, y));
                y += size.y + self.node_spacing;
                column_width = column_width.max(size.x);
            }
            x += column_width + self.rank_spacing;
        }
        Ok(positions)
    }
}

impl LayeredSolver {
    fn order_rank_nodes(&self, rank_nodes: &mut [Vec<String>], graph: &LayoutGraph) {
        if rank_nodes.len() <= 1 {
            return;
        }
        let mut incoming: IndexMap<&str, Vec<&str>> = IndexMap::new();
        let mut outgoing: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (from, to) in graph.edges() {
            outgoing.entry(from).or_default().push(to);
            incoming.entry(to).or_default().push(from);
        }

        for _ in 0..self.sweeps {
            for rank in 1..rank_nodes.len() {
                let positions = bucket_positions(rank_nodes);
                sort_bucket(&mut rank_nodes[rank], &incoming, &positions);
            }
            for rank in (0..rank_nodes.len() - 1).rev() {
                let positions = bucket_positions(rank_nodes);
                sort_bucket(&mut rank_nodes[rank], &outgoing, &positions);
            }
        }
    }
}

fn bucket_positions(rank_nodes: &[Vec<String>]) -> IndexMap<String, usize> {
    rank_nodes
        .iter()
        .flat_map(|bucket| bucket.iter().enumerate().map(|(index, name)| (name.clone(), index)))
        .collect()
}

fn sort_bucket(bucket: &mut [String], neighbours: &IndexMap<&str, Vec<&str>>, positions: &IndexMap<String, usize>) {
    if bucket.len() <= 1 {
        return;
    }
    let mut keyed: Vec<(f32, usize, String)> = bucket
        .iter()
        .enumerate()
        .map(|(index, name)| (barycentre(name, index, neighbours, positions), index, name.clone()))
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    for (slot, (_, _, name)) in bucket.iter_mut().zip(keyed) {
        *slot = name;
    }
}

/// Mean position of a node's neighbours, or its current index without any
fn barycentre(
    name: &str,
    index: usize,
    neighbours: &IndexMap<&str, Vec<&str>>,
    positions: &IndexMap<String, usize>,
) -> f32 {
    let placed: Vec<usize> = neighbours
        .get(name)
        .map(|list| list.iter().filter_map(|n| positions.get(*n).copied()).collect())
        .unwrap_or_default();
    if placed.is_empty() {
        index as f32
    } else {
        placed.iter().sum::<usize>() as f32 / placed.len() as f32
    }
}

/// Longest-path ranks over a topological order.
///
/// Nodes left over by a cycle are appended in insertion order, and edges
/// pointing backwards in that order are ignored.
fn compute_ranks(graph: &LayoutGraph) -> IndexMap<String, usize> {
    let mut indegree: IndexMap<&str, usize> = graph.node_names().map(|name| (name, 0)).collect();
    let mut adjacency: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for (from, to) in graph.edges() {
        adjacency.entry(from).or_default().push(to);
        if let Some(degree) = indegree.get_mut(to) {
            *degree += 1;
        }
    }

    let mut queue: VecDeque<&str> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order: IndexSet<&str> = IndexSet::with_capacity(graph.node_count());
    while let Some(name) = queue.pop_front() {
        order.insert(name);
        for next in adjacency.get(name).into_iter().flatten() {
            if let Some(degree) = indegree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*next);
                }
            }
        }
    }
    for name in graph.node_names() {
        order.insert(name);
    }

    let mut ranks: IndexMap<String, usize> = order.iter().map(|name| (name.to_string(), 0)).collect();
    for (index, name) in order.iter().enumerate() {
        let rank = ranks.get(*name).copied().unwrap_or(0);
        for next in adjacency.get(name).into_iter().flatten() {
            let forward = order.get_index_of(next).is_some_and(|next_index| next_index > index);
            if !forward {
                continue;
            }
            if let Some(entry) = ranks.get_mut(*next) {
                *entry = (*entry).max(rank + 1);
            }
        }
    }
    ranks
}
