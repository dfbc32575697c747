//! Canonical codes for labeled graphs.
//!
//! The code of a graph is the lexicographically smallest encoding over all
//! node orderings reachable by individualization-refinement: refine the
//! label/degree partition to an equitable one, individualize each vertex of
//! the first non-singleton cell in turn, refine again, and encode every
//! discrete leaf. Vertices that are twins (swapping them is an automorphism)
//! lead to identical leaves, so only one twin per cell is explored.
//!
//! Encoding layout: `[directed, n, label_0 .. label_{n-1}, m, (a, b, l)*]`
//! with edges sorted and undirected edges written as `a <= b`.

use std::convert::Infallible;
use std::fmt;

use petgraph::prelude::NodeIndex;

use crate::cancel::CancellationToken;
use crate::graph::{LabelId, LabeledGraph};
use crate::wl::{individualize, initial_colors, refine_to_equitable, Color};

const CANCEL_CHECK_INTERVAL: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalCode(Vec<u32>);

impl CanonicalCode {
    /// Reserved code of the graph without nodes.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn words(&self) -> &[u32] {
        &self.0
    }

    pub fn node_count(&self) -> usize {
        self.0.get(1).copied().unwrap_or(0) as usize
    }

    pub fn edge_count(&self) -> usize {
        let n = self.node_count();
        self.0.get(2 + n).copied().unwrap_or(0) as usize
    }
}

impl fmt::Display for CanonicalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("empty");
        }
        let directed = self.0[0] == 1;
        let n = self.node_count();
        let labels = &self.0[2..2 + n];
        write!(f, "n{n}[")?;
        for (i, label) in labels.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{label}")?;
        }
        f.write_str("]")?;
        let arrow = if directed { ">" } else { "-" };
        for edge in self.0[3 + n..].chunks(3) {
            if let [a, b, l] = edge {
                write!(f, " {a}{arrow}{b}:{l}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalError {
    LeafBudget { limit: usize },
    Cancelled,
}

impl fmt::Display for CanonicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeafBudget { limit } => {
                write!(f, "canonical labeling exceeded {limit} search leaves")
            }
            Self::Cancelled => f.write_str("canonical labeling cancelled"),
        }
    }
}

impl std::error::Error for CanonicalError {}

/// Canonical code without any budget. Never fails for a well-formed graph.
pub fn canonical_code(graph: &LabeledGraph) -> CanonicalCode {
    match minimum_code(graph, |_| Ok::<(), Infallible>(())) {
        Ok(code) => code,
        Err(never) => match never {},
    }
}

/// Budgeted, cancellable canonical labeling used inside mining rounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalLabeler<'a> {
    leaf_limit: Option<usize>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> CanonicalLabeler<'a> {
    pub fn new(leaf_limit: Option<usize>) -> Self {
        Self {
            leaf_limit,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn label(&self, graph: &LabeledGraph) -> Result<CanonicalCode, CanonicalError> {
        minimum_code(graph, |leaves| {
            if let Some(limit) = self.leaf_limit {
                if leaves > limit {
                    return Err(CanonicalError::LeafBudget { limit });
                }
            }
            if leaves % CANCEL_CHECK_INTERVAL == 0 {
                if let Some(token) = self.cancel {
                    if token.is_cancelled() {
                        return Err(CanonicalError::Cancelled);
                    }
                }
            }
            Ok(())
        })
    }
}

fn minimum_code<E>(
    graph: &LabeledGraph,
    mut on_leaf: impl FnMut(usize) -> Result<(), E>,
) -> Result<CanonicalCode, E> {
    if graph.is_empty() {
        return Ok(CanonicalCode::empty());
    }

    let twins = twin_classes(graph);
    let root = refine_to_equitable(graph, initial_colors(graph));
    let mut best: Option<Vec<u32>> = None;
    let mut leaves = 0usize;
    let mut stack: Vec<Vec<Color>> = vec![root];

    while let Some(colors) = stack.pop() {
        let Some(cell) = first_open_cell(&colors) else {
            leaves += 1;
            on_leaf(leaves)?;
            let code = encode(graph, &colors);
            if best.as_ref().map_or(true, |current| code < *current) {
                best = Some(code);
            }
            continue;
        };

        let mut explored_classes = Vec::new();
        let mut children = Vec::new();
        for (idx, color) in colors.iter().enumerate() {
            if *color != cell || explored_classes.contains(&twins[idx]) {
                continue;
            }
            explored_classes.push(twins[idx]);
            children.push(individualize(graph, &colors, NodeIndex::new(idx)));
        }
        stack.extend(children.into_iter().rev());
    }

    Ok(CanonicalCode(best.unwrap_or_default()))
}

/// Smallest colour shared by at least two nodes.
fn first_open_cell(colors: &[Color]) -> Option<Color> {
    let mut sizes = vec![0usize; colors.len()];
    for color in colors {
        sizes[*color as usize] += 1;
    }
    sizes
        .iter()
        .position(|size| *size > 1)
        .map(|position| position as Color)
}

fn encode(graph: &LabeledGraph, colors: &[Color]) -> Vec<u32> {
    let n = graph.node_count();
    let mut labels = vec![0 as LabelId; n];
    for node in graph.node_indices() {
        labels[colors[node.index()] as usize] = graph.node_label(node);
    }

    let mut edges: Vec<(u32, u32, LabelId)> = graph
        .edges()
        .into_iter()
        .map(|(source, target, label)| {
            let a = colors[source.index()];
            let b = colors[target.index()];
            if graph.directed() || a <= b {
                (a, b, label)
            } else {
                (b, a, label)
            }
        })
        .collect();
    edges.sort_unstable();

    let mut words = Vec::with_capacity(3 + n + edges.len() * 3);
    words.push(u32::from(graph.directed()));
    words.push(n as u32);
    words.extend(labels);
    words.push(edges.len() as u32);
    for (a, b, label) in edges {
        words.extend([a, b, label]);
    }
    words
}

/// Class representative per node; two nodes share a class when swapping them
/// maps the graph onto itself.
fn twin_classes(graph: &LabeledGraph) -> Vec<usize> {
    let n = graph.node_count();
    let mut class: Vec<usize> = (0..n).collect();
    for v in 0..n {
        for u in 0..v {
            if class[u] == u && swap_is_automorphism(graph, NodeIndex::new(u), NodeIndex::new(v)) {
                class[v] = u;
                break;
            }
        }
    }
    class
}

fn swap_is_automorphism(graph: &LabeledGraph, u: NodeIndex, v: NodeIndex) -> bool {
    if graph.node_label(u) != graph.node_label(v)
        || graph.out_degree(u) != graph.out_degree(v)
        || graph.in_degree(u) != graph.in_degree(v)
    {
        return false;
    }
    let swap = |x: NodeIndex| {
        if x == u {
            v
        } else if x == v {
            u
        } else {
            x
        }
    };
    for (from, to) in [(u, v), (v, u)] {
        for (neighbor, label) in graph.out_edges(from) {
            if graph.edge_label(to, swap(neighbor)) != Some(label) {
                return false;
            }
        }
        if graph.directed() {
            for (neighbor, label) in graph.in_edges(from) {
                if graph.edge_label(swap(neighbor), to) != Some(label) {
                    return false;
                }
            }
        }
    }
    true
}
