use petgraph::graph::Graph;
use petgraph::prelude::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::graph::vocabulary::LabelId;

/// Node and edge weights are interned label ids. Undirected edges are stored
/// in both directions, self-loops once.
pub type LabelStore = Graph<LabelId, LabelId>;

/// Immutable labeled graph used by every mining stage: dataset graphs and
/// patterns alike.
#[derive(Debug, Clone)]
pub struct LabeledGraph {
    graph: LabelStore,
    directed: bool,
    edge_count: usize,
}

impl LabeledGraph {
    pub fn directed(&self) -> bool {
        self.directed
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Logical edge count; an undirected edge counts once.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn inner(&self) -> &LabelStore {
        &self.graph
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn node_label(&self, node: NodeIndex) -> LabelId {
        self.graph[node]
    }

    pub fn edge_label(&self, source: NodeIndex, target: NodeIndex) -> Option<LabelId> {
        self.graph
            .find_edge(source, target)
            .map(|edge| self.graph[edge])
    }

    pub fn has_edge(&self, source: NodeIndex, target: NodeIndex) -> bool {
        self.graph.find_edge(source, target).is_some()
    }

    /// Outgoing edges for directed graphs, every incident edge otherwise.
    pub fn out_edges(&self, node: NodeIndex) -> impl Iterator<Item = (NodeIndex, LabelId)> + '_ {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| (edge.target(), *edge.weight()))
    }

    /// Incoming edges. Only meaningful for directed graphs; undirected graphs
    /// mirror `out_edges`.
    pub fn in_edges(&self, node: NodeIndex) -> impl Iterator<Item = (NodeIndex, LabelId)> + '_ {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| (edge.source(), *edge.weight()))
    }

    pub fn out_degree(&self, node: NodeIndex) -> usize {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .count()
    }

    pub fn in_degree(&self, node: NodeIndex) -> usize {
        if self.directed {
            self.graph
                .edges_directed(node, Direction::Incoming)
                .count()
        } else {
            self.out_degree(node)
        }
    }

    /// Logical edges as `(source, target, label)`. Undirected edges are
    /// reported once with `source <= target`.
    pub fn edges(&self) -> Vec<(NodeIndex, NodeIndex, LabelId)> {
        self.graph
            .edge_references()
            .filter(|edge| self.directed || edge.source() <= edge.target())
            .map(|edge| (edge.source(), edge.target(), *edge.weight()))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct LabeledGraphBuilder {
    graph: LabelStore,
    directed: bool,
    edge_count: usize,
}

impl LabeledGraphBuilder {
    pub fn new(directed: bool) -> Self {
        Self::with_capacity(directed, 0, 0)
    }

    pub fn with_capacity(directed: bool, nodes: usize, edges: usize) -> Self {
        let stored_edges = if directed { edges } else { edges * 2 };
        Self {
            graph: LabelStore::with_capacity(nodes, stored_edges),
            directed,
            edge_count: 0,
        }
    }

    /// Start from an existing graph, typically to grow a pattern by one edge.
    pub fn from_graph(graph: &LabeledGraph) -> Self {
        Self {
            graph: graph.graph.clone(),
            directed: graph.directed,
            edge_count: graph.edge_count,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn add_node(&mut self, label: LabelId) -> NodeIndex {
        self.graph.add_node(label)
    }

    /// Insert an edge. Returns `false` when the edge already existed, in which
    /// case its label is overwritten.
    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex, label: LabelId) -> bool {
        if let Some(existing) = self.graph.find_edge(source, target) {
            self.graph[existing] = label;
            if !self.directed && source != target {
                if let Some(mirror) = self.graph.find_edge(target, source) {
                    self.graph[mirror] = label;
                }
            }
            return false;
        }

        self.graph.add_edge(source, target, label);
        if !self.directed && source != target {
            self.graph.add_edge(target, source, label);
        }
        self.edge_count += 1;
        true
    }

    pub fn build(self) -> LabeledGraph {
        LabeledGraph {
            graph: self.graph,
            directed: self.directed,
            edge_count: self.edge_count,
        }
    }
}
