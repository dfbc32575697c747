#![allow(dead_code)]

use std::collections::HashMap;

use fsmine::graph::{LabelId, LabeledGraph, LabeledGraphBuilder};
use fsmine::{Dataset, GraphLoader, LabelPolicy};
use petgraph::prelude::NodeIndex;

pub fn dataset(json: &str) -> anyhow::Result<Dataset> {
    let raws = GraphLoader::parse_dataset_str(json)?;
    Ok(Dataset::from_raw_graphs(&raws, &LabelPolicy::all_attributes())?)
}

pub fn build_graph(directed: bool, labels: &[LabelId], edges: &[(usize, usize, LabelId)]) -> LabeledGraph {
    let mut builder = LabeledGraphBuilder::new(directed);
    let nodes: Vec<NodeIndex> = labels.iter().map(|&label| builder.add_node(label)).collect();
    for &(source, target, label) in edges {
        builder.add_edge(nodes[source], nodes[target], label);
    }
    builder.build()
}

/// Subgraph formed by the chosen edges and their endpoints, or `None` when
/// those edges do not form one connected piece.
pub fn edge_subgraph(
    graph: &LabeledGraph,
    edges: &[(NodeIndex, NodeIndex, LabelId)],
) -> Option<LabeledGraph> {
    if edges.is_empty() {
        return None;
    }
    let mut local: HashMap<NodeIndex, usize> = HashMap::new();
    let mut labels = Vec::new();
    let mut local_edges = Vec::new();
    for &(source, target, label) in edges {
        for node in [source, target] {
            local.entry(node).or_insert_with(|| {
                labels.push(graph.node_label(node));
                labels.len() - 1
            });
        }
        local_edges.push((local[&source], local[&target], label));
    }

    let mut parent: Vec<usize> = (0..labels.len()).collect();
    fn find(parent: &mut [usize], node: usize) -> usize {
        let mut root = node;
        while parent[root] != root {
            root = parent[root];
        }
        parent[node] = root;
        root
    }
    for &(source, target, _) in &local_edges {
        let (a, b) = (find(&mut parent, source), find(&mut parent, target));
        parent[a] = b;
    }
    let root = find(&mut parent, 0);
    if (0..labels.len()).any(|node| find(&mut parent, node) != root) {
        return None;
    }
    Some(build_graph(graph.directed(), &labels, &local_edges))
}
