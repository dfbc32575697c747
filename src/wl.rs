//! Weisfeiler-Lehman colour refinement.
//!
//! Colours are ranks of sorted signatures, so they depend only on labels and
//! structure, never on node insertion order. That makes every partition
//! produced here an isomorphism invariant and safe to drive canonical labeling.

use petgraph::prelude::NodeIndex;

use crate::graph::{LabelId, LabeledGraph};

pub type Color = u32;

/// Label and degree colouring every refinement starts from.
pub fn initial_colors(graph: &LabeledGraph) -> Vec<Color> {
    let keys: Vec<(LabelId, usize, usize)> = graph
        .node_indices()
        .map(|node| {
            (
                graph.node_label(node),
                graph.out_degree(node),
                if graph.directed() {
                    graph.in_degree(node)
                } else {
                    0
                },
            )
        })
        .collect();
    rank(&keys)
}

/// One refinement round. The new partition refines `colors` and keeps the
/// relative order of existing cells.
pub fn refine_colors(graph: &LabeledGraph, colors: &[Color]) -> Vec<Color> {
    let signatures: Vec<Signature> = graph
        .node_indices()
        .map(|node| signature(graph, colors, node))
        .collect();
    rank(&signatures)
}

/// Refine until the number of cells stops growing.
pub fn refine_to_equitable(graph: &LabeledGraph, mut colors: Vec<Color>) -> Vec<Color> {
    let mut cells = cell_count(&colors);
    loop {
        let next = refine_colors(graph, &colors);
        let next_cells = cell_count(&next);
        if next_cells == cells {
            return colors;
        }
        colors = next;
        cells = next_cells;
    }
}

/// Split `node` out of its cell ahead of the rest, then refine.
pub fn individualize(graph: &LabeledGraph, colors: &[Color], node: NodeIndex) -> Vec<Color> {
    let keys: Vec<(Color, u8)> = colors
        .iter()
        .enumerate()
        .map(|(idx, color)| (*color, u8::from(idx != node.index())))
        .collect();
    refine_to_equitable(graph, rank(&keys))
}

pub fn cell_count(colors: &[Color]) -> usize {
    colors.iter().map(|c| *c as usize + 1).max().unwrap_or(0)
}

pub fn is_discrete(colors: &[Color]) -> bool {
    cell_count(colors) == colors.len()
}

type Signature = (Color, Vec<(LabelId, Color)>, Vec<(LabelId, Color)>);

fn signature(graph: &LabeledGraph, colors: &[Color], node: NodeIndex) -> Signature {
    let mut outgoing: Vec<(LabelId, Color)> = graph
        .out_edges(node)
        .map(|(neighbor, label)| (label, colors[neighbor.index()]))
        .collect();
    outgoing.sort_unstable();
    let mut incoming: Vec<(LabelId, Color)> = if graph.directed() {
        graph
            .in_edges(node)
            .map(|(neighbor, label)| (label, colors[neighbor.index()]))
            .collect()
    } else {
        Vec::new()
    };
    incoming.sort_unstable();
    (colors[node.index()], outgoing, incoming)
}

fn rank<K: Ord + Clone>(keys: &[K]) -> Vec<Color> {
    let mut distinct: Vec<K> = keys.to_vec();
    distinct.sort();
    distinct.dedup();
    keys.iter()
        .map(|key| distinct.binary_search(key).unwrap_or_else(|position| position) as Color)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LabeledGraphBuilder;

    fn path(labels: &[LabelId]) -> LabeledGraph {
        let mut builder = LabeledGraphBuilder::new(false);
        let nodes: Vec<_> = labels.iter().map(|l| builder.add_node(*l)).collect();
        for pair in nodes.windows(2) {
            builder.add_edge(pair[0], pair[1], 0);
        }
        builder.build()
    }

    #[test]
    fn path_ends_and_middle_separate() {
        let graph = path(&[0, 0, 0]);
        let colors = refine_to_equitable(&graph, initial_colors(&graph));
        assert_eq!(colors[0], colors[2]);
        assert_ne!(colors[0], colors[1]);
        assert_eq!(cell_count(&colors), 2);
    }

    #[test]
    fn colors_do_not_depend_on_insertion_order() {
        let forward = path(&[0, 1, 2, 1]);
        let backward = path(&[1, 2, 1, 0]);
        let mut left = refine_to_equitable(&forward, initial_colors(&forward));
        let mut right = refine_to_equitable(&backward, initial_colors(&backward));
        left.sort_unstable();
        right.sort_unstable();
        assert_eq!(left, right);
    }

    #[test]
    fn individualization_splits_a_symmetric_cell() {
        let graph = path(&[0, 0, 0]);
        let colors = refine_to_equitable(&graph, initial_colors(&graph));
        let split = individualize(&graph, &colors, NodeIndex::new(0));
        assert!(is_discrete(&split));
    }
}
