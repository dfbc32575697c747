use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;

use crate::graph::labeled::LabeledGraph;
use crate::graph::model::{RawEdge, RawGraph, RawNode};
use crate::graph::vocabulary::LabelVocabulary;
use crate::pattern::Pattern;

/// Helper for exporting graphs back to JSON compatible with the loader format.
pub struct GraphWriter;

impl GraphWriter {
    /// Node ids become `n0`, `n1`, ... in node index order; attributes are
    /// the decoded labels.
    pub fn to_raw_graph(graph: &LabeledGraph, vocabulary: &LabelVocabulary) -> RawGraph {
        let nodes = graph
            .node_indices()
            .map(|node| RawNode {
                id: node_id(node.index()),
                attributes: vocabulary.decode_node(graph.node_label(node)),
            })
            .collect();

        let edges = graph
            .edges()
            .into_iter()
            .map(|(source, target, label)| RawEdge {
                source: node_id(source.index()),
                target: node_id(target.index()),
                attributes: vocabulary.decode_edge(label),
            })
            .collect();

        RawGraph {
            nodes,
            edges,
            graph_attributes: Default::default(),
            directed: graph.directed(),
        }
    }

    pub fn pattern_to_raw(pattern: &Pattern, vocabulary: &LabelVocabulary) -> RawGraph {
        Self::to_raw_graph(pattern.graph(), vocabulary)
    }

    pub fn to_json_string(graph: &RawGraph) -> Result<String> {
        Ok(serde_json::to_string_pretty(graph)?)
    }

    /// Write a list of graphs as a dataset file the loader accepts.
    pub fn write_dataset(graphs: &[RawGraph], path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(graphs)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

fn node_id(index: usize) -> String {
    format!("n{index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Dataset;
    use crate::graph::{GraphLoader, LabelPolicy};

    #[test]
    fn raw_export_round_trips_through_loader() {
        let raws = GraphLoader::parse_dataset_str(
            r#"{"directed": true, "nodes": [
                    {"id": "p", "attributes": {"kind": "person", "age": 3}},
                    {"id": "q", "attributes": {"kind": "city"}}],
                "edges": [{"source": "p", "target": "q", "attributes": {"rel": "lives"}}]}"#,
        )
        .expect("parse");
        let data = Dataset::from_raw_graphs(&raws, &LabelPolicy::all_attributes()).expect("dataset");
        let graph = &data.graphs()[0];

        let exported = GraphWriter::to_raw_graph(graph, data.vocabulary());
        assert!(exported.directed);
        assert_eq!(exported.nodes.len(), 2);
        assert_eq!(exported.edges[0].attributes["rel"], "lives");
        assert!(exported
            .nodes
            .iter()
            .any(|node| node.attributes.get("kind").and_then(|v| v.as_str()) == Some("person")));

        let json = GraphWriter::to_json_string(&exported).expect("json");
        let reloaded = GraphLoader::parse_dataset_str(&json).expect("reload");
        let again = Dataset::from_raw_graphs(&reloaded, &LabelPolicy::all_attributes()).expect("dataset");
        assert_eq!(
            crate::canonical::canonical_code(graph),
            crate::canonical::canonical_code(&again.graphs()[0])
        );
    }
}
