use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::warn;
use petgraph::prelude::NodeIndex;

use crate::error::{MiningError, MiningOutcome};
use crate::graph::labeled::{LabeledGraph, LabeledGraphBuilder};
use crate::graph::model::{GraphId, RawDataset, RawGraph};
use crate::graph::vocabulary::{LabelPolicy, LabelVocabulary};

/// Turns wire-format graphs into validated, label-interned `LabeledGraph`s.
#[derive(Debug, Default)]
pub struct GraphLoader;

impl GraphLoader {
    /// Parse any accepted dataset layout from a JSON string.
    pub fn parse_dataset_str(json: &str) -> Result<Vec<RawGraph>> {
        let raw: RawDataset = serde_json::from_str(json).context("parse dataset JSON")?;
        Ok(raw.into_graphs())
    }

    pub fn parse_dataset_reader<R: Read>(mut reader: R) -> Result<Vec<RawGraph>> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Self::parse_dataset_str(&buf)
    }

    pub fn parse_dataset_path(path: &Path) -> Result<Vec<RawGraph>> {
        let file = File::open(path).with_context(|| format!("open dataset file {:?}", path))?;
        Self::parse_dataset_reader(BufReader::new(file))
            .with_context(|| format!("read dataset from {:?}", path))
    }

    /// Check the structural invariants of one raw graph: unique node ids and
    /// edge endpoints that reference declared nodes.
    pub fn validate(raw: &RawGraph, position: usize) -> MiningOutcome<()> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(raw.nodes.len());
        for node in &raw.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(MiningError::data(format!(
                    "graph {position}: duplicate node id '{}'",
                    node.id
                )));
            }
        }
        for (index, edge) in raw.edges.iter().enumerate() {
            for endpoint in [&edge.source, &edge.target] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(MiningError::data(format!(
                        "graph {position}: edge {index} references unknown node id '{endpoint}'"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build the interned graph. Assumes `validate` already passed and that
    /// `vocabulary` holds every label the policy derives from `raw`.
    pub fn build(
        raw: &RawGraph,
        position: usize,
        vocabulary: &LabelVocabulary,
        policy: &LabelPolicy,
        directed: bool,
    ) -> MiningOutcome<LabeledGraph> {
        let mut builder = LabeledGraphBuilder::with_capacity(directed, raw.nodes.len(), raw.edges.len());
        let mut node_lookup: IndexMap<&GraphId, NodeIndex> = IndexMap::with_capacity(raw.nodes.len());

        for node in &raw.nodes {
            let key = policy.label_key(&node.attributes);
            let label = vocabulary.node_id(&key).ok_or_else(|| {
                MiningError::data(format!("graph {position}: node label {key} missing from vocabulary"))
            })?;
            node_lookup.insert(&node.id, builder.add_node(label));
        }

        for edge in &raw.edges {
            let lookup = |id: &GraphId| {
                node_lookup.get(id).copied().ok_or_else(|| {
                    MiningError::data(format!("graph {position}: unknown node id '{id}'"))
                })
            };
            let source = lookup(&edge.source)?;
            let target = lookup(&edge.target)?;
            let key = policy.label_key(&edge.attributes);
            let label = vocabulary.edge_id(&key).ok_or_else(|| {
                MiningError::data(format!("graph {position}: edge label {key} missing from vocabulary"))
            })?;
            if !builder.add_edge(source, target, label) {
                warn!(
                    "graph {}: parallel edge {} -> {} collapsed, keeping the last attributes",
                    position, edge.source, edge.target
                );
            }
        }

        Ok(builder.build())
    }
}
