use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde_json::Value;

use crate::graph::{RawEdge, RawGraph, RawNode};

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub graphs: usize,
    pub nodes: usize,
    /// Chance that any ordered (directed) or unordered pair gets an edge.
    pub edge_probability: f64,
    pub node_types: Vec<String>,
    pub edge_types: Vec<String>,
    pub directed: bool,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            graphs: 10,
            nodes: 8,
            edge_probability: 0.1,
            node_types: ["x", "y", "z"].map(String::from).to_vec(),
            edge_types: ["a", "b", "c"].map(String::from).to_vec(),
            directed: false,
            seed: None,
        }
    }
}

/// Seeded random labeled graphs in the loader's wire format. Node and edge
/// labels live under the `type` attribute.
pub struct DatasetGenerator;

impl DatasetGenerator {
    pub fn generate(config: &GeneratorConfig) -> Result<Vec<RawGraph>> {
        if config.graphs == 0 {
            return Err(anyhow!("Requested graph count must be greater than zero"));
        }
        if config.nodes == 0 {
            return Err(anyhow!("Requested node count must be greater than zero"));
        }
        if config.node_types.is_empty() || config.edge_types.is_empty() {
            return Err(anyhow!("Node and edge type lists must not be empty"));
        }
        if !(0.0..=1.0).contains(&config.edge_probability) {
            return Err(anyhow!(
                "Edge probability {} is outside [0, 1]",
                config.edge_probability
            ));
        }

        let base_seed = config.seed.unwrap_or_else(random_seed);
        let graphs = (0..config.graphs)
            .into_par_iter()
            .map(|index| {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(base_seed.wrapping_add(index as u64));
                generate_graph(config, index, &mut rng)
            })
            .collect();
        Ok(graphs)
    }
}

fn generate_graph(config: &GeneratorConfig, index: usize, rng: &mut Xoshiro256PlusPlus) -> RawGraph {
    let nodes: Vec<RawNode> = (0..config.nodes)
        .map(|node| RawNode {
            id: format!("v{node}"),
            attributes: typed(pick(&config.node_types, rng)),
        })
        .collect();

    let mut edges = Vec::new();
    for source in 0..config.nodes {
        let targets = if config.directed { 0 } else { source + 1 }..config.nodes;
        for target in targets {
            if source == target {
                continue;
            }
            if rng.gen_bool(config.edge_probability) {
                edges.push(RawEdge {
                    source: format!("v{source}"),
                    target: format!("v{target}"),
                    attributes: typed(pick(&config.edge_types, rng)),
                });
            }
        }
    }

    let mut graph_attributes = IndexMap::new();
    graph_attributes.insert("name".to_string(), Value::String(format!("synthetic-{index}")));
    RawGraph {
        nodes,
        edges,
        graph_attributes,
        directed: config.directed,
    }
}

fn pick<'a>(types: &'a [String], rng: &mut Xoshiro256PlusPlus) -> &'a str {
    types.choose(rng).map(String::as_str).unwrap_or_default()
}

fn typed(value: &str) -> IndexMap<String, Value> {
    let mut attributes = IndexMap::new();
    attributes.insert("type".to_string(), Value::String(value.to_string()));
    attributes
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
