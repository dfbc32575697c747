use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;

use crate::error::{MiningError, MiningOutcome};
use crate::graph::{GraphId, GraphLoader, LabelPolicy, LabelVocabulary, LabeledGraph, RawGraph};

const DEFAULT_ROOT: &str = "datasets";

/// Read-only collection of graphs mined in one run, plus the label vocabulary
/// shared by the graphs and every pattern grown from them.
#[derive(Debug, Clone)]
pub struct Dataset {
    graphs: Vec<LabeledGraph>,
    ids: Vec<GraphId>,
    vocabulary: LabelVocabulary,
    directed: bool,
}

impl Dataset {
    /// Validate and intern a list of raw graphs. Fails fast on an empty
    /// dataset, duplicate node ids, dangling edges or mixed directedness.
    pub fn from_raw_graphs(raw: &[RawGraph], policy: &LabelPolicy) -> MiningOutcome<Self> {
        let Some(first) = raw.first() else {
            return Err(MiningError::data("dataset contains no graphs"));
        };
        let directed = first.directed;
        for (position, graph) in raw.iter().enumerate() {
            if graph.directed != directed {
                return Err(MiningError::data(format!(
                    "graph {position} is {} but the dataset is {}",
                    direction_name(graph.directed),
                    direction_name(directed)
                )));
            }
            GraphLoader::validate(graph, position)?;
        }

        let vocabulary = LabelVocabulary::from_labels(
            raw.iter()
                .flat_map(|g| g.nodes.iter().map(|n| policy.label_key(&n.attributes))),
            raw.iter()
                .flat_map(|g| g.edges.iter().map(|e| policy.label_key(&e.attributes))),
        );

        let graphs = raw
            .iter()
            .enumerate()
            .map(|(position, graph)| {
                GraphLoader::build(graph, position, &vocabulary, policy, directed)
            })
            .collect::<MiningOutcome<Vec<_>>>()?;
        let ids = raw
            .iter()
            .enumerate()
            .map(|(position, graph)| graph_name(graph, position))
            .collect();

        debug!(
            "Dataset built: {} graphs, {} node labels, {} edge labels, directed={}",
            graphs.len(),
            vocabulary.node_label_count(),
            vocabulary.edge_label_count(),
            directed
        );

        Ok(Self {
            graphs,
            ids,
            vocabulary,
            directed,
        })
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    pub fn directed(&self) -> bool {
        self.directed
    }

    pub fn graphs(&self) -> &[LabeledGraph] {
        &self.graphs
    }

    pub fn graph(&self, index: usize) -> Option<&LabeledGraph> {
        self.graphs.get(index)
    }

    pub fn graph_id(&self, index: usize) -> Option<&GraphId> {
        self.ids.get(index)
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }
}

fn direction_name(directed: bool) -> &'static str {
    if directed {
        "directed"
    } else {
        "undirected"
    }
}

fn graph_name(graph: &RawGraph, position: usize) -> GraphId {
    ["id", "name"]
        .iter()
        .find_map(|key| match graph.graph_attributes.get(*key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| format!("g{position}"))
}

/// File-system data source rooted at a dataset directory.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    root: PathBuf,
    policy: LabelPolicy,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl DatasetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: LabelPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LabelPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn load(&self, relative: impl AsRef<Path>) -> Result<Dataset> {
        let path = self.root.join(relative);
        let raw = GraphLoader::parse_dataset_path(&path)?;
        Dataset::from_raw_graphs(&raw, &self.policy)
            .with_context(|| format!("load dataset from {:?}", path))
    }
}
