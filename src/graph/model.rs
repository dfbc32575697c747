use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub type GraphId = String;

pub type Attributes = IndexMap<String, Value>;

/// Wire form of a single graph as handed over by the data source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawGraph {
    pub nodes: Vec<RawNode>,
    pub edges: Vec<RawEdge>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub graph_attributes: Attributes,
    #[serde(default)]
    pub directed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawNode {
    #[serde(deserialize_with = "id_from_value")]
    pub id: GraphId,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawEdge {
    #[serde(deserialize_with = "id_from_value")]
    pub source: GraphId,
    #[serde(deserialize_with = "id_from_value")]
    pub target: GraphId,
    #[serde(default)]
    pub attributes: Attributes,
}

/// Accepted dataset layouts: one graph, a bare list of graphs, or a wrapper
/// object carrying the dataset-wide direction flag.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawDataset {
    Wrapped {
        graphs: Vec<RawGraph>,
        #[serde(default)]
        directed: Option<bool>,
    },
    Many(Vec<RawGraph>),
    Single(RawGraph),
}

impl RawDataset {
    pub fn into_graphs(self) -> Vec<RawGraph> {
        match self {
            RawDataset::Wrapped { graphs, directed } => match directed {
                Some(flag) => graphs
                    .into_iter()
                    .map(|mut graph| {
                        graph.directed = flag;
                        graph
                    })
                    .collect(),
                None => graphs,
            },
            RawDataset::Many(graphs) => graphs,
            RawDataset::Single(graph) => vec![graph],
        }
    }
}

fn id_from_value<'de, D>(deserializer: D) -> Result<GraphId, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(num) => Ok(num.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "node id must be a string or number, got {other}"
        ))),
    }
}
