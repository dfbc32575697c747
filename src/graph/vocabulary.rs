use std::collections::BTreeSet;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::graph::model::Attributes;

pub type LabelId = u32;

/// Selects which attributes of a node or edge make up its mining label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPolicy {
    keys: Option<Vec<String>>,
}

impl LabelPolicy {
    pub fn all_attributes() -> Self {
        Self { keys: None }
    }

    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: Some(keys.into_iter().map(Into::into).collect()),
        }
    }

    /// Render the selected attributes as key-sorted JSON. Equal attribute maps
    /// always yield the same string regardless of the order keys arrived in.
    pub fn label_key(&self, attributes: &Attributes) -> String {
        let mut selected: Vec<(&String, &Value)> = attributes
            .iter()
            .filter(|(key, _)| match &self.keys {
                Some(keys) => keys.iter().any(|k| k == *key),
                None => true,
            })
            .collect();
        selected.sort_by(|a, b| a.0.cmp(b.0));

        let mut map = Map::new();
        for (key, value) in selected {
            map.insert(key.clone(), canonical_value(value));
        }
        Value::Object(map).to_string()
    }
}

fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(inner) => {
            let mut keys: Vec<&String> = inner.keys().collect();
            keys.sort();
            let mut map = Map::new();
            for key in keys {
                map.insert(key.clone(), canonical_value(&inner[key.as_str()]));
            }
            Value::Object(map)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        other => other.clone(),
    }
}

/// Interned node and edge labels of one dataset. Ids follow the sorted order
/// of the label strings so they do not depend on input order.
#[derive(Debug, Clone, Default)]
pub struct LabelVocabulary {
    node_labels: IndexSet<String>,
    edge_labels: IndexSet<String>,
}

impl LabelVocabulary {
    pub fn from_labels<N, E>(node_labels: N, edge_labels: E) -> Self
    where
        N: IntoIterator<Item = String>,
        E: IntoIterator<Item = String>,
    {
        let nodes: BTreeSet<String> = node_labels.into_iter().collect();
        let edges: BTreeSet<String> = edge_labels.into_iter().collect();
        Self {
            node_labels: nodes.into_iter().collect(),
            edge_labels: edges.into_iter().collect(),
        }
    }

    pub fn node_id(&self, label: &str) -> Option<LabelId> {
        self.node_labels.get_index_of(label).map(|i| i as LabelId)
    }

    pub fn edge_id(&self, label: &str) -> Option<LabelId> {
        self.edge_labels.get_index_of(label).map(|i| i as LabelId)
    }

    pub fn node_label(&self, id: LabelId) -> Option<&str> {
        self.node_labels.get_index(id as usize).map(String::as_str)
    }

    pub fn edge_label(&self, id: LabelId) -> Option<&str> {
        self.edge_labels.get_index(id as usize).map(String::as_str)
    }

    pub fn node_label_count(&self) -> usize {
        self.node_labels.len()
    }

    pub fn edge_label_count(&self) -> usize {
        self.edge_labels.len()
    }

    pub fn decode_node(&self, id: LabelId) -> Attributes {
        self.node_label(id).map(decode_label).unwrap_or_default()
    }

    pub fn decode_edge(&self, id: LabelId) -> Attributes {
        self.edge_label(id).map(decode_label).unwrap_or_default()
    }
}

fn decode_label(label: &str) -> Attributes {
    match serde_json::from_str::<Value>(label) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        _ => Attributes::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, Value)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn label_key_ignores_key_order() {
        let policy = LabelPolicy::all_attributes();
        let left = attrs(&[("type", json!("x")), ("color", json!({"b": 1, "a": 2}))]);
        let right = attrs(&[("color", json!({"a": 2, "b": 1})), ("type", json!("x"))]);
        assert_eq!(policy.label_key(&left), policy.label_key(&right));
    }

    #[test]
    fn policy_keys_filter_attributes() {
        let policy = LabelPolicy::keys(["type"]);
        let left = attrs(&[("type", json!("x")), ("name", json!("alpha"))]);
        let right = attrs(&[("type", json!("x")), ("name", json!("beta"))]);
        assert_eq!(policy.label_key(&left), policy.label_key(&right));
        assert_eq!(policy.label_key(&left), r#"{"type":"x"}"#);
    }

    #[test]
    fn vocabulary_ids_follow_sorted_labels() {
        let vocab = LabelVocabulary::from_labels(
            vec!["b".to_string(), "a".to_string(), "b".to_string()],
            vec!["{}".to_string()],
        );
        assert_eq!(vocab.node_id("a"), Some(0));
        assert_eq!(vocab.node_id("b"), Some(1));
        assert_eq!(vocab.node_label_count(), 2);
        assert_eq!(vocab.edge_label(0), Some("{}"));
    }

    #[test]
    fn decode_round_trips_attribute_maps() {
        let policy = LabelPolicy::all_attributes();
        let key = policy.label_key(&attrs(&[("type", json!("y"))]));
        let vocab = LabelVocabulary::from_labels(vec![key], Vec::new());
        let decoded = vocab.decode_node(0);
        assert_eq!(decoded.get("type"), Some(&json!("y")));
    }
}
