use std::collections::{BTreeMap, BTreeSet};

use indexmap::map::Entry;
use indexmap::IndexMap;
use log::{debug, trace, warn};
use petgraph::prelude::NodeIndex;
use rayon::prelude::*;

use crate::canonical::{CanonicalCode, CanonicalError, CanonicalLabeler};
use crate::datasets::Dataset;
use crate::graph::{LabelId, LabeledGraph, LabeledGraphBuilder};
use crate::pattern::Pattern;
use crate::pipeline::embedding::{Embedding, EmbeddingEngine, SearchInterrupt};
use crate::pipeline::workflow::{FrequentPattern, SkippedCandidate};

/// One-edge growth step applied to a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Extension {
    /// New edge between two existing pattern nodes; `source == target` adds a
    /// self-loop. Undirected extensions keep `source <= target`.
    Close {
        source: u32,
        target: u32,
        label: LabelId,
    },
    /// New node attached to `anchor`. `outward` means the edge points from the
    /// anchor to the new node.
    Grow {
        anchor: u32,
        node_label: LabelId,
        edge_label: LabelId,
        outward: bool,
    },
}

impl Extension {
    pub fn apply(&self, pattern: &LabeledGraph) -> LabeledGraph {
        let mut builder = LabeledGraphBuilder::from_graph(pattern);
        match *self {
            Extension::Close {
                source,
                target,
                label,
            } => {
                builder.add_edge(
                    NodeIndex::new(source as usize),
                    NodeIndex::new(target as usize),
                    label,
                );
            }
            Extension::Grow {
                anchor,
                node_label,
                edge_label,
                outward,
            } => {
                let anchor = NodeIndex::new(anchor as usize);
                let added = builder.add_node(node_label);
                if outward {
                    builder.add_edge(anchor, added, edge_label);
                } else {
                    builder.add_edge(added, anchor, edge_label);
                }
            }
        }
        builder.build()
    }
}

/// Candidate pattern awaiting support counting.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub pattern: Pattern,
    /// Graphs that can still contain the pattern: the intersection of the
    /// supporting graphs of every parent it was grown from.
    pub graphs: Vec<usize>,
    pub parents: usize,
}

impl Candidate {
    pub fn code(&self) -> &CanonicalCode {
        self.pattern.canonical_code()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExtensionSettings<'a> {
    pub engine: EmbeddingEngine<'a>,
    pub labeler: CanonicalLabeler<'a>,
    pub embeddings_per_graph: Option<usize>,
    pub max_candidates: Option<usize>,
    pub parallel: bool,
}

/// Candidate set produced by one generation round, frozen before counting.
#[derive(Debug, Default)]
pub struct CandidateRound {
    pub candidates: Vec<Candidate>,
    pub generated: usize,
    pub duplicates: usize,
    pub truncated_graphs: usize,
    pub skipped: Vec<SkippedCandidate>,
}

#[derive(Debug, Default)]
struct ExtensionScan {
    extensions: BTreeSet<Extension>,
    truncated_graphs: usize,
}

pub struct CandidateGenerator;

impl CandidateGenerator {
    /// Every distinct single-edge label combination present in the dataset,
    /// with the graphs it was seen in.
    pub fn seeds(dataset: &Dataset) -> Vec<Candidate> {
        let directed = dataset.directed();
        let mut observed: BTreeMap<(LabelId, LabelId, LabelId, bool), Vec<usize>> = BTreeMap::new();

        for (index, graph) in dataset.graphs().iter().enumerate() {
            for (source, target, label) in graph.edges() {
                let (a, b) = (graph.node_label(source), graph.node_label(target));
                let (a, b) = if directed || a <= b { (a, b) } else { (b, a) };
                let graphs = observed.entry((a, label, b, source == target)).or_default();
                if graphs.last() != Some(&index) {
                    graphs.push(index);
                }
            }
        }

        let seeds: Vec<Candidate> = observed
            .into_iter()
            .map(|((a, label, b, self_loop), graphs)| {
                let mut builder = LabeledGraphBuilder::with_capacity(directed, 2, 1);
                let first = builder.add_node(a);
                if self_loop {
                    builder.add_edge(first, first, label);
                } else {
                    let second = builder.add_node(b);
                    builder.add_edge(first, second, label);
                }
                Candidate {
                    pattern: Pattern::new(builder.build()),
                    graphs,
                    parents: 0,
                }
            })
            .collect();
        debug!("Seed round: {} single-edge label combinations", seeds.len());
        seeds
    }

    /// Record every one-edge extension that the target graph offers around a
    /// single embedding of `pattern`.
    pub fn extensions_from_embedding(
        pattern: &LabeledGraph,
        target: &LabeledGraph,
        embedding: &Embedding,
        extensions: &mut BTreeSet<Extension>,
    ) {
        let position_of = |node: NodeIndex| embedding.iter().position(|image| *image == node);

        for (u, &image) in embedding.iter().enumerate() {
            let pattern_node = NodeIndex::new(u);
            for (neighbor, label) in target.out_edges(image) {
                match position_of(neighbor) {
                    Some(v) => {
                        if pattern.has_edge(pattern_node, NodeIndex::new(v)) {
                            continue;
                        }
                        let (source, target_node) = if pattern.directed() || u <= v {
                            (u, v)
                        } else {
                            (v, u)
                        };
                        extensions.insert(Extension::Close {
                            source: source as u32,
                            target: target_node as u32,
                            label,
                        });
                    }
                    None => {
                        extensions.insert(Extension::Grow {
                            anchor: u as u32,
                            node_label: target.node_label(neighbor),
                            edge_label: label,
                            outward: true,
                        });
                    }
                }
            }

            if target.directed() {
                // Incoming edges between mapped nodes are seen as outgoing
                // edges of the other endpoint.
                for (neighbor, label) in target.in_edges(image) {
                    if position_of(neighbor).is_none() {
                        extensions.insert(Extension::Grow {
                            anchor: u as u32,
                            node_label: target.node_label(neighbor),
                            edge_label: label,
                            outward: false,
                        });
                    }
                }
            }
        }
    }

    /// Grow every frontier pattern by one edge, keeping only extensions
    /// grounded in an observed embedding, and merge candidates that share a
    /// canonical code. Step exhaustion only truncates enumeration, so the
    /// error is always `SearchInterrupt::Cancelled`.
    pub fn extend(
        frontier: &[FrequentPattern],
        dataset: &Dataset,
        settings: &ExtensionSettings<'_>,
    ) -> Result<CandidateRound, SearchInterrupt> {
        let scans: Vec<Result<ExtensionScan, SearchInterrupt>> = if settings.parallel {
            frontier
                .par_iter()
                .map(|parent| Self::scan_parent(parent, dataset, settings))
                .collect()
        } else {
            frontier
                .iter()
                .map(|parent| Self::scan_parent(parent, dataset, settings))
                .collect()
        };

        let mut round = CandidateRound::default();
        let mut children: Vec<(usize, Pattern)> = Vec::new();
        for (parent_index, scan) in scans.into_iter().enumerate() {
            let scan = scan?;
            round.truncated_graphs += scan.truncated_graphs;
            let parent = frontier[parent_index].pattern.graph();
            for extension in scan.extensions {
                children.push((parent_index, Pattern::new(extension.apply(parent))));
            }
        }
        round.generated = children.len();

        let labeled: Vec<Result<(), CanonicalError>> = if settings.parallel {
            children
                .par_iter()
                .map(|(_, child)| child.try_canonical_code(&settings.labeler).map(|_| ()))
                .collect()
        } else {
            children
                .iter()
                .map(|(_, child)| child.try_canonical_code(&settings.labeler).map(|_| ()))
                .collect()
        };

        let mut merged: IndexMap<CanonicalCode, Candidate> = IndexMap::new();
        for ((parent_index, child), labeled) in children.into_iter().zip(labeled) {
            match labeled {
                Ok(()) => {}
                Err(CanonicalError::Cancelled) => return Err(SearchInterrupt::Cancelled),
                Err(err @ CanonicalError::LeafBudget { .. }) => {
                    warn!(
                        "Skipping size-{} candidate grown from frontier pattern {}: {}",
                        child.size(),
                        parent_index,
                        err
                    );
                    round.skipped.push(SkippedCandidate {
                        code: None,
                        size: child.size(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            }

            let parent_graphs = &frontier[parent_index].graphs;
            let code = child.canonical_code().clone();
            match merged.entry(code) {
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    existing.graphs = intersect_sorted(&existing.graphs, parent_graphs);
                    existing.parents += 1;
                    round.duplicates += 1;
                }
                Entry::Vacant(entry) => {
                    trace!("New candidate {}", entry.key());
                    entry.insert(Candidate {
                        pattern: child,
                        graphs: parent_graphs.clone(),
                        parents: 1,
                    });
                }
            }
        }

        let mut candidates: Vec<Candidate> = merged.into_values().collect();
        if let Some(limit) = settings.max_candidates {
            if candidates.len() > limit {
                warn!(
                    "Candidate set of {} exceeds the ceiling of {}; skipping the remainder",
                    candidates.len(),
                    limit
                );
                for dropped in candidates.drain(limit..) {
                    round.skipped.push(SkippedCandidate {
                        code: Some(dropped.code().to_string()),
                        size: dropped.pattern.size(),
                        reason: format!("candidate set exceeded {limit} entries"),
                    });
                }
            }
        }
        round.candidates = candidates;

        debug!(
            "Extension round: {} generated, {} duplicates merged, {} distinct candidates",
            round.generated,
            round.duplicates,
            round.candidates.len()
        );
        Ok(round)
    }

    fn scan_parent(
        parent: &FrequentPattern,
        dataset: &Dataset,
        settings: &ExtensionSettings<'_>,
    ) -> Result<ExtensionScan, SearchInterrupt> {
        let mut scan = ExtensionScan::default();
        let pattern = parent.pattern.graph();
        for &index in &parent.graphs {
            let Some(target) = dataset.graph(index) else {
                continue;
            };
            let set = settings
                .engine
                .embeddings(pattern, target, settings.embeddings_per_graph)?;
            if set.truncated {
                scan.truncated_graphs += 1;
                warn!(
                    "Embedding enumeration for pattern {} in graph {} truncated; extensions may be incomplete",
                    parent.pattern.canonical_code(),
                    dataset
                        .graph_id(index)
                        .map(String::as_str)
                        .unwrap_or("<unknown>")
                );
            }
            for embedding in &set.embeddings {
                Self::extensions_from_embedding(pattern, target, embedding, &mut scan.extensions);
            }
        }
        Ok(scan)
    }
}

pub(crate) fn intersect_sorted(left: &[usize], right: &[usize]) -> Vec<usize> {
    let mut result = Vec::with_capacity(left.len().min(right.len()));
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                result.push(left[i]);
                i += 1;
                j += 1;
            }
        }
    }
    result
}
