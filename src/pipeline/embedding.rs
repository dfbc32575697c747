//! Subgraph monomorphism search.
//!
//! Pattern nodes are placed in a fixed order: the best-connected node first,
//! then always the node with the most already-placed neighbours. Each later
//! node draws its candidates from the target neighbourhood of one placed
//! neighbour (its anchor), so candidate lists stay local. Backtracking runs on
//! an explicit frame stack; recursion depth never grows with pattern size.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::ops::ControlFlow;

use petgraph::prelude::NodeIndex;

use crate::cancel::CancellationToken;
use crate::graph::{LabelId, LabeledGraph};

const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Target node for every pattern node, indexed by pattern node index.
pub type Embedding = Vec<NodeIndex>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchInterrupt {
    Exhausted { steps: u64 },
    Cancelled,
}

impl fmt::Display for SearchInterrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { steps } => write!(f, "embedding search exceeded {steps} steps"),
            Self::Cancelled => f.write_str("embedding search cancelled"),
        }
    }
}

impl std::error::Error for SearchInterrupt {}

/// Embeddings collected for extension, possibly cut short by a limit.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingSet {
    pub embeddings: Vec<Embedding>,
    pub truncated: bool,
}

/// Budgeted, cancellable embedding search.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddingEngine<'a> {
    max_steps: Option<u64>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> EmbeddingEngine<'a> {
    pub fn new(max_steps: Option<u64>) -> Self {
        Self {
            max_steps,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Existence check; stops at the first embedding.
    pub fn embeds(
        &self,
        pattern: &LabeledGraph,
        target: &LabeledGraph,
    ) -> Result<bool, SearchInterrupt> {
        let mut found = false;
        search(pattern, target, |steps| self.tick(steps), |_| {
            found = true;
            ControlFlow::Break(())
        })?;
        Ok(found)
    }

    /// Number of distinct injective mappings, counting at most `cap`.
    pub fn count_embeddings(
        &self,
        pattern: &LabeledGraph,
        target: &LabeledGraph,
        cap: usize,
    ) -> Result<usize, SearchInterrupt> {
        if cap == 0 {
            return Ok(0);
        }
        let mut count = 0usize;
        search(pattern, target, |steps| self.tick(steps), |_| {
            count += 1;
            if count >= cap {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(count)
    }

    /// Collect embeddings, stopping once `limit` have been found or the step
    /// ceiling is reached. Only cancellation is reported as an error.
    pub fn embeddings(
        &self,
        pattern: &LabeledGraph,
        target: &LabeledGraph,
        limit: Option<usize>,
    ) -> Result<EmbeddingSet, SearchInterrupt> {
        let mut set = EmbeddingSet::default();
        if limit == Some(0) {
            set.truncated = true;
            return Ok(set);
        }
        let mut embeddings = Vec::new();
        let mut truncated = false;
        let outcome = search(pattern, target, |steps| self.tick(steps), |mapping| {
            embeddings.push(mapping.iter().flatten().copied().collect());
            match limit {
                Some(limit) if embeddings.len() >= limit => {
                    truncated = true;
                    ControlFlow::Break(())
                }
                _ => ControlFlow::Continue(()),
            }
        });
        match outcome {
            Ok(()) => {}
            // Keep what was found before the step ceiling; the caller sees a
            // truncated set rather than nothing.
            Err(SearchInterrupt::Exhausted { .. }) => truncated = true,
            Err(interrupt) => return Err(interrupt),
        }
        set.embeddings = embeddings;
        set.truncated = truncated;
        Ok(set)
    }

    fn tick(&self, steps: u64) -> Result<(), SearchInterrupt> {
        if let Some(limit) = self.max_steps {
            if steps > limit {
                return Err(SearchInterrupt::Exhausted { steps: limit });
            }
        }
        if steps % CANCEL_CHECK_INTERVAL == 0 {
            if let Some(token) = self.cancel {
                if token.is_cancelled() {
                    return Err(SearchInterrupt::Cancelled);
                }
            }
        }
        Ok(())
    }
}

/// Unbounded existence check.
pub fn embeds(pattern: &LabeledGraph, target: &LabeledGraph) -> bool {
    let mut found = false;
    let outcome = search(pattern, target, |_| Ok::<(), Infallible>(()), |_| {
        found = true;
        ControlFlow::Break(())
    });
    match outcome {
        Ok(()) => found,
        Err(never) => match never {},
    }
}

/// Unbounded embedding count, capped at `cap`.
pub fn count_embeddings(pattern: &LabeledGraph, target: &LabeledGraph, cap: usize) -> usize {
    if cap == 0 {
        return 0;
    }
    let mut count = 0usize;
    let outcome = search(pattern, target, |_| Ok::<(), Infallible>(()), |_| {
        count += 1;
        if count >= cap {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    match outcome {
        Ok(()) => count,
        Err(never) => match never {},
    }
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    node: NodeIndex,
    label: LabelId,
    /// Pattern edge runs anchor -> node.
    outward: bool,
}

#[derive(Debug)]
struct SearchPlan {
    order: Vec<NodeIndex>,
    anchors: Vec<Option<Anchor>>,
}

impl SearchPlan {
    fn build(pattern: &LabeledGraph) -> Self {
        let n = pattern.node_count();
        let degree = |node: NodeIndex| {
            pattern.out_degree(node)
                + if pattern.directed() {
                    pattern.in_degree(node)
                } else {
                    0
                }
        };
        let mut placed = vec![false; n];
        let mut links = vec![0usize; n];
        let mut order = Vec::with_capacity(n);
        let mut anchors = Vec::with_capacity(n);

        for _ in 0..n {
            let Some(next) = pattern
                .node_indices()
                .filter(|node| !placed[node.index()])
                .max_by(|a, b| {
                    links[a.index()]
                        .cmp(&links[b.index()])
                        .then(degree(*a).cmp(&degree(*b)))
                        .then(b.index().cmp(&a.index()))
                })
            else {
                break;
            };

            anchors.push(find_anchor(pattern, &placed, next));
            placed[next.index()] = true;
            order.push(next);
            for (neighbor, _) in pattern.out_edges(next).chain(pattern.in_edges(next)) {
                if neighbor != next {
                    links[neighbor.index()] += 1;
                }
            }
        }

        Self { order, anchors }
    }
}

fn find_anchor(pattern: &LabeledGraph, placed: &[bool], node: NodeIndex) -> Option<Anchor> {
    pattern
        .in_edges(node)
        .find(|(source, _)| *source != node && placed[source.index()])
        .map(|(source, label)| Anchor {
            node: source,
            label,
            outward: true,
        })
        .or_else(|| {
            pattern
                .out_edges(node)
                .find(|(target, _)| *target != node && placed[target.index()])
                .map(|(target, label)| Anchor {
                    node: target,
                    label,
                    outward: false,
                })
        })
}

struct Frame {
    candidates: Vec<NodeIndex>,
    cursor: usize,
}

/// Label and size fingerprint: cheap necessary conditions for an embedding.
fn compatible(pattern: &LabeledGraph, target: &LabeledGraph) -> bool {
    if pattern.directed() != target.directed()
        || pattern.node_count() > target.node_count()
        || pattern.edge_count() > target.edge_count()
    {
        return false;
    }
    let mut required: HashMap<LabelId, usize> = HashMap::new();
    for node in pattern.node_indices() {
        *required.entry(pattern.node_label(node)).or_insert(0) += 1;
    }
    let mut available: HashMap<LabelId, usize> = HashMap::new();
    for node in target.node_indices() {
        let label = target.node_label(node);
        if required.contains_key(&label) {
            *available.entry(label).or_insert(0) += 1;
        }
    }
    required
        .iter()
        .all(|(label, count)| available.get(label).copied().unwrap_or(0) >= *count)
}

fn search<E>(
    pattern: &LabeledGraph,
    target: &LabeledGraph,
    mut tick: impl FnMut(u64) -> Result<(), E>,
    mut on_match: impl FnMut(&[Option<NodeIndex>]) -> ControlFlow<()>,
) -> Result<(), E> {
    if pattern.is_empty() {
        let _ = on_match(&[]);
        return Ok(());
    }
    if !compatible(pattern, target) {
        return Ok(());
    }

    let plan = SearchPlan::build(pattern);
    let depth = plan.order.len();
    let mut mapping: Vec<Option<NodeIndex>> = vec![None; pattern.node_count()];
    let mut used = vec![false; target.node_count()];
    let mut stack: Vec<Frame> = Vec::with_capacity(depth);
    stack.push(Frame {
        candidates: candidates(pattern, target, &plan, 0, &mapping),
        cursor: 0,
    });
    let mut steps = 0u64;

    while let Some(top) = stack.len().checked_sub(1) {
        let node = plan.order[top];
        if let Some(previous) = mapping[node.index()].take() {
            used[previous.index()] = false;
        }

        let frame = &mut stack[top];
        if frame.cursor >= frame.candidates.len() {
            stack.pop();
            continue;
        }
        let candidate = frame.candidates[frame.cursor];
        frame.cursor += 1;

        steps += 1;
        tick(steps)?;

        if !feasible(pattern, target, &mapping, &used, node, candidate) {
            continue;
        }
        mapping[node.index()] = Some(candidate);
        used[candidate.index()] = true;

        if top + 1 == depth {
            if on_match(&mapping).is_break() {
                return Ok(());
            }
            continue;
        }

        let next = candidates(pattern, target, &plan, top + 1, &mapping);
        stack.push(Frame {
            candidates: next,
            cursor: 0,
        });
    }

    Ok(())
}

fn candidates(
    pattern: &LabeledGraph,
    target: &LabeledGraph,
    plan: &SearchPlan,
    position: usize,
    mapping: &[Option<NodeIndex>],
) -> Vec<NodeIndex> {
    let node = plan.order[position];
    let label = pattern.node_label(node);
    let anchored = plan.anchors[position]
        .and_then(|anchor| mapping[anchor.node.index()].map(|image| (anchor, image)));

    match anchored {
        Some((anchor, image)) => {
            let edges: Vec<(NodeIndex, LabelId)> = if anchor.outward {
                target.out_edges(image).collect()
            } else {
                target.in_edges(image).collect()
            };
            edges
                .into_iter()
                .filter(|(neighbor, edge_label)| {
                    *edge_label == anchor.label && target.node_label(*neighbor) == label
                })
                .map(|(neighbor, _)| neighbor)
                .collect()
        }
        None => target
            .node_indices()
            .filter(|candidate| target.node_label(*candidate) == label)
            .collect(),
    }
}

fn feasible(
    pattern: &LabeledGraph,
    target: &LabeledGraph,
    mapping: &[Option<NodeIndex>],
    used: &[bool],
    node: NodeIndex,
    candidate: NodeIndex,
) -> bool {
    if used[candidate.index()]
        || pattern.node_label(node) != target.node_label(candidate)
        || target.out_degree(candidate) < pattern.out_degree(node)
    {
        return false;
    }
    if pattern.directed() && target.in_degree(candidate) < pattern.in_degree(node) {
        return false;
    }

    for (neighbor, label) in pattern.out_edges(node) {
        let image = if neighbor == node {
            Some(candidate)
        } else {
            mapping[neighbor.index()]
        };
        if let Some(image) = image {
            if target.edge_label(candidate, image) != Some(label) {
                return false;
            }
        }
    }
    if pattern.directed() {
        for (neighbor, label) in pattern.in_edges(node) {
            if neighbor == node {
                continue;
            }
            if let Some(image) = mapping[neighbor.index()] {
                if target.edge_label(image, candidate) != Some(label) {
                    return false;
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LabeledGraphBuilder;

    fn build(directed: bool, labels: &[LabelId], edges: &[(usize, usize, LabelId)]) -> LabeledGraph {
        let mut builder = LabeledGraphBuilder::new(directed);
        let nodes: Vec<_> = labels.iter().map(|l| builder.add_node(*l)).collect();
        for (a, b, l) in edges {
            builder.add_edge(nodes[*a], nodes[*b], *l);
        }
        builder.build()
    }

    fn square_with_diagonal() -> LabeledGraph {
        build(
            false,
            &[0, 1, 0, 1],
            &[(0, 1, 0), (1, 2, 0), (2, 3, 0), (3, 0, 0), (0, 2, 1)],
        )
    }

    #[test]
    fn path_embeds_into_square() {
        let path = build(false, &[0, 1, 0], &[(0, 1, 0), (1, 2, 0)]);
        assert!(embeds(&path, &square_with_diagonal()));
    }

    #[test]
    fn label_mismatch_rejects() {
        let wrong_edge = build(false, &[0, 1], &[(0, 1, 1)]);
        assert!(!embeds(&wrong_edge, &square_with_diagonal()));
        let wrong_node = build(false, &[2, 1], &[(0, 1, 0)]);
        assert!(!embeds(&wrong_node, &square_with_diagonal()));
    }

    #[test]
    fn embeddings_are_not_induced() {
        // The target has the diagonal 0-2; the two-hop path still embeds.
        let hop = build(false, &[0, 1, 0], &[(0, 1, 0), (1, 2, 0)]);
        let set = EmbeddingEngine::default()
            .embeddings(&hop, &square_with_diagonal(), None)
            .expect("search");
        assert!(!set.truncated);
        // Two middle nodes, two orientations of the ends each.
        assert_eq!(set.embeddings.len(), 4);
        for embedding in &set.embeddings {
            assert_eq!(embedding.len(), 3);
            assert_ne!(embedding[0], embedding[2]);
        }
    }

    #[test]
    fn count_respects_cap() {
        let edge = build(false, &[0, 1], &[(0, 1, 0)]);
        let target = square_with_diagonal();
        assert_eq!(count_embeddings(&edge, &target, 100), 4);
        assert_eq!(count_embeddings(&edge, &target, 2), 2);
        assert_eq!(count_embeddings(&edge, &target, 0), 0);
    }

    #[test]
    fn direction_is_respected() {
        let forward = build(true, &[0, 1], &[(0, 1, 0)]);
        let target = build(true, &[1, 0], &[(0, 1, 0)]);
        assert!(!embeds(&forward, &target));
        let reverse = build(true, &[1, 0], &[(0, 1, 0)]);
        assert!(embeds(&reverse, &target));
    }

    #[test]
    fn self_loop_requires_target_loop() {
        let looped = build(false, &[0], &[(0, 0, 0)]);
        let plain = build(false, &[0, 0], &[(0, 1, 0)]);
        assert!(!embeds(&looped, &plain));
        let target = build(false, &[0, 0], &[(0, 1, 0), (1, 1, 0)]);
        assert!(embeds(&looped, &target));
    }

    #[test]
    fn triangle_does_not_embed_into_path() {
        let triangle = build(false, &[0, 0, 0], &[(0, 1, 0), (1, 2, 0), (2, 0, 0)]);
        let path = build(false, &[0, 0, 0, 0], &[(0, 1, 0), (1, 2, 0), (2, 3, 0)]);
        assert!(!embeds(&triangle, &path));
    }

    #[test]
    fn empty_pattern_always_embeds() {
        let empty = build(false, &[], &[]);
        assert!(embeds(&empty, &square_with_diagonal()));
    }

    #[test]
    fn step_budget_interrupts_search() {
        let triangle = build(false, &[0, 0, 0], &[(0, 1, 0), (1, 2, 0), (2, 0, 0)]);
        let mut edges = Vec::new();
        for i in 0..12 {
            edges.push((i, (i + 1) % 12, 0));
        }
        let ring = build(false, &[0; 12], &edges);
        let engine = EmbeddingEngine::new(Some(5));
        assert_eq!(
            engine.embeds(&triangle, &ring),
            Err(SearchInterrupt::Exhausted { steps: 5 })
        );
    }

    #[test]
    fn cancelled_token_stops_search() {
        let token = CancellationToken::new();
        token.cancel();
        let triangle = build(false, &[0, 0, 0], &[(0, 1, 0), (1, 2, 0), (2, 0, 0)]);
        // Complete bipartite target: no triangle, plenty of partial mappings.
        let mut edges = Vec::new();
        for i in 0..64 {
            for j in (i + 1)..64 {
                if (i + j) % 2 == 1 {
                    edges.push((i, j, 0));
                }
            }
        }
        let target = build(false, &[0; 64], &edges);
        let engine = EmbeddingEngine::default().with_cancellation(&token);
        assert_eq!(
            engine.embeds(&triangle, &target),
            Err(SearchInterrupt::Cancelled)
        );
    }
}
