use once_cell::sync::OnceCell;

use crate::canonical::{canonical_code, CanonicalCode, CanonicalError, CanonicalLabeler};
use crate::graph::LabeledGraph;

/// Candidate or confirmed frequent subgraph. The canonical code is computed
/// at most once and shared by clones made afterwards.
#[derive(Debug, Clone)]
pub struct Pattern {
    graph: LabeledGraph,
    code: OnceCell<CanonicalCode>,
}

impl Pattern {
    pub fn new(graph: LabeledGraph) -> Self {
        Self {
            graph,
            code: OnceCell::new(),
        }
    }

    pub fn graph(&self) -> &LabeledGraph {
        &self.graph
    }

    /// Pattern size is its edge count.
    pub fn size(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn canonical_code(&self) -> &CanonicalCode {
        self.code.get_or_init(|| canonical_code(&self.graph))
    }

    pub fn try_canonical_code(
        &self,
        labeler: &CanonicalLabeler<'_>,
    ) -> Result<&CanonicalCode, CanonicalError> {
        self.code.get_or_try_init(|| labeler.label(&self.graph))
    }

    pub fn cached_code(&self) -> Option<&CanonicalCode> {
        self.code.get()
    }
}

impl From<LabeledGraph> for Pattern {
    fn from(graph: LabeledGraph) -> Self {
        Self::new(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LabeledGraphBuilder;

    #[test]
    fn code_is_memoized() {
        let mut builder = LabeledGraphBuilder::new(false);
        let a = builder.add_node(0);
        let b = builder.add_node(1);
        builder.add_edge(a, b, 0);
        let pattern = Pattern::new(builder.build());
        assert!(pattern.cached_code().is_none());
        let code = pattern.canonical_code().clone();
        assert_eq!(pattern.cached_code(), Some(&code));
        assert_eq!(pattern.size(), 1);
        assert_eq!(pattern.clone().cached_code(), Some(&code));
    }
}
