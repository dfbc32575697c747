use crate::datasets::Dataset;
use crate::graph::LabeledGraph;
use crate::pipeline::embedding::{embeds, EmbeddingEngine, SearchInterrupt};

/// Outcome of scanning a candidate's graphs for embeddings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportScan {
    /// Graphs confirmed to contain the pattern, ascending.
    pub graphs: Vec<usize>,
    pub searches: usize,
    /// Set when the scan stopped early because the threshold became
    /// unreachable; `graphs` then undercounts the true support.
    pub abandoned: bool,
}

impl SupportScan {
    pub fn support(&self) -> usize {
        self.graphs.len()
    }
}

/// Graph-presence support: a graph counts once however many embeddings it
/// holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupportCounter<'a> {
    engine: EmbeddingEngine<'a>,
}

impl<'a> SupportCounter<'a> {
    pub fn new(engine: EmbeddingEngine<'a>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &EmbeddingEngine<'a> {
        &self.engine
    }

    /// Exact support across the whole dataset.
    pub fn support(&self, pattern: &LabeledGraph, dataset: &Dataset) -> Result<usize, SearchInterrupt> {
        let all: Vec<usize> = (0..dataset.len()).collect();
        Ok(self.scan(pattern, dataset, &all, 0)?.support())
    }

    /// Check `within` for embeddings, giving up as soon as `required` can no
    /// longer be reached.
    pub fn scan(
        &self,
        pattern: &LabeledGraph,
        dataset: &Dataset,
        within: &[usize],
        required: usize,
    ) -> Result<SupportScan, SearchInterrupt> {
        let mut scan = SupportScan::default();
        for (checked, &index) in within.iter().enumerate() {
            let remaining = within.len() - checked;
            if scan.graphs.len() + remaining < required {
                scan.abandoned = true;
                break;
            }
            let Some(target) = dataset.graph(index) else {
                continue;
            };
            scan.searches += 1;
            if self.engine.embeds(pattern, target)? {
                scan.graphs.push(index);
            }
        }
        Ok(scan)
    }
}

/// Unbounded support across the whole dataset.
pub fn support(pattern: &LabeledGraph, dataset: &Dataset) -> usize {
    dataset
        .graphs()
        .iter()
        .filter(|target| embeds(pattern, target))
        .count()
}
