use std::time::Instant;

use anyhow::Result;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::canonical::CanonicalLabeler;
use crate::datasets::Dataset;
use crate::error::{MiningError, MiningOutcome};
use crate::graph::{GraphWriter, LabelPolicy, RawGraph};
use crate::params::MiningParameters;
use crate::pattern::Pattern;
use crate::pipeline::candidate::{Candidate, CandidateGenerator, ExtensionSettings};
use crate::pipeline::embedding::{EmbeddingEngine, SearchInterrupt};
use crate::pipeline::support::SupportCounter;

/// Engine tunables. Every ceiling is optional; `None` lifts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Backtracking steps allowed for one (pattern, graph) embedding search.
    pub max_search_steps: Option<u64>,
    /// Embeddings enumerated per graph when looking for extensions.
    pub max_embeddings_per_graph: Option<usize>,
    pub max_canonical_leaves: Option<usize>,
    pub max_candidates_per_round: Option<usize>,
    /// Cap for diagnostic embedding counts.
    pub embedding_count_cap: usize,
    /// Attribute keys that make up node and edge labels. `None` uses all of them.
    pub label_attributes: Option<Vec<String>>,
    pub parallel: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            max_search_steps: Some(2_000_000),
            max_embeddings_per_graph: Some(10_000),
            max_canonical_leaves: Some(200_000),
            max_candidates_per_round: None,
            embedding_count_cap: 64,
            label_attributes: None,
            parallel: true,
        }
    }
}

impl MinerConfig {
    pub fn label_policy(&self) -> LabelPolicy {
        match &self.label_attributes {
            Some(keys) => LabelPolicy::keys(keys.iter().cloned()),
            None => LabelPolicy::all_attributes(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MiningState {
    Seeding,
    Extending,
    Counting,
    Pruning,
    Done,
}

/// Pattern that met the support threshold, with the graphs that contain it.
#[derive(Debug, Clone)]
pub struct FrequentPattern {
    pub pattern: Pattern,
    pub support: usize,
    /// Supporting dataset graphs, ascending.
    pub graphs: Vec<usize>,
}

/// Candidate dropped because it exceeded a cost ceiling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedCandidate {
    pub code: Option<String>,
    pub size: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoundStats {
    pub size: usize,
    pub generated: usize,
    pub duplicates: usize,
    pub candidates: usize,
    pub support_evaluations: usize,
    pub embedding_searches: usize,
    pub frequent: usize,
    pub pruned: usize,
    pub skipped: usize,
    pub truncated_enumerations: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MiningStats {
    /// Completed generation rounds.
    pub rounds: usize,
    pub generated: usize,
    pub duplicates: usize,
    pub support_evaluations: usize,
    pub embedding_searches: usize,
    pub pruned: usize,
    pub skipped: usize,
    pub truncated_enumerations: usize,
    pub duration_ms: u64,
    pub per_round: Vec<RoundStats>,
}

impl MiningStats {
    fn record(&mut self, round: RoundStats) {
        self.rounds += 1;
        self.generated += round.generated;
        self.duplicates += round.duplicates;
        self.support_evaluations += round.support_evaluations;
        self.embedding_searches += round.embedding_searches;
        self.pruned += round.pruned;
        self.skipped += round.skipped;
        self.truncated_enumerations += round.truncated_enumerations;
        self.per_round.push(round);
    }
}

/// Frequent patterns of one run, ordered by size then canonical code.
#[derive(Debug, Clone)]
pub struct MiningResult {
    pub patterns: Vec<FrequentPattern>,
    pub min_support_count: usize,
    pub dataset_size: usize,
    /// Set when the run was cancelled; only fully completed rounds are included.
    pub partial: bool,
    pub stats: MiningStats,
    pub skipped: Vec<SkippedCandidate>,
}

impl MiningResult {
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn support_fraction(&self, pattern: &FrequentPattern) -> f64 {
        if self.dataset_size == 0 {
            0.0
        } else {
            pattern.support as f64 / self.dataset_size as f64
        }
    }

    /// Presentation form: patterns decoded back to attribute maps and graph
    /// positions resolved to graph ids.
    pub fn to_report(&self, dataset: &Dataset) -> MiningReport {
        let patterns = self
            .patterns
            .iter()
            .map(|frequent| PatternReport {
                code: frequent.pattern.canonical_code().to_string(),
                size: frequent.pattern.size(),
                support: frequent.support,
                support_fraction: self.support_fraction(frequent),
                graphs: frequent
                    .graphs
                    .iter()
                    .filter_map(|&index| dataset.graph_id(index).cloned())
                    .collect(),
                pattern: GraphWriter::pattern_to_raw(&frequent.pattern, dataset.vocabulary()),
                embedding_counts: None,
            })
            .collect();
        MiningReport {
            partial: self.partial,
            min_support_count: self.min_support_count,
            dataset_size: self.dataset_size,
            patterns,
            stats: self.stats.clone(),
            skipped: self.skipped.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MiningReport {
    pub partial: bool,
    pub min_support_count: usize,
    pub dataset_size: usize,
    pub patterns: Vec<PatternReport>,
    pub stats: MiningStats,
    pub skipped: Vec<SkippedCandidate>,
}

impl MiningReport {
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternReport {
    pub code: String,
    pub size: usize,
    pub support: usize,
    pub support_fraction: f64,
    pub graphs: Vec<String>,
    pub pattern: RawGraph,
    /// Capped embedding count per supporting graph, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_counts: Option<Vec<usize>>,
}

/// Drives one mining run: seed single-edge patterns, then alternate
/// extension, counting and pruning until no candidate survives.
pub struct MiningWorkflow<'d> {
    config: MinerConfig,
    dataset: &'d Dataset,
    cancel: CancellationToken,
}

impl<'d> MiningWorkflow<'d> {
    pub fn new(config: MinerConfig, dataset: &'d Dataset) -> Self {
        Self {
            config,
            dataset,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    pub fn execute(&self, params: &MiningParameters) -> MiningOutcome<MiningResult> {
        params.validate()?;
        if self.dataset.is_empty() {
            return Err(MiningError::data("dataset contains no graphs"));
        }

        let run_start = Instant::now();
        let dataset = self.dataset;
        let threshold = params.min_support.to_count(dataset.len());
        info!(
            "Mining {} graph(s): min support {} ({} graph(s)), max size {}",
            dataset.len(),
            params.min_support,
            threshold,
            params
                .max_pattern_size
                .map_or_else(|| "unbounded".to_string(), |size| size.to_string())
        );

        let engine = EmbeddingEngine::new(self.config.max_search_steps).with_cancellation(&self.cancel);
        let labeler =
            CanonicalLabeler::new(self.config.max_canonical_leaves).with_cancellation(&self.cancel);
        let counter = SupportCounter::new(engine);
        let settings = ExtensionSettings {
            engine,
            labeler,
            embeddings_per_graph: self.config.max_embeddings_per_graph,
            max_candidates: self.config.max_candidates_per_round,
            parallel: self.config.parallel,
        };

        let mut run = RunState::new(threshold, dataset.len());
        let mut state = MiningState::Seeding;
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut round = RoundStats::default();
        let mut round_start = Instant::now();
        let mut counted = RoundAccumulator::default();

        loop {
            if state != MiningState::Done && self.cancel.is_cancelled() {
                return Err(self.cancelled(run, run_start));
            }
            debug!("State {:?}", state);
            match state {
                MiningState::Seeding => {
                    round_start = Instant::now();
                    candidates = CandidateGenerator::seeds(dataset);
                    round = RoundStats {
                        size: 1,
                        generated: candidates.len(),
                        candidates: candidates.len(),
                        ..RoundStats::default()
                    };
                    state = MiningState::Counting;
                }
                MiningState::Extending => {
                    round_start = Instant::now();
                    let size = run.frontier.first().map_or(0, |f| f.pattern.size()) + 1;
                    // Enumeration absorbs the step ceiling as truncation, so
                    // the only interrupt left here is cancellation.
                    let Ok(generated) = CandidateGenerator::extend(&run.frontier, dataset, &settings) else {
                        return Err(self.cancelled(run, run_start));
                    };
                    round = RoundStats {
                        size,
                        generated: generated.generated,
                        duplicates: generated.duplicates,
                        candidates: generated.candidates.len(),
                        skipped: generated.skipped.len(),
                        truncated_enumerations: generated.truncated_graphs,
                        ..RoundStats::default()
                    };
                    run.skipped.extend(generated.skipped);
                    candidates = generated.candidates;
                    state = MiningState::Counting;
                }
                MiningState::Counting => {
                    let pending = std::mem::take(&mut candidates);
                    counted = if self.config.parallel {
                        pending
                            .into_par_iter()
                            .map(|candidate| evaluate_candidate(&counter, candidate, dataset, threshold))
                            .fold(RoundAccumulator::default, |mut acc, eval| {
                                acc.consume(eval);
                                acc
                            })
                            .reduce(RoundAccumulator::default, RoundAccumulator::combine)
                    } else {
                        pending
                            .into_iter()
                            .map(|candidate| evaluate_candidate(&counter, candidate, dataset, threshold))
                            .fold(RoundAccumulator::default(), |mut acc, eval| {
                                acc.consume(eval);
                                acc
                            })
                    };
                    if counted.cancelled {
                        return Err(self.cancelled(run, run_start));
                    }
                    state = MiningState::Pruning;
                }
                MiningState::Pruning => {
                    let mut accumulated = std::mem::take(&mut counted);
                    accumulated
                        .frequent
                        .sort_by(|a, b| a.pattern.canonical_code().cmp(b.pattern.canonical_code()));

                    round.support_evaluations = accumulated.evaluations;
                    round.embedding_searches = accumulated.searches;
                    round.frequent = accumulated.frequent.len();
                    round.pruned = accumulated.pruned;
                    round.skipped += accumulated.skipped.len();
                    round.duration_ms = round_start.elapsed().as_millis() as u64;
                    info!(
                        "Size {}: {} candidate(s), {} frequent, {} pruned, {} skipped",
                        round.size, round.candidates, round.frequent, round.pruned, round.skipped
                    );

                    let size = round.size;
                    run.skipped.extend(accumulated.skipped);
                    run.stats.record(std::mem::take(&mut round));
                    run.retained.extend(accumulated.frequent.iter().cloned());
                    run.frontier = accumulated.frequent;

                    state = if run.frontier.is_empty() {
                        MiningState::Done
                    } else if params.max_pattern_size.is_some_and(|max| size >= max) {
                        debug!("Reached maximum pattern size {}", size);
                        MiningState::Done
                    } else {
                        MiningState::Extending
                    };
                }
                MiningState::Done => break,
            }
        }

        let result = run.finish(false, run_start);
        if result.is_empty() {
            info!("No pattern reached the support threshold of {}", threshold);
        } else {
            info!(
                "Found {} frequent pattern(s) in {} round(s), {} ms",
                result.len(),
                result.stats.rounds,
                result.stats.duration_ms
            );
        }
        Ok(result)
    }

    /// Capped embedding count in each supporting graph of `pattern`.
    pub fn embedding_counts(&self, pattern: &FrequentPattern) -> Result<Vec<usize>, SearchInterrupt> {
        let engine = EmbeddingEngine::new(self.config.max_search_steps).with_cancellation(&self.cancel);
        pattern
            .graphs
            .iter()
            .filter_map(|&index| self.dataset.graph(index))
            .map(|target| {
                engine.count_embeddings(pattern.pattern.graph(), target, self.config.embedding_count_cap)
            })
            .collect()
    }

    fn cancelled(&self, run: RunState, run_start: Instant) -> MiningError {
        let partial = run.finish(true, run_start);
        warn!(
            "Mining cancelled; returning {} pattern(s) from {} completed round(s)",
            partial.len(),
            partial.stats.rounds
        );
        MiningError::Cancelled {
            partial: Box::new(partial),
        }
    }
}

/// Mine `dataset` with the default configuration.
pub fn mine(dataset: &Dataset, params: &MiningParameters) -> MiningOutcome<MiningResult> {
    MiningWorkflow::new(MinerConfig::default(), dataset).execute(params)
}

struct RunState {
    threshold: usize,
    dataset_size: usize,
    frontier: Vec<FrequentPattern>,
    retained: Vec<FrequentPattern>,
    skipped: Vec<SkippedCandidate>,
    stats: MiningStats,
}

impl RunState {
    fn new(threshold: usize, dataset_size: usize) -> Self {
        Self {
            threshold,
            dataset_size,
            frontier: Vec::new(),
            retained: Vec::new(),
            skipped: Vec::new(),
            stats: MiningStats::default(),
        }
    }

    fn finish(self, partial: bool, run_start: Instant) -> MiningResult {
        let mut patterns = self.retained;
        patterns.sort_by(|a, b| {
            a.pattern
                .size()
                .cmp(&b.pattern.size())
                .then_with(|| a.pattern.canonical_code().cmp(b.pattern.canonical_code()))
        });
        let mut stats = self.stats;
        stats.duration_ms = run_start.elapsed().as_millis() as u64;
        MiningResult {
            patterns,
            min_support_count: self.threshold,
            dataset_size: self.dataset_size,
            partial,
            stats,
            skipped: self.skipped,
        }
    }
}

enum CandidateEvaluation {
    Frequent { pattern: FrequentPattern, searches: usize },
    Infrequent { searches: usize },
    Skipped(SkippedCandidate),
    Cancelled,
}

fn evaluate_candidate(
    counter: &SupportCounter<'_>,
    candidate: Candidate,
    dataset: &Dataset,
    threshold: usize,
) -> CandidateEvaluation {
    // Support can never exceed the graphs every parent was found in.
    if candidate.graphs.len() < threshold {
        return CandidateEvaluation::Infrequent { searches: 0 };
    }

    match counter.scan(candidate.pattern.graph(), dataset, &candidate.graphs, threshold) {
        Ok(scan) if scan.support() >= threshold => CandidateEvaluation::Frequent {
            searches: scan.searches,
            pattern: FrequentPattern {
                support: scan.support(),
                graphs: scan.graphs,
                pattern: candidate.pattern,
            },
        },
        Ok(scan) => CandidateEvaluation::Infrequent {
            searches: scan.searches,
        },
        Err(SearchInterrupt::Cancelled) => CandidateEvaluation::Cancelled,
        Err(interrupt @ SearchInterrupt::Exhausted { .. }) => {
            let code = candidate.code().to_string();
            let err = MiningError::ResourceExhausted(format!("pattern {code}: {interrupt}"));
            warn!("Skipping candidate: {}", err);
            CandidateEvaluation::Skipped(SkippedCandidate {
                code: Some(code),
                size: candidate.pattern.size(),
                reason: err.to_string(),
            })
        }
    }
}

#[derive(Default)]
struct RoundAccumulator {
    frequent: Vec<FrequentPattern>,
    skipped: Vec<SkippedCandidate>,
    evaluations: usize,
    searches: usize,
    pruned: usize,
    cancelled: bool,
}

impl RoundAccumulator {
    fn consume(&mut self, eval: CandidateEvaluation) {
        self.evaluations += 1;
        match eval {
            CandidateEvaluation::Frequent { pattern, searches } => {
                self.searches += searches;
                self.frequent.push(pattern);
            }
            CandidateEvaluation::Infrequent { searches } => {
                self.searches += searches;
                self.pruned += 1;
            }
            CandidateEvaluation::Skipped(skipped) => self.skipped.push(skipped),
            CandidateEvaluation::Cancelled => self.cancelled = true,
        }
    }

    fn combine(mut self, other: Self) -> Self {
        self.frequent.extend(other.frequent);
        self.skipped.extend(other.skipped);
        self.evaluations += other.evaluations;
        self.searches += other.searches;
        self.pruned += other.pruned;
        self.cancelled |= other.cancelled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphLoader, LabelPolicy};
    use crate::params::MinSupport;

    fn dataset(json: &str) -> Dataset {
        let raws = GraphLoader::parse_dataset_str(json).expect("parse");
        Dataset::from_raw_graphs(&raws, &LabelPolicy::all_attributes()).expect("dataset")
    }

    const TRIANGLES: &str = r#"[
        {"nodes": [{"id": 1, "attributes": {"t": "C"}}, {"id": 2, "attributes": {"t": "C"}},
                   {"id": 3, "attributes": {"t": "O"}}],
         "edges": [{"source": 1, "target": 2}, {"source": 2, "target": 3}, {"source": 3, "target": 1}]},
        {"nodes": [{"id": 1, "attributes": {"t": "C"}}, {"id": 2, "attributes": {"t": "C"}},
                   {"id": 3, "attributes": {"t": "O"}}, {"id": 4, "attributes": {"t": "N"}}],
         "edges": [{"source": 1, "target": 2}, {"source": 2, "target": 3}, {"source": 3, "target": 1},
                   {"source": 3, "target": 4}]}
    ]"#;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config = MinerConfig::from_json_str(r#"{"parallel": false, "max_search_steps": null}"#)
            .expect("config");
        assert!(!config.parallel);
        assert_eq!(config.max_search_steps, None);
        assert_eq!(config.embedding_count_cap, 64);
        assert_eq!(config.max_canonical_leaves, Some(200_000));
    }

    #[test]
    fn shared_triangle_is_mined_with_its_subpatterns() {
        let data = dataset(TRIANGLES);
        let result = mine(&data, &MiningParameters::new(MinSupport::Count(2))).expect("mine");
        // C-C, C-O; C-C-O, C-O-C; triangle.
        let sizes: Vec<usize> = result.patterns.iter().map(|p| p.pattern.size()).collect();
        assert_eq!(sizes, vec![1, 1, 2, 2, 3]);
        assert!(result.patterns.iter().all(|p| p.support == 2));
        assert!(!result.partial);
        assert_eq!(result.stats.rounds, 4);
    }

    #[test]
    fn max_pattern_size_stops_early() {
        let data = dataset(TRIANGLES);
        let params = MiningParameters::new(MinSupport::Count(2)).with_max_pattern_size(2);
        let result = mine(&data, &params).expect("mine");
        assert_eq!(result.len(), 4);
        assert_eq!(result.stats.rounds, 2);
    }

    #[test]
    fn sequential_and_parallel_runs_agree() {
        let data = dataset(TRIANGLES);
        let params = MiningParameters::new(MinSupport::Fraction(0.5));
        let sequential = MiningWorkflow::new(
            MinerConfig {
                parallel: false,
                ..MinerConfig::default()
            },
            &data,
        )
        .execute(&params)
        .expect("sequential");
        let parallel = mine(&data, &params).expect("parallel");
        let codes = |r: &MiningResult| {
            r.patterns
                .iter()
                .map(|p| (p.pattern.canonical_code().clone(), p.support))
                .collect::<Vec<_>>()
        };
        assert_eq!(codes(&sequential), codes(&parallel));
        // Threshold of one graph admits the C-O-N branch of the second graph.
        assert!(sequential.len() > 5);
    }

    #[test]
    fn pre_cancelled_run_returns_empty_partial() {
        let data = dataset(TRIANGLES);
        let token = CancellationToken::new();
        token.cancel();
        let err = MiningWorkflow::new(MinerConfig::default(), &data)
            .with_cancellation(token)
            .execute(&MiningParameters::new(MinSupport::Count(1)))
            .expect_err("cancelled");
        let partial = err.partial_result().expect("partial result");
        assert!(partial.partial);
        assert!(partial.is_empty());
        assert_eq!(partial.stats.rounds, 0);
    }

    #[test]
    fn search_ceiling_skips_candidates_without_aborting() {
        let data = dataset(TRIANGLES);
        let config = MinerConfig {
            max_search_steps: Some(0),
            parallel: false,
            ..MinerConfig::default()
        };
        let result = MiningWorkflow::new(config, &data)
            .execute(&MiningParameters::new(MinSupport::Count(1)))
            .expect("run completes");
        assert!(result.is_empty());
        assert!(!result.skipped.is_empty());
        assert!(result.skipped[0].reason.contains("resource ceiling"));
    }

    #[test]
    fn embedding_limit_counts_truncated_enumerations() {
        let data = dataset(TRIANGLES);
        let config = MinerConfig {
            max_embeddings_per_graph: Some(1),
            parallel: false,
            ..MinerConfig::default()
        };
        let params = MiningParameters::new(MinSupport::Count(2)).with_max_pattern_size(2);
        let result = MiningWorkflow::new(config, &data).execute(&params).expect("mine");
        // Both seeds hold two embeddings in each graph, so every enumeration stops early.
        assert_eq!(result.stats.truncated_enumerations, 4);
        assert_eq!(result.stats.per_round[1].truncated_enumerations, 4);
        assert!(!result.partial);
        assert!(result.patterns.iter().any(|p| p.pattern.size() == 2));
    }

    #[test]
    fn embedding_counts_are_capped_per_supporting_graph() {
        let data = dataset(TRIANGLES);
        let params = MiningParameters::new(MinSupport::Count(2)).with_max_pattern_size(1);

        let workflow = MiningWorkflow::new(MinerConfig::default(), &data);
        let result = workflow.execute(&params).expect("mine");
        assert_eq!(result.len(), 2);
        for frequent in &result.patterns {
            // C-C and C-O each map two ways into either triangle.
            assert_eq!(workflow.embedding_counts(frequent), Ok(vec![2, 2]));
        }

        let capped = MiningWorkflow::new(
            MinerConfig {
                embedding_count_cap: 1,
                ..MinerConfig::default()
            },
            &data,
        );
        for frequent in &result.patterns {
            let counts = capped.embedding_counts(frequent).expect("counts");
            assert_eq!(counts.len(), frequent.graphs.len());
            assert!(counts.iter().all(|count| *count == capped.config().embedding_count_cap));
        }
    }

    #[test]
    fn report_decodes_labels_and_graph_ids() {
        let data = dataset(TRIANGLES);
        let params = MiningParameters::new(MinSupport::Count(2)).with_max_pattern_size(1);
        let result = mine(&data, &params).expect("mine");
        let report = result.to_report(&data);
        assert_eq!(report.patterns.len(), 2);
        let first = &report.patterns[0];
        assert_eq!(first.graphs, vec!["g0".to_string(), "g1".to_string()]);
        assert_eq!(first.support_fraction, 1.0);
        assert_eq!(first.pattern.edges.len(), 1);
        assert!(first.pattern.nodes[0].attributes.contains_key("t"));
        let json = report.to_json_string().expect("json");
        assert!(json.contains("\"min_support_count\": 2"));
    }
}
