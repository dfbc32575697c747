pub mod cancel;
pub mod canonical;
pub mod datasets;
pub mod error;
pub mod graph;
pub mod params;
pub mod pattern;
pub mod pipeline;
pub mod sampling;
pub mod wl;

pub use cancel::CancellationToken;
pub use canonical::{canonical_code, CanonicalCode, CanonicalLabeler};
pub use datasets::{Dataset, DatasetLoader};
pub use error::{MiningError, MiningOutcome};
pub use graph::{GraphId, GraphLoader, GraphWriter, LabelPolicy, LabeledGraph, RawGraph};
pub use params::{MinSupport, MiningParameters};
pub use pattern::Pattern;
pub use pipeline::{
    mine, FrequentPattern, MinerConfig, MiningReport, MiningResult, MiningStats, MiningWorkflow,
    RoundStats, SkippedCandidate,
};
pub use sampling::{DatasetGenerator, GeneratorConfig};
