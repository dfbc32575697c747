pub mod candidate;
pub mod embedding;
pub mod support;
pub mod workflow;

pub use candidate::{Candidate, CandidateGenerator, Extension};
pub use embedding::{count_embeddings, embeds, Embedding, EmbeddingEngine, SearchInterrupt};
pub use support::{support, SupportCounter};
pub use workflow::{
    mine, FrequentPattern, MinerConfig, MiningReport, MiningResult, MiningState, MiningStats,
    MiningWorkflow, RoundStats, SkippedCandidate,
};
