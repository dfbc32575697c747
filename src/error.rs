use thiserror::Error;

use crate::pipeline::workflow::MiningResult;

/// Everything the mining engine reports back to its caller.
#[derive(Debug, Error)]
pub enum MiningError {
    /// Malformed dataset: empty, duplicate node id, dangling edge endpoint or
    /// mixed directedness. Raised before any pattern is generated.
    #[error("dataset validation failed: {0}")]
    DataValidation(String),

    #[error("invalid mining parameters: {0}")]
    Parameter(String),

    /// Cooperative cancellation was observed. Carries every pattern confirmed
    /// through the last completed round, flagged as partial.
    #[error("mining cancelled after {} completed round(s)", .partial.stats.rounds)]
    Cancelled { partial: Box<MiningResult> },

    /// A single candidate exceeded a configured cost ceiling. The driver turns
    /// this into a skipped-candidate record; it never aborts a run.
    #[error("resource ceiling exceeded: {0}")]
    ResourceExhausted(String),
}

impl MiningError {
    pub fn data(reason: impl Into<String>) -> Self {
        Self::DataValidation(reason.into())
    }

    pub fn parameter(reason: impl Into<String>) -> Self {
        Self::Parameter(reason.into())
    }

    /// Partial result for a cancelled run.
    pub fn partial_result(&self) -> Option<&MiningResult> {
        match self {
            Self::Cancelled { partial } => Some(partial.as_ref()),
            _ => None,
        }
    }
}

pub type MiningOutcome<T> = std::result::Result<T, MiningError>;
