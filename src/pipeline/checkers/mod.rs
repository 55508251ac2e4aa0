pub mod types;
pub mod context;
pub mod lexicon;
pub mod registry;
pub mod pipeline;
pub mod builtin;

pub use context::{CheckContext, Checker, ConfidenceFn, ConfidenceProvider};
pub use pipeline::CheckerPipeline;
pub use registry::{CheckerRegistry, RegistryError};
pub use types::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::progress::PhaseWeights;

#[derive(Error, Debug)]
pub enum CheckerError {
    #[error("Checker failed: {0}")]
    Failed(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Pipeline tuning shared by every checker run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub phase_weights: PhaseWeights,
    /// Findings whose adjusted confidence falls below this are suppressed.
    pub suppress_below: f32,
    /// Word budget per sentence for `sentence_length`.
    pub long_sentence_words: usize,
    pub max_findings_per_checker: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            phase_weights: PhaseWeights::default(),
            suppress_below: 0.15,
            long_sentence_words: 30,
            max_findings_per_checker: 500,
        }
    }
}
