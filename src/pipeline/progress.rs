//! Phase-weighted progress and cooperative cancellation for a scan.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stages a scan moves through, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Extracting,
    Parsing,
    Checking,
    NlpAnalysis,
    StructuralAnalysis,
    Aggregating,
    Finalizing,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Extracting,
        Phase::Parsing,
        Phase::Checking,
        Phase::NlpAnalysis,
        Phase::StructuralAnalysis,
        Phase::Aggregating,
        Phase::Finalizing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extracting => "extracting",
            Self::Parsing => "parsing",
            Self::Checking => "checking",
            Self::NlpAnalysis => "nlp_analysis",
            Self::StructuralAnalysis => "structural_analysis",
            Self::Aggregating => "aggregating",
            Self::Finalizing => "finalizing",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Share of overall progress each phase accounts for. Must sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseWeights {
    pub extracting: u8,
    pub parsing: u8,
    pub checking: u8,
    pub nlp_analysis: u8,
    pub structural_analysis: u8,
    pub aggregating: u8,
    pub finalizing: u8,
}

impl Default for PhaseWeights {
    fn default() -> Self {
        Self {
            extracting: 15,
            parsing: 10,
            checking: 35,
            nlp_analysis: 10,
            structural_analysis: 15,
            aggregating: 5,
            finalizing: 10,
        }
    }
}

impl PhaseWeights {
    pub fn validate(&self) -> Result<(), String> {
        let total: u32 = Phase::ALL.iter().map(|p| u32::from(self.weight(*p))).sum();
        if total != 100 {
            return Err(format!("phase weights must sum to 100, got {total}"));
        }
        Ok(())
    }

    pub fn weight(&self, phase: Phase) -> u8 {
        match phase {
            Phase::Extracting => self.extracting,
            Phase::Parsing => self.parsing,
            Phase::Checking => self.checking,
            Phase::NlpAnalysis => self.nlp_analysis,
            Phase::StructuralAnalysis => self.structural_analysis,
            Phase::Aggregating => self.aggregating,
            Phase::Finalizing => self.finalizing,
        }
    }

    /// Overall percent at which `phase` begins.
    pub fn start_percent(&self, phase: Phase) -> f32 {
        Phase::ALL
            .iter()
            .take_while(|p| **p != phase)
            .map(|p| f32::from(self.weight(*p)))
            .sum()
    }

    /// Overall percent once `fraction` (0..=1) of `phase` is done.
    pub fn percent(&self, phase: Phase, fraction: f32) -> f32 {
        let fraction = fraction.clamp(0.0, 1.0);
        let value = self.start_percent(phase) + f32::from(self.weight(phase)) * fraction;
        value.min(100.0)
    }
}

/// One progress event emitted by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub phase: Phase,
    pub percent: f32,
    pub message: String,
    /// Set when the update marks a checker as finished.
    pub completed_checker: Option<String>,
}

/// Receiver of progress events. The worker forwards them to the controller.
pub trait ProgressSink {
    fn report(&mut self, update: ProgressUpdate);
}

impl ProgressSink for Vec<ProgressUpdate> {
    fn report(&mut self, update: ProgressUpdate) {
        self.push(update);
    }
}

/// Discards every update.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&mut self, _update: ProgressUpdate) {}
}

/// Shared flag checked by the executor at phase and group boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_100() {
        assert!(PhaseWeights::default().validate().is_ok());
    }

    #[test]
    fn unbalanced_weights_rejected() {
        let weights = PhaseWeights {
            checking: 50,
            ..PhaseWeights::default()
        };
        let err = weights.validate().unwrap_err();
        assert!(err.contains("115"));
    }

    #[test]
    fn phase_start_percent_accumulates() {
        let w = PhaseWeights::default();
        assert_eq!(w.start_percent(Phase::Extracting), 0.0);
        assert_eq!(w.start_percent(Phase::Checking), 25.0);
        assert_eq!(w.start_percent(Phase::Finalizing), 90.0);
        assert_eq!(w.percent(Phase::Finalizing, 1.0), 100.0);
    }

    #[test]
    fn percent_is_monotonic_across_phases() {
        let w = PhaseWeights::default();
        let mut last = 0.0f32;
        for phase in Phase::ALL {
            for step in 0..=4 {
                let p = w.percent(phase, step as f32 / 4.0);
                assert!(p >= last, "{phase} step {step}: {p} < {last}");
                last = p;
            }
        }
    }

    #[test]
    fn fraction_is_clamped() {
        let w = PhaseWeights::default();
        assert_eq!(w.percent(Phase::Checking, 7.0), 60.0);
        assert_eq!(w.percent(Phase::Checking, -1.0), 25.0);
    }

    #[test]
    fn token_clones_share_state() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
