//! Ensemble decision type

use crate::timestamp::unix_millis;
use std::fmt;
use uuid::Uuid;

/// Aggregated classification result for one window
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleDecision {
    /// Window this decision was computed from
    pub window_id: Uuid,
    /// Winning class (argmax of the mean score vector, ties to lowest index)
    pub class_index: usize,
    /// Elementwise mean of all member score vectors
    pub scores: Vec<f32>,
    /// Creation timestamp (ms since epoch)
    pub created_at: u64,
}

impl EnsembleDecision {
    /// Create a decision for a window
    pub fn new(window_id: Uuid, class_index: usize, scores: Vec<f32>) -> Self {
        EnsembleDecision {
            window_id,
            class_index,
            scores,
            created_at: unix_millis(),
        }
    }

    /// Aggregate score of the winning class
    pub fn winning_score(&self) -> f32 {
        self.scores.get(self.class_index).copied().unwrap_or(0.0)
    }

    /// Number of classes the ensemble scored
    pub fn class_count(&self) -> usize {
        self.scores.len()
    }
}

impl fmt::Display for EnsembleDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "class {} ({:.3}) over {} classes",
            self.class_index,
            self.winning_score(),
            self.scores.len()
        )
    }
}
