//! Ensemble classification over opaque inference backends

use myo_core::{config_error, EnsembleDecision, MyoError, MyoResult, Window};
use tracing::trace;

/// Single-method capability for one inference backend.
///
/// `predict` may suspend for the duration of a hardware-accelerated run.
pub trait Classifier: Send {
    /// Stable name used in logs and error reports
    fn name(&self) -> &str;

    /// Produce one score per class for the given window
    fn predict(&mut self, window: &Window) -> MyoResult<Vec<f32>>;
}

/// Ordered set of classifiers whose score vectors are averaged into one
/// decision per window.
pub struct ClassifierEnsemble {
    members: Vec<Box<dyn Classifier>>,
    class_count: usize,
}

impl ClassifierEnsemble {
    /// Create an ensemble. Fails for zero members or zero classes.
    pub fn new(members: Vec<Box<dyn Classifier>>, class_count: usize) -> MyoResult<Self> {
        if members.is_empty() {
            return Err(MyoError::EmptyEnsemble);
        }
        if class_count == 0 {
            return Err(config_error!("class count must be positive"));
        }

        Ok(ClassifierEnsemble { members, class_count })
    }

    /// Number of ensemble members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Configured score vector length
    pub fn class_count(&self) -> usize {
        self.class_count
    }

    /// Member names in invocation order
    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name()).collect()
    }

    /// Classify one window.
    ///
    /// Every member must return a well-formed score vector; any member
    /// failure fails the whole cycle. The mean is never taken over fewer
    /// members than configured.
    pub fn classify(&mut self, window: &Window) -> MyoResult<EnsembleDecision> {
        let mut aggregate = vec![0.0f32; self.class_count];

        for member in self.members.iter_mut() {
            let name = member.name().to_string();
            let scores = match member.predict(window) {
                Ok(scores) => scores,
                Err(error @ MyoError::ClassifierError { .. }) => return Err(error),
                Err(error) => {
                    return Err(MyoError::ClassifierError {
                        name,
                        reason: error.to_string(),
                    })
                }
            };

            if scores.len() != self.class_count {
                return Err(MyoError::ScoreLengthMismatch {
                    name,
                    expected: self.class_count,
                    actual: scores.len(),
                });
            }

            for (slot, score) in aggregate.iter_mut().zip(&scores) {
                *slot += score;
            }
        }

        let member_count = self.members.len() as f32;
        for slot in aggregate.iter_mut() {
            *slot /= member_count;
        }

        let class_index = argmax(&aggregate);
        trace!(window = %window.id, class_index, "ensemble decision");
        Ok(EnsembleDecision::new(window.id, class_index, aggregate))
    }
}

/// Index of the maximum value; exact ties resolve to the lowest index
/// (first-max scan order).
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (index, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = index;
        }
    }
    best
}
