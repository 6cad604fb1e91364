//! Muscle activation patterns driving the simulated source

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Activation level over time for the simulated subject
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ActivationPattern {
    /// Constant activation level
    Constant { level: f32 },
    /// Linear ramp from one level to another over a duration
    Ramp {
        start_level: f32,
        end_level: f32,
        duration: f32,
    },
    /// Repeating rest/contraction cycles, the shape onset detection cares
    /// about: quiet resting phase, then a sustained contraction
    Contraction {
        rest_duration: f32,
        contraction_duration: f32,
        level: f32,
    },
    /// Sustained activation with physiological tremor
    Realistic {
        base_activation: f32,
        tremor_frequency: f32,
        tremor_amplitude: f32,
    },
}

impl ActivationPattern {
    /// Activation level in [0, 1] at the given time in seconds
    pub fn activation_at(&self, time: f32) -> f32 {
        match self {
            ActivationPattern::Constant { level } => *level,

            ActivationPattern::Ramp { start_level, end_level, duration } => {
                if time >= *duration {
                    *end_level
                } else {
                    start_level + (end_level - start_level) * (time / duration)
                }
            }

            ActivationPattern::Contraction {
                rest_duration,
                contraction_duration,
                level,
            } => {
                let cycle = rest_duration + contraction_duration;
                let phase = time % cycle;
                if phase < *rest_duration {
                    0.0
                } else {
                    *level
                }
            }

            ActivationPattern::Realistic {
                base_activation,
                tremor_frequency,
                tremor_amplitude,
            } => {
                let tremor = tremor_amplitude * (2.0 * PI * tremor_frequency * time).sin();
                (base_activation + tremor).clamp(0.0, 1.0)
            }
        }
    }

    /// Human-readable pattern name
    pub fn description(&self) -> &'static str {
        match self {
            ActivationPattern::Constant { .. } => "Constant activation",
            ActivationPattern::Ramp { .. } => "Gradual ramp",
            ActivationPattern::Contraction { .. } => "Rest/contraction cycles",
            ActivationPattern::Realistic { .. } => "Sustained with tremor",
        }
    }

    /// Resting subject (electrode noise only)
    pub fn rest() -> Self {
        ActivationPattern::Constant { level: 0.0 }
    }

    /// Default demo pattern: 3 s rest, 2 s firm contraction, repeating
    pub fn demo_cycle() -> Self {
        ActivationPattern::Contraction {
            rest_duration: 3.0,
            contraction_duration: 2.0,
            level: 0.8,
        }
    }
}
