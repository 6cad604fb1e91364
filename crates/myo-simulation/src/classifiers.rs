//! Simulated classifier capabilities
//!
//! Stand-ins for hardware-accelerated gesture models: a DPU-style member
//! operating on the quantized window form, a scripted member returning
//! preset score vectors, and a failure-injection member.

use myo_core::{MyoError, MyoResult, Window};
use myo_pipeline::Classifier;
use rand::{Rng, SeedableRng};

/// Simulated DPU ensemble member.
///
/// Consumes the int8 window representation like the real accelerator,
/// derives per-channel energies and projects them onto class logits
/// through a seed-derived weight matrix, so differently seeded members
/// give distinct but correlated votes.
pub struct SimulatedDpuClassifier {
    name: String,
    class_count: usize,
    quant_scale: f32,
    weights: Vec<f32>,
    noise: f32,
    rng: rand::rngs::StdRng,
}

impl SimulatedDpuClassifier {
    /// Create a member for `class_count` classes over `channels` inputs
    pub fn new(name: &str, class_count: usize, channels: usize, seed: u64) -> Self {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let weights = (0..class_count * channels)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        SimulatedDpuClassifier {
            name: name.to_string(),
            class_count,
            quant_scale: 25.0,
            weights,
            noise: 0.05,
            rng,
        }
    }

    fn channel_energies(&self, quantized: &[i8], channels: usize) -> Vec<f32> {
        let mut energies = vec![0.0f32; channels];
        for (index, value) in quantized.iter().enumerate() {
            energies[index % channels] += (*value as f32).abs();
        }

        let samples = (quantized.len() / channels).max(1) as f32;
        for energy in energies.iter_mut() {
            *energy /= samples * 127.0;
        }
        energies
    }
}

impl Classifier for SimulatedDpuClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&mut self, window: &Window) -> MyoResult<Vec<f32>> {
        let channels = window.channel_count();
        let quantized = window.quantized(self.quant_scale);
        let energies = self.channel_energies(&quantized, channels);

        let mut scores = Vec::with_capacity(self.class_count);
        for class in 0..self.class_count {
            let mut logit = 0.0;
            for (channel, energy) in energies.iter().enumerate() {
                logit += self.weights[class * channels + channel] * energy;
            }
            logit += self.rng.gen_range(-self.noise..self.noise);
            scores.push(logit);
        }

        Ok(scores)
    }
}

/// Member that replays preset score vectors, cycling when exhausted
pub struct ScriptedClassifier {
    name: String,
    outputs: Vec<Vec<f32>>,
    cursor: usize,
}

impl ScriptedClassifier {
    pub fn new(name: &str, outputs: Vec<Vec<f32>>) -> Self {
        assert!(!outputs.is_empty(), "scripted classifier needs outputs");
        ScriptedClassifier {
            name: name.to_string(),
            outputs,
            cursor: 0,
        }
    }
}

impl Classifier for ScriptedClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&mut self, _window: &Window) -> MyoResult<Vec<f32>> {
        let scores = self.outputs[self.cursor % self.outputs.len()].clone();
        self.cursor += 1;
        Ok(scores)
    }
}

/// Member that succeeds `healthy_calls` times, then fails every call
pub struct FaultyClassifier {
    name: String,
    class_count: usize,
    healthy_calls: usize,
    calls: usize,
}

impl FaultyClassifier {
    pub fn new(name: &str, class_count: usize, healthy_calls: usize) -> Self {
        FaultyClassifier {
            name: name.to_string(),
            class_count,
            healthy_calls,
            calls: 0,
        }
    }
}

impl Classifier for FaultyClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&mut self, _window: &Window) -> MyoResult<Vec<f32>> {
        self.calls += 1;
        if self.calls > self.healthy_calls {
            return Err(MyoError::ClassifierError {
                name: self.name.clone(),
                reason: "simulated accelerator fault".to_string(),
            });
        }
        Ok(vec![0.0; self.class_count])
    }
}
