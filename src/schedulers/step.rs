use super::decay_factor;
use crate::error::{config_error, Result};

/// Multiplies the rate by gamma every `step_size` steps.
///
/// Formula: lr = base * gamma^floor(step / step_size)
#[derive(Debug, Clone)]
pub struct StepDecay {
    step_size: usize,
    gamma: f64,
}

impl StepDecay {
    pub fn new(step_size: usize, gamma: f64) -> Result<Self> {
        if step_size == 0 {
            return Err(config_error("lr_step_size must be positive"));
        }
        Ok(StepDecay { step_size, gamma })
    }

    pub fn rates(&self, step: usize, base_rates: &[f64]) -> Vec<f64> {
        let factor = decay_factor(self.gamma, step / self.step_size);
        base_rates.iter().map(|base| base * factor).collect()
    }
}

/// Multiplies the rate by gamma at each milestone.
/// Repeated milestones compound, so `[3, 3]` decays by gamma^2 at step 3.
#[derive(Debug, Clone)]
pub struct MultiStep {
    /// Sorted, duplicates kept
    milestones: Vec<usize>,
    gamma: f64,
}

impl MultiStep {
    pub fn new(mut milestones: Vec<usize>, gamma: f64) -> Self {
        milestones.sort_unstable();
        MultiStep { milestones, gamma }
    }

    pub fn rates(&self, step: usize, base_rates: &[f64]) -> Vec<f64> {
        // Number of milestones at or before this step
        let passed = self.milestones.partition_point(|&milestone| milestone <= step);
        let factor = decay_factor(self.gamma, passed);
        base_rates.iter().map(|base| base * factor).collect()
    }
}
