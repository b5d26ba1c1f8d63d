use crate::error::{config_error, state_error, Result};
use crate::schedulers::{decay_factor, SchedulerOutput};
use std::collections::BTreeMap;

/// Restart steps with the base-rate weight applied at each of them
#[derive(Debug, Clone)]
pub struct RestartPlan {
    restarts: Vec<usize>,
    weights: Vec<f64>,
}

impl RestartPlan {
    pub fn new(restarts: Vec<usize>, weights: Vec<f64>) -> Result<Self> {
        if restarts.len() != weights.len() {
            return Err(config_error(format!(
                "restarts and their weights do not match ({} restarts, {} weights)",
                restarts.len(),
                weights.len()
            )));
        }
        Ok(RestartPlan { restarts, weights })
    }

    pub fn empty() -> Self {
        RestartPlan {
            restarts: Vec::new(),
            weights: Vec::new(),
        }
    }

    /// Position and weight of the restart configured at `step`, if any
    pub fn at(&self, step: usize) -> Option<(usize, f64)> {
        self.restarts
            .iter()
            .position(|&restart| restart == step)
            .map(|index| (index, self.weights[index]))
    }

    /// Indices of the restarts that can actually fire, step 0 excluded
    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.restarts
            .iter()
            .enumerate()
            .filter(|(_, &restart)| restart > 0)
            .map(|(index, _)| index)
    }
}

fn weighted(base_rates: &[f64], weight: f64) -> Vec<f64> {
    base_rates.iter().map(|base| base * weight).collect()
}

/// Multi-step decay with warm restarts.
///
/// At a restart step every rate resets to `base * weight`, at a milestone the
/// previous rate is multiplied by gamma raised to the milestone's multiplicity,
/// otherwise the rate is carried over. A restart takes precedence over a
/// milestone configured at the same step.
#[derive(Debug, Clone)]
pub struct MultiStepRestart {
    /// Milestone step -> number of times it was listed
    milestones: BTreeMap<usize, u32>,
    gamma: f64,
    plan: RestartPlan,
    clear_state: bool,
}

impl MultiStepRestart {
    pub fn new(milestones: &[usize], gamma: f64, plan: RestartPlan, clear_state: bool) -> Self {
        let mut counts = BTreeMap::new();
        for &milestone in milestones {
            *counts.entry(milestone).or_insert(0) += 1;
        }
        MultiStepRestart {
            milestones: counts,
            gamma,
            plan,
            clear_state,
        }
    }

    pub fn rates(&self, step: usize, base_rates: &[f64], last_rates: &[f64]) -> SchedulerOutput {
        if let Some((_, weight)) = self.plan.at(step) {
            return SchedulerOutput::Restart {
                rates: weighted(base_rates, weight),
                clear_state: self.clear_state,
            };
        }

        match self.milestones.get(&step) {
            Some(&count) => {
                tracing::debug!(step, count, "milestone decay");
                let factor = decay_factor(self.gamma, count as usize);
                SchedulerOutput::Rates(last_rates.iter().map(|lr| lr * factor).collect())
            }
            None => SchedulerOutput::Rates(last_rates.to_vec()),
        }
    }
}

/// Step decay with warm restarts, each restart interval having its own step size.
///
/// Formula: lr = base * weight * gamma^floor((step - offset) / step_size)
#[derive(Debug, Clone)]
pub struct StepRestart {
    step_sizes: Vec<usize>,
    gamma: f64,
    plan: RestartPlan,
    clear_state: bool,
    /// Weight of the restart that opened the current interval
    weight: f64,
    /// Step at which the current interval started
    epoch_offset: usize,
    /// Step size of the current interval
    step_size: usize,
}

impl StepRestart {
    pub fn new(
        step_sizes: Vec<usize>,
        gamma: f64,
        plan: RestartPlan,
        clear_state: bool,
    ) -> Result<Self> {
        if step_sizes.iter().any(|&size| size == 0) {
            return Err(config_error("lr_step_sizes must all be positive"));
        }
        // Restart i switches to step_sizes[i + 1]
        if step_sizes.len() < plan.restarts.len() + 1 {
            return Err(config_error(format!(
                "StepLR_Restart needs {} step sizes for {} restarts, got {}",
                plan.restarts.len() + 1,
                plan.restarts.len(),
                step_sizes.len()
            )));
        }

        let step_size = step_sizes[0];
        Ok(StepRestart {
            step_sizes,
            gamma,
            plan,
            clear_state,
            weight: 1.0,
            epoch_offset: 0,
            step_size,
        })
    }

    pub fn rates(&mut self, step: usize, base_rates: &[f64]) -> SchedulerOutput {
        if let Some((index, weight)) = self.plan.at(step) {
            self.weight = weight;
            self.step_size = self.step_sizes[index + 1];
            self.epoch_offset = step;
            return SchedulerOutput::Restart {
                rates: weighted(base_rates, weight),
                clear_state: self.clear_state,
            };
        }

        let decays = (step - self.epoch_offset) / self.step_size;
        let factor = self.weight * decay_factor(self.gamma, decays);
        SchedulerOutput::Rates(weighted(base_rates, factor))
    }

    pub fn transient(&self) -> (f64, usize, usize) {
        (self.weight, self.epoch_offset, self.step_size)
    }

    pub fn restore(
        &mut self,
        weight: f64,
        epoch_offset: usize,
        step_size: usize,
        next_step: usize,
    ) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(state_error(format!("restart weight must be non-negative, got {weight}")));
        }
        if step_size == 0 {
            return Err(state_error("step size must be positive"));
        }
        if epoch_offset > next_step {
            return Err(state_error(format!(
                "interval starts at step {epoch_offset}, after the next step {next_step}"
            )));
        }
        self.weight = weight;
        self.epoch_offset = epoch_offset;
        self.step_size = step_size;
        Ok(())
    }
}
