use super::restart::RestartPlan;
use super::SchedulerOutput;
use crate::error::{config_error, state_error, Result};
use std::f64::consts::PI;

/// Cosine annealing with warm restarts.
///
/// Each restart interval anneals from its starting rate towards `eta_min`
/// over its own period. Rates are derived from the previous step's rate
/// rather than evaluated in closed form, so the curve stays continuous when
/// the rate is restarted with a weight.
#[derive(Debug, Clone)]
pub struct CosineRestart {
    t_period: Vec<usize>,
    eta_min: f64,
    plan: RestartPlan,
    /// Step at which the current interval started
    last_restart: usize,
    /// Period of the current interval
    t_max: usize,
}

impl CosineRestart {
    pub fn new(t_period: Vec<usize>, eta_min: f64, plan: RestartPlan) -> Result<Self> {
        if t_period.is_empty() {
            return Err(config_error("T_period must not be empty"));
        }
        if t_period.iter().any(|&period| period == 0) {
            return Err(config_error("cosine periods must be positive"));
        }
        if !eta_min.is_finite() || eta_min < 0.0 {
            return Err(config_error(format!("eta_min must be non-negative, got {eta_min}")));
        }
        // Restart i switches to T_period[i + 1]
        if let Some(index) = plan.active_indices().find(|&index| index + 1 >= t_period.len()) {
            return Err(config_error(format!(
                "restart {} has no matching period in T_period (length {})",
                index,
                t_period.len()
            )));
        }

        let t_max = t_period[0];
        Ok(CosineRestart {
            t_period,
            eta_min,
            plan,
            last_restart: 0,
            t_max,
        })
    }

    /// Plain cosine annealing over a single period, without restarts
    pub fn single(t_max: usize, eta_min: f64) -> Result<Self> {
        Self::new(vec![t_max], eta_min, RestartPlan::empty())
    }

    pub fn rates(
        &mut self,
        step: usize,
        base_rates: &[f64],
        last_rates: &[f64],
    ) -> SchedulerOutput {
        if step == 0 {
            return SchedulerOutput::Rates(base_rates.to_vec());
        }

        if let Some((index, weight)) = self.plan.at(step) {
            self.last_restart = step;
            self.t_max = self.t_period[index + 1];
            return SchedulerOutput::Restart {
                rates: base_rates.iter().map(|base| base * weight).collect(),
                clear_state: false,
            };
        }

        let t = (step - self.last_restart) as i64;
        let t_max = self.t_max as i64;
        let period = self.t_max as f64;

        let rates = if (t - 1 - t_max).rem_euclid(2 * t_max) == 0 {
            // The ratio below divides by zero here, step up from the trough instead
            let rise = (1.0 - (PI / period).cos()) / 2.0;
            last_rates
                .iter()
                .zip(base_rates)
                .map(|(lr, base)| lr + (base - self.eta_min) * rise)
                .collect()
        } else {
            let t = t as f64;
            let ratio = (1.0 + (PI * t / period).cos()) / (1.0 + (PI * (t - 1.0) / period).cos());
            last_rates
                .iter()
                .map(|lr| ratio * (lr - self.eta_min) + self.eta_min)
                .collect()
        };

        SchedulerOutput::Rates(rates)
    }

    pub fn transient(&self) -> (usize, usize) {
        (self.last_restart, self.t_max)
    }

    pub fn restore(&mut self, last_restart: usize, t_max: usize, next_step: usize) -> Result<()> {
        if t_max == 0 {
            return Err(state_error("cosine period must be positive"));
        }
        if last_restart > next_step {
            return Err(state_error(format!(
                "interval starts at step {last_restart}, after the next step {next_step}"
            )));
        }
        self.last_restart = last_restart;
        self.t_max = t_max;
        Ok(())
    }
}
