use crate::config::{LrScheme, SchedulerConfig};
use crate::error::{config_error, state_error, Result, SchedulerError};
use crate::state::PolicyState;

mod cosine;
mod flat_decay;
mod plateau;
mod progressive;
mod restart;
mod step;

pub use cosine::CosineRestart;
pub use flat_decay::{DecayShape, FlatDecay};
pub use plateau::Plateau;
pub use progressive::ProgressiveMultiStep;
pub use restart::{MultiStepRestart, RestartPlan, StepRestart};
pub use step::{MultiStep, StepDecay};

/// Rates produced by one policy evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerOutput {
    /// Regular update
    Rates(Vec<f64>),
    /// Rates reset at a restart boundary, optionally asking the
    /// optimizer to drop its per-parameter state
    Restart { rates: Vec<f64>, clear_state: bool },
}

impl SchedulerOutput {
    pub fn rates(&self) -> &[f64] {
        match self {
            SchedulerOutput::Rates(rates) => rates,
            SchedulerOutput::Restart { rates, .. } => rates,
        }
    }

    pub fn into_rates(self) -> Vec<f64> {
        match self {
            SchedulerOutput::Rates(rates) => rates,
            SchedulerOutput::Restart { rates, .. } => rates,
        }
    }
}

/// `gamma^count`, saturating the exponent instead of wrapping it
pub(crate) fn decay_factor(gamma: f64, count: usize) -> f64 {
    gamma.powi(i32::try_from(count).unwrap_or(i32::MAX))
}

/// Available scheduling policies
#[derive(Debug, Clone)]
pub enum Policy {
    /// Rates pinned to their base values
    Constant,
    Step(StepDecay),
    MultiStep(MultiStep),
    MultiStepRestart(MultiStepRestart),
    StepRestart(StepRestart),
    Progressive(ProgressiveMultiStep),
    Cosine(CosineRestart),
    FlatDecay(FlatDecay),
    Plateau(Plateau),
}

impl Policy {
    /// Builds the policy selected by `config` for an optimizer with
    /// `group_count` parameter groups, checking every field it needs
    pub fn from_config(config: &SchedulerConfig, group_count: usize) -> Result<Self> {
        let gamma = config.lr_gamma;
        if !gamma.is_finite() || gamma < 0.0 {
            return Err(config_error(format!("lr_gamma must be non-negative, got {gamma}")));
        }

        let policy = match config.effective_scheme() {
            LrScheme::Constant => Policy::Constant,
            LrScheme::Step => {
                let step_size = *config.require(&config.lr_step_size, "lr_step_size")?;
                Policy::Step(StepDecay::new(step_size, gamma)?)
            }
            LrScheme::MultiStep => {
                let milestones = config.require(&config.lr_steps, "lr_steps")?;
                Policy::MultiStep(MultiStep::new(milestones.clone(), gamma))
            }
            LrScheme::MultiStepRestart => {
                let milestones = config.require(&config.lr_steps, "lr_steps")?;
                let (restarts, weights) = config.restart_plan()?;
                Policy::MultiStepRestart(MultiStepRestart::new(
                    milestones,
                    gamma,
                    RestartPlan::new(restarts, weights)?,
                    config.clear_state,
                ))
            }
            LrScheme::StepRestart => {
                let step_sizes = config.require(&config.lr_step_sizes, "lr_step_sizes")?;
                let (restarts, weights) = config.restart_plan()?;
                Policy::StepRestart(StepRestart::new(
                    step_sizes.clone(),
                    gamma,
                    RestartPlan::new(restarts, weights)?,
                    config.clear_state,
                )?)
            }
            LrScheme::ProgressiveMultiStep => {
                let milestones = config.require(&config.gen_lr_steps, "gen_lr_steps")?;
                let starts = config.require(&config.progressive_starts, "progressive_starts")?;
                Policy::Progressive(ProgressiveMultiStep::new(
                    milestones,
                    starts.clone(),
                    gamma,
                    group_count,
                )?)
            }
            LrScheme::CosineAnnealing => {
                let t_max = *config.require(&config.t_max, "T_max")?;
                Policy::Cosine(CosineRestart::single(t_max, config.eta_min)?)
            }
            LrScheme::CosineAnnealingRestart => {
                let t_period = config.require(&config.t_period, "T_period")?;
                let (restarts, weights) = config.restart_plan()?;
                Policy::Cosine(CosineRestart::new(
                    t_period.clone(),
                    config.eta_min,
                    RestartPlan::new(restarts, weights)?,
                )?)
            }
            LrScheme::Linear => {
                let (fixed, decay) = config.flat_decay_durations()?;
                Policy::FlatDecay(FlatDecay::new(fixed, decay, DecayShape::Linear)?)
            }
            LrScheme::FlatCosineDecay => {
                let (fixed, decay) = config.flat_decay_durations()?;
                Policy::FlatDecay(FlatDecay::new(fixed, decay, DecayShape::Cosine)?)
            }
            LrScheme::ReduceOnPlateau => Policy::Plateau(Plateau::from_config(config)?),
        };

        Ok(policy)
    }

    /// Whether the policy is driven by a monitored metric instead of the step counter
    pub fn is_reactive(&self) -> bool {
        matches!(self, Policy::Plateau(_))
    }

    /// Computes the rates for `step` from the base rates and the previous rates
    pub fn step_rates(
        &mut self,
        step: usize,
        base_rates: &[f64],
        last_rates: &[f64],
    ) -> Result<SchedulerOutput> {
        let output = match self {
            Policy::Constant => SchedulerOutput::Rates(base_rates.to_vec()),
            Policy::Step(policy) => SchedulerOutput::Rates(policy.rates(step, base_rates)),
            Policy::MultiStep(policy) => SchedulerOutput::Rates(policy.rates(step, base_rates)),
            Policy::MultiStepRestart(policy) => policy.rates(step, base_rates, last_rates),
            Policy::StepRestart(policy) => policy.rates(step, base_rates),
            Policy::Progressive(policy) => SchedulerOutput::Rates(policy.rates(step, last_rates)),
            Policy::Cosine(policy) => policy.rates(step, base_rates, last_rates),
            Policy::FlatDecay(policy) => SchedulerOutput::Rates(policy.rates(step, base_rates)),
            Policy::Plateau(_) => return Err(SchedulerError::MetricRequired),
        };
        Ok(output)
    }

    /// Feeds one metric evaluation to a reactive policy
    pub fn metric_rates(&mut self, metric: f64, last_rates: &[f64]) -> Result<(Vec<f64>, bool)> {
        match self {
            Policy::Plateau(policy) => Ok(policy.rates(metric, last_rates)),
            _ => Err(SchedulerError::MetricNotAccepted),
        }
    }

    /// Transient fields that must survive a checkpoint
    pub fn state(&self) -> PolicyState {
        match self {
            Policy::StepRestart(policy) => {
                let (weight, epoch_offset, step_size) = policy.transient();
                PolicyState::StepRestart {
                    weight,
                    epoch_offset,
                    step_size,
                }
            }
            Policy::Cosine(policy) => {
                let (last_restart, t_max) = policy.transient();
                PolicyState::Cosine {
                    last_restart,
                    t_max,
                }
            }
            Policy::Plateau(policy) => {
                let (best, num_bad_epochs, cooldown_counter) = policy.transient();
                PolicyState::Plateau {
                    best,
                    num_bad_epochs,
                    cooldown_counter,
                }
            }
            _ => PolicyState::Stateless,
        }
    }

    /// Restores transient fields for a scheduler whose next step is
    /// `next_step`, leaving the policy untouched on error
    pub fn load_state(&mut self, state: &PolicyState, next_step: usize) -> Result<()> {
        match (self, state) {
            (
                Policy::StepRestart(policy),
                PolicyState::StepRestart {
                    weight,
                    epoch_offset,
                    step_size,
                },
            ) => policy.restore(*weight, *epoch_offset, *step_size, next_step),
            (
                Policy::Cosine(policy),
                PolicyState::Cosine {
                    last_restart,
                    t_max,
                },
            ) => policy.restore(*last_restart, *t_max, next_step),
            (
                Policy::Plateau(policy),
                PolicyState::Plateau {
                    best,
                    num_bad_epochs,
                    cooldown_counter,
                },
            ) => policy.restore(*best, *num_bad_epochs, *cooldown_counter),
            (policy, PolicyState::Stateless)
                if matches!(policy.state(), PolicyState::Stateless) =>
            {
                Ok(())
            }
            (_, state) => Err(state_error(format!(
                "saved policy state {state:?} does not fit this scheduler"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_fields() {
        for scheme in [
            LrScheme::Step,
            LrScheme::MultiStep,
            LrScheme::MultiStepRestart,
            LrScheme::StepRestart,
            LrScheme::ProgressiveMultiStep,
            LrScheme::CosineAnnealing,
            LrScheme::CosineAnnealingRestart,
            LrScheme::Linear,
            LrScheme::FlatCosineDecay,
        ] {
            let config = SchedulerConfig::new(scheme);
            let err = Policy::from_config(&config, 1).unwrap_err();
            assert!(
                matches!(err, SchedulerError::Configuration(_)),
                "{scheme} built without its required fields"
            );
        }
    }

    #[test]
    fn test_force_lr_builds_constant_policy() {
        let mut config = SchedulerConfig::new(LrScheme::MultiStepRestart);
        config.lr_steps = Some(vec![1, 2]);
        config.force_lr = true;

        let mut policy = Policy::from_config(&config, 1).unwrap();
        assert!(matches!(policy, Policy::Constant));

        let output = policy.step_rates(2, &[1e-3], &[5e-4]).unwrap();
        assert_eq!(output.rates(), &[1e-3]);
    }

    #[test]
    fn test_metric_contract_is_enforced() {
        let mut plateau =
            Policy::from_config(&SchedulerConfig::new(LrScheme::ReduceOnPlateau), 1).unwrap();
        assert!(plateau.is_reactive());
        assert!(matches!(
            plateau.step_rates(0, &[1.0], &[1.0]),
            Err(SchedulerError::MetricRequired)
        ));

        let mut constant =
            Policy::from_config(&SchedulerConfig::new(LrScheme::Constant), 1).unwrap();
        assert!(matches!(
            constant.metric_rates(0.5, &[1.0]),
            Err(SchedulerError::MetricNotAccepted)
        ));
    }

    #[test]
    fn test_restart_weight_count_mismatch() {
        for scheme in [
            LrScheme::MultiStepRestart,
            LrScheme::StepRestart,
            LrScheme::CosineAnnealingRestart,
        ] {
            let mut config = SchedulerConfig::new(scheme);
            config.lr_steps = Some(vec![50]);
            config.lr_step_sizes = Some(vec![10, 10, 10]);
            config.t_period = Some(vec![100, 100, 100]);
            config.restarts = Some(vec![100, 200]);
            config.restart_weights = Some(vec![1.0]);

            assert!(matches!(
                Policy::from_config(&config, 1),
                Err(SchedulerError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_negative_gamma_rejected() {
        let mut config = SchedulerConfig::new(LrScheme::MultiStep);
        config.lr_steps = Some(vec![10]);
        config.lr_gamma = -0.5;
        assert!(Policy::from_config(&config, 1).is_err());
    }

    #[test]
    fn test_load_state_kind_mismatch() {
        let mut config = SchedulerConfig::new(LrScheme::CosineAnnealing);
        config.t_max = Some(10);
        let mut policy = Policy::from_config(&config, 1).unwrap();

        let err = policy.load_state(&PolicyState::Stateless, 0).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidState(_)));
        assert_eq!(
            policy.state(),
            PolicyState::Cosine {
                last_restart: 0,
                t_max: 10
            }
        );
    }

    #[test]
    fn test_decay_factor_saturates_large_counts() {
        assert_eq!(decay_factor(0.5, 3), 0.125);
        assert_eq!(decay_factor(0.5, usize::MAX), 0.0);
        assert_eq!(decay_factor(1.0, i32::MAX as usize + 1), 1.0);
    }
}
