use crate::config::{PlateauMode, SchedulerConfig, ThresholdMode};
use crate::error::{config_error, state_error, Result};

/// Reduces rates when a monitored metric stops improving.
///
/// Not driven by the step counter: every evaluation feeds the latest metric,
/// and after more than `patience` evaluations without an improvement beyond
/// `threshold` each rate is multiplied by `factor`.
#[derive(Debug, Clone)]
pub struct Plateau {
    mode: PlateauMode,
    threshold_mode: ThresholdMode,
    factor: f64,
    threshold: f64,
    patience: usize,
    cooldown: usize,
    min_lr: f64,
    eps: f64,
    /// Best metric seen so far, `None` before the first evaluation
    best: Option<f64>,
    /// Consecutive evaluations without improvement
    num_bad_epochs: usize,
    /// Evaluations left before bad evaluations count again
    cooldown_counter: usize,
}

impl Plateau {
    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        let factor = config.plateau_factor;
        if !(0.0..1.0).contains(&factor) {
            return Err(config_error(format!("plateau_factor must be in [0, 1), got {factor}")));
        }
        if !config.plateau_threshold.is_finite() || config.plateau_threshold < 0.0 {
            return Err(config_error("plateau_threshold must be non-negative"));
        }
        if !config.plateau_min_lr.is_finite() || config.plateau_min_lr < 0.0 {
            return Err(config_error("plateau_min_lr must be non-negative"));
        }

        Ok(Plateau {
            mode: config.plateau_mode,
            threshold_mode: config.plateau_threshold_mode,
            factor,
            threshold: config.plateau_threshold,
            patience: config.plateau_patience,
            cooldown: config.plateau_cooldown,
            min_lr: config.plateau_min_lr,
            eps: config.plateau_eps,
            best: None,
            num_bad_epochs: 0,
            cooldown_counter: 0,
        })
    }

    fn is_better(&self, metric: f64) -> bool {
        let Some(best) = self.best else {
            return !metric.is_nan();
        };
        match (self.mode, self.threshold_mode) {
            (PlateauMode::Min, ThresholdMode::Rel) => metric < best * (1.0 - self.threshold),
            (PlateauMode::Min, ThresholdMode::Abs) => metric < best - self.threshold,
            (PlateauMode::Max, ThresholdMode::Rel) => metric > best * (1.0 + self.threshold),
            (PlateauMode::Max, ThresholdMode::Abs) => metric > best + self.threshold,
        }
    }

    /// Records one evaluation and returns the rates to use next,
    /// together with whether a reduction happened
    pub fn rates(&mut self, metric: f64, last_rates: &[f64]) -> (Vec<f64>, bool) {
        if self.is_better(metric) {
            self.best = Some(metric);
            self.num_bad_epochs = 0;
        } else {
            self.num_bad_epochs += 1;
        }

        if self.cooldown_counter > 0 {
            self.cooldown_counter -= 1;
            self.num_bad_epochs = 0;
        }

        if self.num_bad_epochs <= self.patience {
            return (last_rates.to_vec(), false);
        }

        self.cooldown_counter = self.cooldown;
        self.num_bad_epochs = 0;

        let rates = last_rates
            .iter()
            .map(|&lr| {
                let reduced = (lr * self.factor).max(self.min_lr);
                if lr - reduced > self.eps {
                    reduced
                } else {
                    tracing::warn!(lr, reduced, "plateau reduction below eps skipped");
                    lr
                }
            })
            .collect();
        (rates, true)
    }

    pub fn transient(&self) -> (Option<f64>, usize, usize) {
        (self.best, self.num_bad_epochs, self.cooldown_counter)
    }

    pub fn restore(
        &mut self,
        best: Option<f64>,
        num_bad_epochs: usize,
        cooldown_counter: usize,
    ) -> Result<()> {
        if best.is_some_and(|best| !best.is_finite()) {
            return Err(state_error("best plateau metric must be finite"));
        }
        self.best = best;
        self.num_bad_epochs = num_bad_epochs;
        self.cooldown_counter = cooldown_counter;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LrScheme;
    use crate::test_utils::assert_close;

    fn plateau(patience: usize, cooldown: usize) -> Plateau {
        let mut config = SchedulerConfig::new(LrScheme::ReduceOnPlateau);
        config.plateau_factor = 0.5;
        config.plateau_patience = patience;
        config.plateau_cooldown = cooldown;
        Plateau::from_config(&config).unwrap()
    }

    #[test]
    fn test_reduces_after_patience() {
        let mut policy = plateau(2, 0);
        let mut rates = vec![1.0];

        for metric in [1.0, 0.9, 0.9, 0.9] {
            let (next, reduced) = policy.rates(metric, &rates);
            assert!(!reduced);
            rates = next;
        }
        assert_close(rates[0], 1.0, 1e-12);

        let (rates, reduced) = policy.rates(0.9, &rates);
        assert!(reduced);
        assert_close(rates[0], 0.5, 1e-12);
        assert_eq!(policy.transient(), (Some(0.9), 0, 0));
    }

    #[test]
    fn test_improvement_resets_bad_count() {
        let mut policy = plateau(1, 0);
        let mut rates = vec![1.0];

        for metric in [1.0, 1.0, 0.5, 0.5, 0.4] {
            let (next, reduced) = policy.rates(metric, &rates);
            assert!(!reduced);
            rates = next;
        }
        assert_eq!(policy.transient().1, 0);
    }

    #[test]
    fn test_cooldown_delays_next_reduction() {
        let mut policy = plateau(0, 2);
        let mut rates = vec![1.0];
        let mut reductions = Vec::new();

        for metric in [1.0, 1.0, 1.0, 1.0, 1.0, 1.0] {
            let (next, reduced) = policy.rates(metric, &rates);
            reductions.push(reduced);
            rates = next;
        }

        assert_eq!(reductions, vec![false, true, false, false, true, false]);
        assert_close(rates[0], 0.25, 1e-12);
    }

    #[test]
    fn test_max_mode_with_absolute_threshold() {
        let mut config = SchedulerConfig::new(LrScheme::ReduceOnPlateau);
        config.plateau_mode = PlateauMode::Max;
        config.plateau_threshold_mode = ThresholdMode::Abs;
        config.plateau_threshold = 0.5;
        config.plateau_patience = 0;
        let mut policy = Plateau::from_config(&config).unwrap();

        let (rates, reduced) = policy.rates(30.0, &[1.0]);
        assert!(!reduced);
        // Up by less than the threshold counts as no improvement
        let (rates, reduced) = policy.rates(30.2, &rates);
        assert!(reduced);
        assert_close(rates[0], 0.1, 1e-12);
    }

    #[test]
    fn test_min_lr_floor() {
        let mut config = SchedulerConfig::new(LrScheme::ReduceOnPlateau);
        config.plateau_patience = 0;
        config.plateau_min_lr = 0.05;
        let mut policy = Plateau::from_config(&config).unwrap();

        policy.rates(1.0, &[0.1]);
        let (rates, _) = policy.rates(1.0, &[0.1]);
        assert_close(rates[0], 0.05, 1e-12);
        let (rates, _) = policy.rates(1.0, &rates);
        assert_close(rates[0], 0.05, 1e-12);
    }

    #[test]
    fn test_factor_must_reduce() {
        let mut config = SchedulerConfig::new(LrScheme::ReduceOnPlateau);
        config.plateau_factor = 1.0;
        assert!(Plateau::from_config(&config).is_err());
    }
}
