use crate::error::{config_error, Result};
use std::collections::BTreeSet;

/// Multi-step decay for parameter groups that join training at different
/// steps, as when sub-networks are grown one stage at a time.
///
/// Milestones are relative to each group's own start. A group's rate is
/// multiplied by gamma once when `step - start` is a milestone and is left
/// untouched before the group starts.
#[derive(Debug, Clone)]
pub struct ProgressiveMultiStep {
    milestones: BTreeSet<usize>,
    group_starts: Vec<usize>,
    gamma: f64,
}

impl ProgressiveMultiStep {
    pub fn new(
        milestones: &[usize],
        group_starts: Vec<usize>,
        gamma: f64,
        group_count: usize,
    ) -> Result<Self> {
        if group_starts.len() != group_count {
            return Err(config_error(format!(
                "progressive_starts has {} entries for {} parameter groups",
                group_starts.len(),
                group_count
            )));
        }
        Ok(ProgressiveMultiStep {
            milestones: milestones.iter().copied().collect(),
            group_starts,
            gamma,
        })
    }

    pub fn rates(&self, step: usize, last_rates: &[f64]) -> Vec<f64> {
        last_rates
            .iter()
            .zip(&self.group_starts)
            .map(|(&lr, &start)| match step.checked_sub(start) {
                Some(relative) if self.milestones.contains(&relative) => lr * self.gamma,
                _ => lr,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_rates_close;

    #[test]
    fn test_groups_decay_relative_to_their_start() {
        let policy = ProgressiveMultiStep::new(&[2, 4], vec![0, 3], 0.5, 2).unwrap();
        let mut last = vec![1.0, 1.0];
        let mut history = Vec::new();
        for step in 0..8 {
            last = policy.rates(step, &last);
            history.push(last.clone());
        }

        assert_rates_close(&history[1], &[1.0, 1.0], 1e-12);
        assert_rates_close(&history[2], &[0.5, 1.0], 1e-12);
        assert_rates_close(&history[4], &[0.25, 1.0], 1e-12);
        assert_rates_close(&history[5], &[0.25, 0.5], 1e-12);
        assert_rates_close(&history[7], &[0.25, 0.25], 1e-12);
    }

    #[test]
    fn test_duplicate_milestones_decay_once() {
        let policy = ProgressiveMultiStep::new(&[1, 1], vec![0], 0.1, 1).unwrap();
        assert_rates_close(&policy.rates(1, &[1.0]), &[0.1], 1e-12);
    }

    #[test]
    fn test_group_count_mismatch() {
        assert!(ProgressiveMultiStep::new(&[2], vec![0, 10], 0.5, 3).is_err());
    }
}
