use crate::error::{config_error, Result};
use std::f64::consts::PI;

/// Shape of the decay phase following the flat phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayShape {
    /// Straight line from 1 to 0
    Linear,
    /// Half cosine from 1 to 0
    Cosine,
}

/// Holds the rate at its base value for `fixed` steps, then decays it to zero
/// over `decay` steps. Rates stay at zero once the decay phase is over.
#[derive(Debug, Clone)]
pub struct FlatDecay {
    fixed: f64,
    decay: f64,
    shape: DecayShape,
}

impl FlatDecay {
    pub fn new(fixed: f64, decay: f64, shape: DecayShape) -> Result<Self> {
        if !fixed.is_finite() || !decay.is_finite() || fixed < 0.0 || decay < 0.0 {
            return Err(config_error(format!(
                "flat and decay durations must be non-negative, got {fixed} and {decay}"
            )));
        }
        Ok(FlatDecay {
            fixed,
            decay,
            shape,
        })
    }

    /// Multiplier applied to the base rates at `step`, always within [0, 1]
    pub fn scale(&self, step: usize) -> f64 {
        let elapsed = (step as f64 - self.fixed).max(0.0);
        let progress = (elapsed / self.decay.max(1.0)).clamp(0.0, 1.0);

        let scale = match self.shape {
            DecayShape::Linear => 1.0 - progress,
            DecayShape::Cosine => ((PI * progress).cos() + 1.0) / 2.0,
        };
        scale.clamp(0.0, 1.0)
    }

    pub fn rates(&self, step: usize, base_rates: &[f64]) -> Vec<f64> {
        let scale = self.scale(step);
        base_rates.iter().map(|base| base * scale).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_close;

    #[test]
    fn test_linear_flat_then_decay() {
        let policy = FlatDecay::new(100.0, 100.0, DecayShape::Linear).unwrap();

        for step in 0..=100 {
            assert_eq!(policy.scale(step), 1.0);
        }
        for step in 101..=200 {
            assert!(policy.scale(step) < policy.scale(step - 1));
        }
        assert_close(policy.scale(150), 0.5, 1e-12);
        assert_eq!(policy.scale(200), 0.0);
        assert_eq!(policy.scale(1000), 0.0);
    }

    #[test]
    fn test_flat_cosine_stays_at_zero() {
        let policy = FlatDecay::new(10.0, 20.0, DecayShape::Cosine).unwrap();

        assert_eq!(policy.scale(10), 1.0);
        assert_close(policy.scale(20), 0.5, 1e-12);
        assert_close(policy.scale(30), 0.0, 1e-12);
        assert_close(policy.scale(45), 0.0, 1e-12);
    }

    #[test]
    fn test_zero_decay_duration_drops_immediately() {
        let policy = FlatDecay::new(5.0, 0.0, DecayShape::Linear).unwrap();

        assert_eq!(policy.scale(5), 1.0);
        assert_eq!(policy.scale(6), 0.0);
    }

    #[test]
    fn test_rates_scale_all_groups() {
        let policy = FlatDecay::new(0.0, 4.0, DecayShape::Linear).unwrap();
        let rates = policy.rates(2, &[2e-4, 1e-4]);

        assert_close(rates[0], 1e-4, 1e-15);
        assert_close(rates[1], 5e-5, 1e-15);
    }
}
