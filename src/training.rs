use crate::error::{config_error, Result};
use crate::{Optimizer, Scheduler};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Rates in effect after one scheduler step
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// Value of the step counter after stepping
    pub step: i64,
    /// Current rates of every scheduler, index-aligned with the optimizers
    pub rates: Vec<Vec<f64>>,
}

/// Drives schedulers the way a training loop does.
///
/// Each iteration writes the current rates into the optimizers (where the
/// optimizer update would run) and then steps every scheduler, feeding
/// `metrics[iteration]` to reactive ones.
///
/// # Arguments
/// * `schedulers` - One scheduler per optimizer
/// * `optimizers` - Optimizer handles receiving the rates
/// * `iterations` - Number of training iterations to run
/// * `metrics` - Monitored metric per iteration, required by the plateau policy
pub fn run_schedule<O: Optimizer>(
    schedulers: &mut [Scheduler],
    optimizers: &mut [O],
    iterations: usize,
    metrics: Option<&[f64]>,
) -> Result<Vec<StepRecord>> {
    if schedulers.is_empty() || schedulers.len() != optimizers.len() {
        return Err(config_error(format!(
            "{} schedulers for {} optimizers",
            schedulers.len(),
            optimizers.len()
        )));
    }
    if schedulers.iter().any(Scheduler::is_reactive) {
        let available = metrics.map_or(0, |metrics| metrics.len());
        if available < iterations {
            return Err(config_error(format!(
                "plateau scheduling needs {iterations} metric values, got {available}"
            )));
        }
    }

    let mut records = Vec::with_capacity(iterations);
    for iteration in 0..iterations {
        for (scheduler, optimizer) in schedulers.iter_mut().zip(optimizers.iter_mut()) {
            scheduler.apply(optimizer);

            match metrics {
                Some(metrics) if scheduler.is_reactive() => {
                    scheduler.step_metric(metrics[iteration])?
                }
                _ => scheduler.step()?,
            }
        }

        records.push(StepRecord {
            step: schedulers[0].last_step(),
            rates: schedulers
                .iter()
                .map(|scheduler| scheduler.current_rates().to_vec())
                .collect(),
        });
    }

    // Rates computed by the last step still have to reach the optimizers
    for (scheduler, optimizer) in schedulers.iter_mut().zip(optimizers.iter_mut()) {
        scheduler.apply(optimizer);
    }

    Ok(records)
}

/// Generates a noisy, slowly flattening validation-loss curve for
/// exercising the plateau policy without a real training run
///
/// # Arguments
/// * `count` - Number of evaluations
/// * `noise` - Standard deviation of the Gaussian noise
/// * `seed` - Seed of the random generator
pub fn synthetic_metrics(count: usize, noise: f64, seed: u64) -> Result<Vec<f64>> {
    let normal = Normal::new(0.0, noise)
        .map_err(|e| config_error(format!("invalid metric noise {noise}: {e}")))?;
    let mut rng = StdRng::seed_from_u64(seed);

    Ok((0..count)
        .map(|iteration| {
            let trend = 0.1 + 1.0 / (1.0 + 0.05 * iteration as f64);
            (trend + normal.sample(&mut rng)).max(0.0)
        })
        .collect())
}
