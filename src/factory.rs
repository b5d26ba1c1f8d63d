use crate::error::{state_error, Result};
use crate::{Optimizer, Scheduler, SchedulerConfig, SchedulerSnapshot};
use tracing::Span;

/// Returns one learning rate scheduler per optimizer, e.g. one for the
/// generator and one for the discriminator, all following `config`.
///
/// Base rates are read from each optimizer's current rates. Either every
/// scheduler is built or a configuration error is returned.
pub fn get_schedulers<O: Optimizer>(
    optimizers: &[O],
    config: &SchedulerConfig,
) -> Result<Vec<Scheduler>> {
    get_schedulers_with(optimizers, config, &Span::none())
}

/// Like [`get_schedulers`], with scheduler log events recorded under `parent`
pub fn get_schedulers_with<O: Optimizer>(
    optimizers: &[O],
    config: &SchedulerConfig,
    parent: &Span,
) -> Result<Vec<Scheduler>> {
    let base_rate_sets = optimizers.iter().map(|optimizer| optimizer.rates()).collect();
    schedulers_from_rates(base_rate_sets, config, parent)
}

/// Builds schedulers from explicit per-optimizer base rates
pub fn schedulers_from_rates(
    base_rate_sets: Vec<Vec<f64>>,
    config: &SchedulerConfig,
    parent: &Span,
) -> Result<Vec<Scheduler>> {
    let scheme = config.effective_scheme();
    let schedulers = base_rate_sets
        .into_iter()
        .enumerate()
        .map(|(index, base_rates)| {
            let span = tracing::info_span!(parent: parent, "scheduler", index, %scheme);
            Scheduler::with_span(base_rates, config, span)
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(count = schedulers.len(), %scheme, "schedulers created");
    Ok(schedulers)
}

/// Snapshots of every scheduler of a run, index-aligned with the optimizers
pub fn save_states(schedulers: &[Scheduler]) -> Vec<SchedulerSnapshot> {
    schedulers.iter().map(Scheduler::save_state).collect()
}

/// Restores every scheduler of a run from its snapshot.
/// On any error none of the schedulers is modified.
pub fn load_states(schedulers: &mut [Scheduler], snapshots: &[SchedulerSnapshot]) -> Result<()> {
    if schedulers.len() != snapshots.len() {
        return Err(state_error(format!(
            "{} schedulers but {} saved states",
            schedulers.len(),
            snapshots.len()
        )));
    }

    let mut restored = schedulers.to_vec();
    for (scheduler, snapshot) in restored.iter_mut().zip(snapshots) {
        scheduler.load_state(snapshot)?;
    }
    schedulers.clone_from_slice(&restored);
    Ok(())
}
