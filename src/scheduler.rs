use crate::config::{LrScheme, SchedulerConfig};
use crate::error::{config_error, state_error, Result};
use crate::schedulers::{Policy, SchedulerOutput};
use crate::state::SchedulerSnapshot;
use crate::Optimizer;
use tracing::Span;

/// Learning rate scheduler for the parameter groups of one optimizer.
///
/// Starts with `last_step == -1` and the base rates as current rates. Each
/// call to [`Scheduler::step`] (or [`Scheduler::step_metric`] for the plateau
/// policy) advances the counter by one and recomputes every group's rate.
#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Policy actually run, recorded in snapshots
    scheme: LrScheme,
    /// Initial rate of each parameter group
    base_rates: Vec<f64>,
    /// Counter of completed steps, zero-indexed
    last_step: i64,
    /// Rates computed by the latest step
    current_rates: Vec<f64>,
    policy: Policy,
    /// Set by a restart that asks the optimizer to drop its state,
    /// delivered by the next call to `apply`
    pending_clear: bool,
    span: Span,
}

impl Scheduler {
    /// Creates a scheduler for an optimizer whose groups start at `base_rates`
    pub fn new(base_rates: Vec<f64>, config: &SchedulerConfig) -> Result<Self> {
        Self::with_span(base_rates, config, Span::none())
    }

    /// Like [`Scheduler::new`], logging restarts and reductions inside `span`
    pub fn with_span(base_rates: Vec<f64>, config: &SchedulerConfig, span: Span) -> Result<Self> {
        if base_rates.is_empty() {
            return Err(config_error("optimizer has no parameter groups"));
        }
        if let Some(rate) = base_rates.iter().find(|r| !r.is_finite() || **r < 0.0) {
            return Err(config_error(format!(
                "base learning rates must be finite and non-negative, got {rate}"
            )));
        }

        let policy = Policy::from_config(config, base_rates.len())?;

        Ok(Scheduler {
            scheme: config.effective_scheme(),
            current_rates: base_rates.clone(),
            base_rates,
            last_step: -1,
            policy,
            pending_clear: false,
            span,
        })
    }

    pub fn scheme(&self) -> LrScheme {
        self.scheme
    }

    pub fn base_rates(&self) -> &[f64] {
        &self.base_rates
    }

    pub fn last_step(&self) -> i64 {
        self.last_step
    }

    /// Rates computed by the most recent step, one per parameter group
    pub fn current_rates(&self) -> &[f64] {
        &self.current_rates
    }

    /// Whether this scheduler must be stepped with [`Scheduler::step_metric`]
    pub fn is_reactive(&self) -> bool {
        self.policy.is_reactive()
    }

    /// Advances a time-based scheduler by one step
    pub fn step(&mut self) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();
        let step = (self.last_step + 1) as usize;

        let output = self
            .policy
            .step_rates(step, &self.base_rates, &self.current_rates)?;

        if let SchedulerOutput::Restart { clear_state, .. } = &output {
            tracing::info!(step, clear_state, "learning rate restart");
            self.pending_clear |= *clear_state;
        }

        self.commit(output.into_rates());
        Ok(())
    }

    /// Advances the plateau scheduler with the latest monitored metric
    pub fn step_metric(&mut self, metric: f64) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        let (rates, reduced) = self.policy.metric_rates(metric, &self.current_rates)?;
        if reduced {
            tracing::info!(step = self.last_step + 1, metric, ?rates, "plateau reduction");
        }

        self.commit(rates);
        Ok(())
    }

    fn commit(&mut self, rates: Vec<f64>) {
        self.last_step += 1;
        self.current_rates = rates.into_iter().map(|lr| lr.max(0.0)).collect();
    }

    /// Writes the current rates into `optimizer` and delivers a pending
    /// request to clear its per-parameter state
    pub fn apply<O: Optimizer + ?Sized>(&mut self, optimizer: &mut O) {
        optimizer.set_rates(&self.current_rates);
        if self.pending_clear {
            optimizer.clear_state();
            self.pending_clear = false;
        }
    }

    /// Snapshot of everything needed to resume this scheduler
    pub fn save_state(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            scheme: self.scheme,
            last_step: self.last_step,
            base_rates: self.base_rates.clone(),
            current_rates: self.current_rates.clone(),
            policy: self.policy.state(),
            pending_clear: self.pending_clear,
        }
    }

    /// Restores counters, rates and policy transient fields from `snapshot`.
    ///
    /// Milestone and restart lists of this scheduler are kept. Nothing is
    /// modified when the snapshot does not fit this scheduler.
    pub fn load_state(&mut self, snapshot: &SchedulerSnapshot) -> Result<()> {
        if snapshot.scheme != self.scheme {
            return Err(state_error(format!(
                "snapshot was taken from a {} scheduler, this one runs {}",
                snapshot.scheme, self.scheme
            )));
        }

        let groups = self.base_rates.len();
        if snapshot.base_rates.len() != groups || snapshot.current_rates.len() != groups {
            return Err(state_error(format!(
                "expected {} parameter groups, snapshot has {} base and {} current rates",
                groups,
                snapshot.base_rates.len(),
                snapshot.current_rates.len()
            )));
        }
        if snapshot.last_step < -1 {
            return Err(state_error(format!(
                "step counter must be at least -1, got {}",
                snapshot.last_step
            )));
        }
        let rates = snapshot.base_rates.iter().chain(&snapshot.current_rates);
        if let Some(rate) = rates.into_iter().find(|r| !r.is_finite() || **r < 0.0) {
            return Err(state_error(format!(
                "rates must be finite and non-negative, got {rate}"
            )));
        }

        let next_step = (snapshot.last_step + 1) as usize;
        self.policy.load_state(&snapshot.policy, next_step)?;

        self.last_step = snapshot.last_step;
        self.base_rates = snapshot.base_rates.clone();
        self.current_rates = snapshot.current_rates.clone();
        self.pending_clear = snapshot.pending_clear;

        let _enter = self.span.enter();
        tracing::debug!(last_step = self.last_step, "scheduler state loaded");
        Ok(())
    }
}
