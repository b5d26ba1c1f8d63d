pub mod args;
pub mod config;
pub mod error;
pub mod factory;
pub mod optimizers;
pub mod scheduler;
pub mod schedulers;
pub mod state;
pub mod test_utils;
pub mod training;

pub use args::{parse_arguments, RunOptions};
pub use config::{LrScheme, PlateauMode, SchedulerConfig, ThresholdMode};
pub use error::{Result, SchedulerError};
pub use factory::{
    get_schedulers, get_schedulers_with, load_states, save_states, schedulers_from_rates,
};
pub use optimizers::{Optimizer, ParamGroups};
pub use scheduler::Scheduler;
pub use schedulers::{
    CosineRestart, DecayShape, FlatDecay, MultiStep, MultiStepRestart, Plateau, Policy,
    ProgressiveMultiStep, RestartPlan, SchedulerOutput, StepDecay, StepRestart,
};
pub use state::{read_snapshots, write_snapshots, PolicyState, SchedulerSnapshot};
pub use training::{run_schedule, synthetic_metrics, StepRecord};
