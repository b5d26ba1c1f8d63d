use crate::error::{config_error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Learning rate policies understood by the scheduler factory,
/// named as they appear in training option files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LrScheme {
    Linear,
    FlatCosineDecay,
    #[serde(rename = "StepLR")]
    Step,
    #[serde(rename = "StepLR_Restart")]
    StepRestart,
    #[serde(rename = "MultiStepLR")]
    MultiStep,
    #[serde(rename = "MultiStepLR_Restart")]
    MultiStepRestart,
    #[serde(rename = "ProgressiveMultiStepLR")]
    ProgressiveMultiStep,
    #[serde(rename = "CosineAnnealingLR")]
    CosineAnnealing,
    #[serde(rename = "CosineAnnealingLR_Restart")]
    CosineAnnealingRestart,
    #[serde(rename = "ReduceLROnPlateau")]
    ReduceOnPlateau,
    Constant,
}

impl LrScheme {
    pub const ALL: [LrScheme; 11] = [
        LrScheme::Linear,
        LrScheme::FlatCosineDecay,
        LrScheme::Step,
        LrScheme::StepRestart,
        LrScheme::MultiStep,
        LrScheme::MultiStepRestart,
        LrScheme::ProgressiveMultiStep,
        LrScheme::CosineAnnealing,
        LrScheme::CosineAnnealingRestart,
        LrScheme::ReduceOnPlateau,
        LrScheme::Constant,
    ];

    /// Name used in option files and in saved scheduler state
    pub fn as_str(&self) -> &'static str {
        match self {
            LrScheme::Linear => "Linear",
            LrScheme::FlatCosineDecay => "FlatCosineDecay",
            LrScheme::Step => "StepLR",
            LrScheme::StepRestart => "StepLR_Restart",
            LrScheme::MultiStep => "MultiStepLR",
            LrScheme::MultiStepRestart => "MultiStepLR_Restart",
            LrScheme::ProgressiveMultiStep => "ProgressiveMultiStepLR",
            LrScheme::CosineAnnealing => "CosineAnnealingLR",
            LrScheme::CosineAnnealingRestart => "CosineAnnealingLR_Restart",
            LrScheme::ReduceOnPlateau => "ReduceLROnPlateau",
            LrScheme::Constant => "Constant",
        }
    }
}

impl fmt::Display for LrScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LrScheme {
    type Err = crate::SchedulerError;

    fn from_str(name: &str) -> Result<Self> {
        LrScheme::ALL
            .iter()
            .copied()
            .find(|scheme| scheme.as_str() == name)
            .ok_or_else(|| {
                config_error(format!(
                    "learning rate scheme [{name}] not defined or not recognized"
                ))
            })
    }
}

/// Direction in which the monitored metric improves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlateauMode {
    #[default]
    Min,
    Max,
}

/// Whether the plateau threshold is relative to the best value or absolute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMode {
    #[default]
    Rel,
    Abs,
}

/// Scheduling options of one training run, shared by every optimizer of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Policy selector
    pub lr_scheme: LrScheme,

    /// Milestones of the multi-step policies, may repeat to compound decay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lr_steps: Option<Vec<usize>>,

    /// Multiplicative decay factor
    #[serde(default = "default_gamma")]
    pub lr_gamma: f64,

    /// Decay period of `StepLR`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lr_step_size: Option<usize>,

    /// Decay periods of `StepLR_Restart`, one per restart interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lr_step_sizes: Option<Vec<usize>>,

    /// Steps at which the rate restarts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restarts: Option<Vec<usize>>,

    /// Base-rate scale applied at each restart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_weights: Option<Vec<f64>>,

    /// Drop optimizer state (momentum buffers) at every restart
    #[serde(default)]
    pub clear_state: bool,

    /// Pin every rate to its base rate, disabling scheduling
    #[serde(default)]
    pub force_lr: bool,

    /// Period of plain cosine annealing
    #[serde(rename = "T_max", default, skip_serializing_if = "Option::is_none")]
    pub t_max: Option<usize>,

    /// Cosine periods, one per restart interval
    #[serde(rename = "T_period", default, skip_serializing_if = "Option::is_none")]
    pub t_period: Option<Vec<usize>>,

    /// Floor of the cosine policies
    #[serde(default)]
    pub eta_min: f64,

    /// Total training length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niter: Option<usize>,

    /// Length of the flat phase of `Linear`/`FlatCosineDecay`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_niter: Option<usize>,

    /// Length of the decay phase of `Linear`/`FlatCosineDecay`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niter_decay: Option<usize>,

    /// Flat phase as a fraction of `niter`, the rest of the run decays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_niter_rel: Option<f64>,

    /// Milestones of `ProgressiveMultiStepLR`, relative to each group's start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen_lr_steps: Option<Vec<usize>>,

    /// Step at which each parameter group becomes active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progressive_starts: Option<Vec<usize>>,

    #[serde(default)]
    pub plateau_mode: PlateauMode,

    #[serde(default = "default_plateau_factor")]
    pub plateau_factor: f64,

    #[serde(default = "default_plateau_threshold")]
    pub plateau_threshold: f64,

    #[serde(default = "default_plateau_patience")]
    pub plateau_patience: usize,

    #[serde(default)]
    pub plateau_threshold_mode: ThresholdMode,

    /// Evaluations to wait after a reduction before counting bad evaluations again
    #[serde(default)]
    pub plateau_cooldown: usize,

    /// Lower bound for rates reduced by the plateau policy
    #[serde(default)]
    pub plateau_min_lr: f64,

    /// Reductions smaller than this are skipped
    #[serde(default = "default_plateau_eps")]
    pub plateau_eps: f64,
}

fn default_gamma() -> f64 {
    0.1
}

fn default_plateau_factor() -> f64 {
    0.1
}

fn default_plateau_threshold() -> f64 {
    1e-4
}

fn default_plateau_patience() -> usize {
    10
}

fn default_plateau_eps() -> f64 {
    1e-8
}

impl SchedulerConfig {
    /// Creates a configuration for `scheme` with every other field at its default
    pub fn new(lr_scheme: LrScheme) -> Self {
        SchedulerConfig {
            lr_scheme,
            lr_steps: None,
            lr_gamma: default_gamma(),
            lr_step_size: None,
            lr_step_sizes: None,
            restarts: None,
            restart_weights: None,
            clear_state: false,
            force_lr: false,
            t_max: None,
            t_period: None,
            eta_min: 0.0,
            niter: None,
            fixed_niter: None,
            niter_decay: None,
            fixed_niter_rel: None,
            gen_lr_steps: None,
            progressive_starts: None,
            plateau_mode: PlateauMode::default(),
            plateau_factor: default_plateau_factor(),
            plateau_threshold: default_plateau_threshold(),
            plateau_patience: default_plateau_patience(),
            plateau_threshold_mode: ThresholdMode::default(),
            plateau_cooldown: 0,
            plateau_min_lr: 0.0,
            plateau_eps: default_plateau_eps(),
        }
    }

    /// Policy actually run: `force_lr` pins every rate to its base rate
    pub fn effective_scheme(&self) -> LrScheme {
        if self.force_lr {
            LrScheme::Constant
        } else {
            self.lr_scheme
        }
    }

    /// Parses a configuration from JSON, unknown schemes are configuration errors
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| config_error(e.to_string()))
    }

    /// Reads a configuration from a JSON options file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Restart steps and their weights, falling back to a single
    /// restart at step 0 with weight 1 when absent
    pub fn restart_plan(&self) -> Result<(Vec<usize>, Vec<f64>)> {
        let restarts = match &self.restarts {
            Some(restarts) if !restarts.is_empty() => restarts.clone(),
            _ => vec![0],
        };
        let weights = match &self.restart_weights {
            Some(weights) if !weights.is_empty() => weights.clone(),
            _ => vec![1.0],
        };

        if let Some(weight) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(config_error(format!(
                "restart weights must be finite and non-negative, got {weight}"
            )));
        }

        Ok((restarts, weights))
    }

    /// Flat and decay durations of `Linear`/`FlatCosineDecay`,
    /// either absolute or derived from `fixed_niter_rel` and `niter`
    pub fn flat_decay_durations(&self) -> Result<(f64, f64)> {
        match self.fixed_niter_rel {
            Some(rel) => {
                if self.fixed_niter.is_some() || self.niter_decay.is_some() {
                    return Err(config_error(
                        "fixed_niter_rel is mutually exclusive with fixed_niter/niter_decay",
                    ));
                }
                if !(rel > 0.0 && rel <= 1.0) {
                    return Err(config_error(format!(
                        "fixed_niter_rel must be in (0, 1], got {rel}"
                    )));
                }
                let total = self
                    .niter
                    .ok_or_else(|| config_error("fixed_niter_rel requires niter"))?
                    as f64;
                let fixed = total * rel;
                Ok((fixed, total - fixed))
            }
            None => {
                let fixed = self.fixed_niter.ok_or_else(|| {
                    config_error(format!("{} requires fixed_niter", self.lr_scheme))
                })?;
                let decay = self.niter_decay.ok_or_else(|| {
                    config_error(format!("{} requires niter_decay", self.lr_scheme))
                })?;
                Ok((fixed as f64, decay as f64))
            }
        }
    }

    pub(crate) fn require<'a, T>(&self, field: &'a Option<T>, name: &str) -> Result<&'a T> {
        field
            .as_ref()
            .ok_or_else(|| config_error(format!("{} requires {}", self.lr_scheme, name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SchedulerError;

    #[test]
    fn test_parse_multistep_restart_with_defaults() {
        let config = SchedulerConfig::from_json_str(
            r#"{"lr_scheme": "MultiStepLR_Restart", "lr_steps": [50000, 100000]}"#,
        )
        .unwrap();

        assert_eq!(config.lr_scheme, LrScheme::MultiStepRestart);
        assert_eq!(config.lr_gamma, 0.1);
        assert!(!config.clear_state);
        assert_eq!(config.restart_plan().unwrap(), (vec![0], vec![1.0]));
    }

    #[test]
    fn test_parse_cosine_field_names() {
        let config = SchedulerConfig::from_json_str(
            r#"{"lr_scheme": "CosineAnnealingLR_Restart", "T_period": [10, 10],
                "restarts": [10], "restart_weights": [0.5], "eta_min": 1e-7}"#,
        )
        .unwrap();

        assert_eq!(config.t_period, Some(vec![10, 10]));
        assert_eq!(config.eta_min, 1e-7);
    }

    #[test]
    fn test_unknown_scheme_is_configuration_error() {
        let err = SchedulerConfig::from_json_str(r#"{"lr_scheme": "OneCycle"}"#).unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(_)));

        let err = "OneCycle".parse::<LrScheme>().unwrap_err();
        assert!(format!("{}", err).contains("OneCycle"));
    }

    #[test]
    fn test_scheme_names_round_trip() {
        for scheme in LrScheme::ALL {
            assert_eq!(scheme.as_str().parse::<LrScheme>().unwrap(), scheme);
        }
    }

    #[test]
    fn test_relative_durations() {
        let mut config = SchedulerConfig::new(LrScheme::Linear);
        config.niter = Some(1000);
        config.fixed_niter_rel = Some(0.25);

        assert_eq!(config.flat_decay_durations().unwrap(), (250.0, 750.0));
    }

    #[test]
    fn test_relative_and_absolute_durations_conflict() {
        let mut config = SchedulerConfig::new(LrScheme::Linear);
        config.niter = Some(1000);
        config.fixed_niter_rel = Some(0.5);
        config.fixed_niter = Some(100);

        assert!(config.flat_decay_durations().is_err());
    }

    #[test]
    fn test_relative_duration_out_of_range() {
        let mut config = SchedulerConfig::new(LrScheme::FlatCosineDecay);
        config.niter = Some(1000);
        config.fixed_niter_rel = Some(1.5);

        assert!(config.flat_decay_durations().is_err());
    }

    #[test]
    fn test_bundled_option_files_build() {
        for name in ["cosine_restart", "multistep_restart", "plateau"] {
            let path = format!("{}/options/{name}.json", env!("CARGO_MANIFEST_DIR"));
            let config = SchedulerConfig::from_json_file(&path).unwrap();
            assert!(crate::Scheduler::new(vec![2e-4], &config).is_ok(), "{name}");
        }
    }
}
