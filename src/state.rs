//! Serializable scheduler snapshots stored alongside training checkpoints.
//!
//! A snapshot carries counters, rates and policy transient fields only.
//! Milestone and restart lists always come from the configuration of the
//! scheduler the snapshot is loaded into, so a resumed run may edit its
//! future milestones without losing the progress already made.

use crate::config::LrScheme;
use crate::error::{state_error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Policy fields updated only at restart boundaries or metric evaluations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyState {
    /// Everything needed is in the counters and rates
    Stateless,
    StepRestart {
        weight: f64,
        epoch_offset: usize,
        step_size: usize,
    },
    Cosine {
        last_restart: usize,
        t_max: usize,
    },
    Plateau {
        best: Option<f64>,
        num_bad_epochs: usize,
        cooldown_counter: usize,
    },
}

/// Point-in-time state of one scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub scheme: LrScheme,
    pub last_step: i64,
    pub base_rates: Vec<f64>,
    pub current_rates: Vec<f64>,
    pub policy: PolicyState,
    /// Restart clear request not yet delivered to the optimizer
    #[serde(default)]
    pub pending_clear: bool,
}

impl SchedulerSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a snapshot, malformed input is an invalid-state error
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| state_error(e.to_string()))
    }
}

/// Writes the snapshots of every scheduler of a run as one JSON array
pub fn write_snapshots(path: impl AsRef<Path>, snapshots: &[SchedulerSnapshot]) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshots)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Reads snapshots written by [`write_snapshots`]
pub fn read_snapshots(path: impl AsRef<Path>) -> Result<Vec<SchedulerSnapshot>> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| state_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SchedulerError;

    fn snapshot() -> SchedulerSnapshot {
        SchedulerSnapshot {
            scheme: LrScheme::CosineAnnealingRestart,
            last_step: 12,
            base_rates: vec![2e-4, 1e-4],
            current_rates: vec![1.5e-4, 0.75e-4],
            policy: PolicyState::Cosine {
                last_restart: 10,
                t_max: 20,
            },
            pending_clear: false,
        }
    }

    #[test]
    fn test_snapshot_json_layout() {
        let json = snapshot().to_json().unwrap();

        assert!(json.contains("\"scheme\": \"CosineAnnealingLR_Restart\""));
        assert!(json.contains("\"kind\": \"cosine\""));
        assert_eq!(SchedulerSnapshot::from_json(&json).unwrap(), snapshot());
    }

    #[test]
    fn test_plateau_best_before_first_metric() {
        let state = PolicyState::Plateau {
            best: None,
            num_bad_epochs: 0,
            cooldown_counter: 0,
        };
        let json = serde_json::to_string(&state).unwrap();

        assert!(json.contains("\"best\":null"));
        assert_eq!(serde_json::from_str::<PolicyState>(&json).unwrap(), state);
    }

    #[test]
    fn test_pending_clear_defaults_to_false() {
        let json = snapshot().to_json().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value.as_object_mut().unwrap().remove("pending_clear");

        let loaded = SchedulerSnapshot::from_json(&value.to_string()).unwrap();
        assert!(!loaded.pending_clear);
    }

    #[test]
    fn test_malformed_snapshot_is_invalid_state() {
        let err = SchedulerSnapshot::from_json(r#"{"scheme": "StepLR"}"#).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidState(_)));
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let path = std::env::temp_dir().join(format!("restartlr-{}.json", std::process::id()));
        write_snapshots(&path, &[snapshot(), snapshot()]).unwrap();

        let loaded = read_snapshots(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, vec![snapshot(), snapshot()]);
    }
}
