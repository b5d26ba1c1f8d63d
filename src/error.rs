use thiserror::Error;

/// Errors raised while building, stepping or restoring schedulers
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Invalid or incomplete policy configuration, raised before any step runs
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Serialized state that does not fit the scheduler it is loaded into
    #[error("invalid scheduler state: {0}")]
    InvalidState(String),

    #[error("plateau scheduler must be stepped with a monitored metric")]
    MetricRequired,

    #[error("time-based scheduler does not accept a monitored metric")]
    MetricNotAccepted,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

pub(crate) fn config_error(message: impl Into<String>) -> SchedulerError {
    SchedulerError::Configuration(message.into())
}

pub(crate) fn state_error(message: impl Into<String>) -> SchedulerError {
    SchedulerError::InvalidState(message.into())
}
