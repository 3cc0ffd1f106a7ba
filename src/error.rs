//! Error types shared across the monitoring engine and the experiment layer.

use thiserror::Error;

/// Boxed error returned by success subscribers and evaluators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum BenchError {
    /// The pid vanished between the liveness check and the measurement.
    #[error("Process with PID {0} not found")]
    ProcessNotFound(u32),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Success handler for experiment \"{experiment}\" failed: {source}")]
    SubscriberFailure {
        experiment: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to install signal handler: {0}")]
    SignalHandler(String),

    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    /// Whether this error only signals that the monitored process is gone.
    pub fn is_process_gone(&self) -> bool {
        matches!(self, BenchError::ProcessNotFound(_))
    }
}
