use serde::Serialize;
use thiserror::Error;

/// Errors a solve request can end in. Infeasibility and timeouts are not
/// errors; they are outcome variants of [`crate::data::SolverOutcome`].
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SolveError {
    #[error("workload of {workload}h exceeds capacity of {capacity}h")]
    #[serde(rename_all = "camelCase")]
    OverCapacity { workload: f64, capacity: f64 },

    #[error("solver backend '{backend}' is unavailable: {reason}")]
    #[serde(rename_all = "camelCase")]
    SolverUnavailable { backend: String, reason: String },

    #[error("invalid instance: {reason}")]
    #[serde(rename_all = "camelCase")]
    InvalidInstance { reason: String },

    #[error("internal solver error: {message}")]
    #[serde(rename_all = "camelCase")]
    Internal { message: String },
}

impl SolveError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        SolveError::InvalidInstance {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SolveError::Internal {
            message: message.into(),
        }
    }
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
