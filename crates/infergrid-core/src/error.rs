//! Configuration error types.

use thiserror::Error;

use crate::types::{ServerId, TaskId};

/// Errors raised while loading or validating a simulation config.
///
/// All of them are fatal: a run never starts on an invalid config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("no servers configured")]
    NoServers,

    #[error("no requests configured")]
    NoRequests,

    #[error("duplicate server id: {0}")]
    DuplicateServer(ServerId),

    #[error("duplicate request id: {0}")]
    DuplicateRequest(TaskId),

    #[error("server {0} has zero capacity")]
    ZeroCapacity(ServerId),

    #[error("request {id} has invalid exec_time {value}")]
    InvalidExecTime { id: TaskId, value: f64 },

    #[error("request {id} has invalid arrival_time {value}")]
    InvalidArrivalTime { id: TaskId, value: f64 },

    #[error("invalid simulation setting `{field}`: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
