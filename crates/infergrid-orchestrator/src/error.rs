//! Orchestrator error types.

use thiserror::Error;

use infergrid_core::ConfigError;
use infergrid_worker::WorkerError;

/// Errors that end a run.
///
/// Load, migration, and worker-loss conditions are not errors; they show
/// up in the event log and the report instead.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("failed to encode event log: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
