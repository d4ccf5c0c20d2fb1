//! Observable simulation events.

use serde::{Deserialize, Serialize};

use crate::types::{Policy, ServerId, TaskId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    Arrival {
        task_id: TaskId,
    },
    Dispatch {
        task_id: TaskId,
        policy: Policy,
        server_id: ServerId,
    },
    Start {
        task_id: TaskId,
        server_id: ServerId,
    },
    Completion {
        task_id: TaskId,
        server_id: ServerId,
        /// Realized execution time in simulation seconds.
        realized: f64,
    },
    Migration {
        task_id: TaskId,
        from: ServerId,
        to: ServerId,
    },
    /// An overloaded server had a candidate but no destination qualified.
    MigrationSkipped {
        task_id: TaskId,
        from: ServerId,
    },
    WorkerLost {
        server_id: ServerId,
        lost: Vec<TaskId>,
    },
}

impl SimEvent {
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            SimEvent::Arrival { task_id }
            | SimEvent::Dispatch { task_id, .. }
            | SimEvent::Start { task_id, .. }
            | SimEvent::Completion { task_id, .. }
            | SimEvent::Migration { task_id, .. }
            | SimEvent::MigrationSkipped { task_id, .. } => Some(*task_id),
            SimEvent::WorkerLost { .. } => None,
        }
    }
}

/// An event stamped with the simulation time it was observed at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub at: f64,
    #[serde(flatten)]
    pub event: SimEvent,
}
