//! Worker — one simulated server executing tasks from its inbox.
//!
//! State per execution slot is `Idle → Running(task) → Idle`. A worker has
//! `capacity` slots, guarded by a semaphore. On shutdown it stops taking
//! work, lets running tasks finish, then exits.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use infergrid_core::{ServerId, SimClock, Task, TaskId};

use crate::duration::DurationModel;

/// Orchestrator → worker.
#[derive(Debug)]
pub enum WorkerCommand {
    Execute(Task),
    /// Finish running tasks, then exit.
    Shutdown,
}

/// Worker → orchestrator, over the shared outbound queue.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Started {
        server_id: ServerId,
        task_id: TaskId,
        start_time: f64,
    },
    Completed {
        server_id: ServerId,
        /// Carries `start_time` and `completion_time`.
        task: Task,
        /// Measured `completion_time - start_time`.
        realized: f64,
    },
}

/// How a worker's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Shutdown { completed: u32 },
    /// Stopped abruptly; tasks it was running never complete.
    Crashed { completed: u32 },
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker for server {0} is unavailable")]
    Unavailable(ServerId),

    #[error("worker task failed: {0}")]
    Join(#[from] JoinError),
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub server_id: ServerId,
    pub capacity: u32,
    /// Crash after completing this many tasks.
    pub fail_after: Option<u32>,
}

/// Orchestrator-side handle to a running worker.
pub struct WorkerHandle {
    server_id: ServerId,
    inbox: mpsc::UnboundedSender<WorkerCommand>,
    join: JoinHandle<WorkerExit>,
    shutdown_requested: bool,
}

impl WorkerHandle {
    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Send a task to the worker's inbox.
    pub fn execute(&self, task: Task) -> Result<(), WorkerError> {
        self.inbox
            .send(WorkerCommand::Execute(task))
            .map_err(|_| WorkerError::Unavailable(self.server_id))
    }

    /// Ask the worker to exit once its running tasks are done.
    pub fn shutdown(&mut self) {
        self.shutdown_requested = true;
        if self.inbox.send(WorkerCommand::Shutdown).is_err() {
            debug!(server_id = self.server_id, "worker already gone at shutdown");
        }
    }

    /// The worker loop ended without being asked to.
    pub fn has_failed(&self) -> bool {
        self.join.is_finished() && !self.shutdown_requested
    }

    pub async fn join(self) -> Result<WorkerExit, WorkerError> {
        Ok(self.join.await?)
    }
}

/// Spawn a worker on the current tokio runtime.
pub fn spawn_worker(
    config: WorkerConfig,
    clock: SimClock,
    model: Box<dyn DurationModel>,
    outbox: mpsc::UnboundedSender<WorkerEvent>,
) -> WorkerHandle {
    let (inbox, commands) = mpsc::unbounded_channel();
    let join = tokio::spawn(run_worker(config, clock, model, commands, outbox));
    WorkerHandle {
        server_id: config.server_id,
        inbox,
        join,
        shutdown_requested: false,
    }
}

async fn run_worker(
    config: WorkerConfig,
    clock: SimClock,
    mut model: Box<dyn DurationModel>,
    mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    outbox: mpsc::UnboundedSender<WorkerEvent>,
) -> WorkerExit {
    let server_id = config.server_id;
    let slots = Arc::new(Semaphore::new(config.capacity as usize));
    let mut running: JoinSet<()> = JoinSet::new();
    let mut completed = 0u32;

    info!(server_id, capacity = config.capacity, "worker ready");

    loop {
        // Checked before taking any command, so a limit of zero never runs a task.
        if config.fail_after.is_some_and(|limit| completed >= limit) {
            running.abort_all();
            warn!(server_id, completed, "worker crashed");
            return WorkerExit::Crashed { completed };
        }

        tokio::select! {
            Some(result) = running.join_next(), if !running.is_empty() => {
                record_finished(server_id, result, &mut completed);
            }
            cmd = commands.recv() => match cmd {
                Some(WorkerCommand::Execute(task)) => {
                    let Ok(permit) = slots.clone().acquire_owned().await else {
                        break;
                    };
                    let realized = model.realize(&task);
                    let outbox = outbox.clone();
                    running.spawn(async move {
                        let _permit = permit;
                        execute(server_id, clock, task, realized, outbox).await;
                    });
                }
                Some(WorkerCommand::Shutdown) | None => break,
            },
        }
    }

    debug!(server_id, in_flight = running.len(), "worker draining");
    while let Some(result) = running.join_next().await {
        record_finished(server_id, result, &mut completed);
    }
    info!(server_id, completed, "worker stopped");
    WorkerExit::Shutdown { completed }
}

async fn execute(
    server_id: ServerId,
    clock: SimClock,
    mut task: Task,
    realized: f64,
    outbox: mpsc::UnboundedSender<WorkerEvent>,
) {
    let start_time = clock.now();
    task.start_time = Some(start_time);
    debug!(server_id, task_id = task.id, nominal = task.exec_time, realized, "task started");
    let started = WorkerEvent::Started {
        server_id,
        task_id: task.id,
        start_time,
    };
    if outbox.send(started).is_err() {
        warn!(server_id, task_id = task.id, "outbound queue closed");
    }

    tokio::time::sleep(clock.wall(realized)).await;

    let completion_time = clock.now();
    task.completion_time = Some(completion_time);
    let task_id = task.id;
    let completed = WorkerEvent::Completed {
        server_id,
        task,
        realized: completion_time - start_time,
    };
    if outbox.send(completed).is_err() {
        warn!(server_id, task_id, "outbound queue closed");
    }
}

fn record_finished(server_id: ServerId, result: Result<(), JoinError>, completed: &mut u32) {
    match result {
        Ok(()) => *completed += 1,
        Err(e) => error!(server_id, error = %e, "task execution aborted"),
    }
}
