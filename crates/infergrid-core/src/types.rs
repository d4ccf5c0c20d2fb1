//! Shared types used across InferGrid crates.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{RequestSpec, ServerSpec};

pub type TaskId = u64;
pub type ServerId = u32;

/// Request priority. Lower numeric value means more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::High),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::Low),
            other => Err(format!("priority must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p as u8
    }
}

/// Scheduling policy selected for a run. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    RoundRobin,
    ShortestJobFirst,
    Priority,
}

impl Policy {
    /// Short tag used in dispatch events and log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            Policy::RoundRobin => "RR",
            Policy::ShortestJobFirst => "SJF",
            Policy::Priority => "PRIO",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Policy::RoundRobin => "Round Robin",
            Policy::ShortestJobFirst => "Shortest Job First",
            Policy::Priority => "Priority",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rr" | "round-robin" | "round_robin" => Ok(Policy::RoundRobin),
            "sjf" | "shortest-job-first" | "shortest_job_first" => Ok(Policy::ShortestJobFirst),
            "priority" | "prio" => Ok(Policy::Priority),
            other => Err(format!("unknown policy: {other} (expected rr, sjf or priority)")),
        }
    }
}

/// A single inference request moving through the simulation.
///
/// The descriptive fields (`id`, `kind`, `priority`, `exec_time`,
/// `arrival_time`) never change after creation. The remaining fields are
/// scheduling metadata filled in as the task progresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: String,
    pub priority: Priority,
    /// Nominal execution time in simulation seconds.
    pub exec_time: f64,
    pub arrival_time: f64,
    pub start_time: Option<f64>,
    pub completion_time: Option<f64>,
    pub assigned_server: Option<ServerId>,
    pub migration_count: u32,
}

impl Task {
    pub fn new(id: TaskId, kind: impl Into<String>, priority: Priority, exec_time: f64, arrival_time: f64) -> Self {
        Self {
            id,
            kind: kind.into(),
            priority,
            exec_time,
            arrival_time,
            start_time: None,
            completion_time: None,
            assigned_server: None,
            migration_count: 0,
        }
    }

    /// Build a task from a validated request descriptor and its resolved arrival.
    pub fn from_request(spec: &RequestSpec, arrival_time: f64) -> Self {
        Self::new(spec.id, spec.kind.clone(), spec.priority, spec.exec_time, arrival_time)
    }

    pub fn has_started(&self) -> bool {
        self.start_time.is_some()
    }

    /// completion − arrival, once completed.
    pub fn turnaround(&self) -> Option<f64> {
        self.completion_time.map(|c| c - self.arrival_time)
    }

    /// start − arrival, once started.
    pub fn wait(&self) -> Option<f64> {
        self.start_time.map(|s| s - self.arrival_time)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Req {} ({}, T={:.1}s, arrival={:.1}s)",
            self.id,
            self.priority.label(),
            self.exec_time,
            self.arrival_time
        )
    }
}

/// Orchestrator-side view of one server.
///
/// `current_load` counts every task dispatched here and not yet completed:
/// the ones still waiting in `queue` plus the ones released to the worker.
#[derive(Debug, Clone)]
pub struct ServerModel {
    pub id: ServerId,
    pub capacity: u32,
    pub current_load: u32,
    /// Dispatched tasks not yet released to the worker.
    pub queue: VecDeque<Task>,
    /// False once the worker is lost.
    pub online: bool,
}

impl ServerModel {
    pub fn new(id: ServerId, capacity: u32) -> Self {
        Self {
            id,
            capacity,
            current_load: 0,
            queue: VecDeque::new(),
            online: true,
        }
    }

    pub fn from_spec(spec: &ServerSpec) -> Self {
        Self::new(spec.id, spec.capacity)
    }

    pub fn has_free_slot(&self) -> bool {
        self.online && self.current_load < self.capacity
    }

    pub fn adjusted_load(&self) -> f64 {
        f64::from(self.current_load) / f64::from(self.capacity)
    }

    /// Tasks released to the worker and not yet completed.
    pub fn in_flight(&self) -> u32 {
        self.current_load.saturating_sub(self.queue.len() as u32)
    }

    /// Accept a dispatched task into the local queue.
    pub fn enqueue(&mut self, mut task: Task) {
        task.assigned_server = Some(self.id);
        self.queue.push_back(task);
        self.current_load += 1;
    }

    /// Remove a still-queued task, releasing its slot.
    pub fn take_queued(&mut self, task_id: TaskId) -> Option<Task> {
        let pos = self.queue.iter().position(|t| t.id == task_id)?;
        let task = self.queue.remove(pos)?;
        self.current_load -= 1;
        Some(task)
    }

    /// Hand every queued task over to the worker. Load is unchanged: the
    /// tasks stay counted until they complete.
    pub fn release_queue(&mut self) -> Vec<Task> {
        self.queue.drain(..).collect()
    }

    /// Record a completion reported by the worker.
    pub fn complete_one(&mut self) {
        self.current_load = self.current_load.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_parses_from_integers() {
        assert_eq!(Priority::try_from(1), Ok(Priority::High));
        assert_eq!(Priority::try_from(3), Ok(Priority::Low));
        assert!(Priority::try_from(0).is_err());
        assert!(Priority::try_from(4).is_err());
    }

    #[test]
    fn priority_round_trips_through_json_as_number() {
        let json = serde_json::to_string(&Priority::Medium).unwrap();
        assert_eq!(json, "2");
        let back: Priority = serde_json::from_str("3").unwrap();
        assert_eq!(back, Priority::Low);
        assert!(serde_json::from_str::<Priority>("7").is_err());
    }

    #[test]
    fn policy_from_str_accepts_aliases() {
        assert_eq!("RR".parse::<Policy>(), Ok(Policy::RoundRobin));
        assert_eq!("sjf".parse::<Policy>(), Ok(Policy::ShortestJobFirst));
        assert_eq!("prio".parse::<Policy>(), Ok(Policy::Priority));
        assert!("fifo".parse::<Policy>().is_err());
    }

    #[test]
    fn server_model_tracks_load() {
        let mut server = ServerModel::new(1, 2);
        assert!(server.has_free_slot());

        server.enqueue(Task::new(1, "text", Priority::Low, 1.0, 0.0));
        server.enqueue(Task::new(2, "text", Priority::Low, 1.0, 0.0));
        assert_eq!(server.current_load, 2);
        assert!(!server.has_free_slot());
        assert_eq!(server.adjusted_load(), 1.0);
        assert_eq!(server.queue[0].assigned_server, Some(1));

        let taken = server.take_queued(1).unwrap();
        assert_eq!(taken.id, 1);
        assert_eq!(server.current_load, 1);
        assert!(server.take_queued(1).is_none());

        let released = server.release_queue();
        assert_eq!(released.len(), 1);
        assert_eq!(server.current_load, 1);
        assert_eq!(server.in_flight(), 1);

        server.complete_one();
        assert_eq!(server.current_load, 0);
    }

    #[test]
    fn offline_server_has_no_free_slot() {
        let mut server = ServerModel::new(1, 4);
        server.online = false;
        assert!(!server.has_free_slot());
    }

    #[test]
    fn task_timings() {
        let mut task = Task::new(7, "image", Priority::High, 2.0, 1.0);
        assert_eq!(task.turnaround(), None);
        task.start_time = Some(1.5);
        task.completion_time = Some(3.5);
        assert_eq!(task.wait(), Some(0.5));
        assert_eq!(task.turnaround(), Some(2.5));
        assert!(task.has_started());
    }
}
