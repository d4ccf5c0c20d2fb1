//! Metrics collector — additive accumulators over the task lifecycle.
//!
//! Owned by the orchestrator's single thread of control, so plain fields
//! are enough. Only completed task ids are remembered, to reject double
//! counting; everything else is folded into sums and maxima.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use infergrid_core::{Policy, ServerId, ServerModel, Task, TaskId};

#[derive(Debug, Clone, Copy)]
struct ServerAccount {
    capacity: u32,
    /// Σ realized duration / capacity.
    busy_time: f64,
    completed: u64,
}

/// Final summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub policy: Policy,
    pub request_count: u64,
    pub completed_count: u64,
    /// Tasks lost with a crashed worker. Excluded from every average.
    pub lost_count: u64,
    /// Tasks still pending when the run ended.
    pub undispatched_count: u64,
    pub total_simulation_time: f64,
    pub avg_response_time: f64,
    /// Fraction in `[0, 1]`.
    pub avg_cpu_utilization: f64,
    pub max_wait: f64,
    /// Completed tasks per simulated second.
    pub throughput: f64,
    pub migrations: u64,
    pub servers: Vec<ServerUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerUsage {
    pub server_id: ServerId,
    pub capacity: u32,
    pub completed: u64,
    pub busy_time: f64,
    pub utilization: f64,
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    servers: BTreeMap<ServerId, ServerAccount>,
    arrived: u64,
    started: u64,
    completed: HashSet<TaskId>,
    lost: HashSet<TaskId>,
    total_response_time: f64,
    max_wait: f64,
    migrations: u64,
}

impl MetricsCollector {
    pub fn new(servers: &[ServerModel]) -> Self {
        Self {
            servers: servers
                .iter()
                .map(|s| {
                    (
                        s.id,
                        ServerAccount {
                            capacity: s.capacity,
                            busy_time: 0.0,
                            completed: 0,
                        },
                    )
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn record_arrival(&mut self, task: &Task) {
        self.arrived += 1;
        debug!(task_id = task.id, arrival = task.arrival_time, "arrival recorded");
    }

    pub fn record_start(&mut self, task: &Task) {
        self.started += 1;
        debug!(task_id = task.id, start = ?task.start_time, "start recorded");
    }

    /// Fold a completed task in. Returns `false` (and changes nothing) for
    /// a task already counted or lost, or one missing its timestamps.
    pub fn record_completion(&mut self, task: &Task) -> bool {
        if self.lost.contains(&task.id) || self.completed.contains(&task.id) {
            warn!(task_id = task.id, "completion already accounted for, ignoring");
            return false;
        }
        let (Some(start), Some(end)) = (task.start_time, task.completion_time) else {
            warn!(task_id = task.id, "completion without timestamps, ignoring");
            return false;
        };

        self.completed.insert(task.id);
        self.total_response_time += end - task.arrival_time;
        self.max_wait = self.max_wait.max(start - task.arrival_time);

        if let Some(account) = task.assigned_server.and_then(|id| self.servers.get_mut(&id)) {
            account.busy_time += (end - start) / f64::from(account.capacity);
            account.completed += 1;
        }
        true
    }

    pub fn record_migration(&mut self) {
        self.migrations += 1;
    }

    pub fn record_lost(&mut self, task_id: TaskId) {
        if !self.completed.contains(&task_id) {
            self.lost.insert(task_id);
        }
    }

    pub fn completed_count(&self) -> u64 {
        self.completed.len() as u64
    }

    pub fn lost_count(&self) -> u64 {
        self.lost.len() as u64
    }

    pub fn started_count(&self) -> u64 {
        self.started
    }

    /// Compute the final report.
    pub fn summarize(&self, policy: Policy, total_simulation_time: f64, undispatched: u64) -> Report {
        let completed = self.completed_count();
        let avg_response_time = if completed > 0 {
            self.total_response_time / completed as f64
        } else {
            0.0
        };
        let throughput = ratio(completed as f64, total_simulation_time);

        let servers: Vec<ServerUsage> = self
            .servers
            .iter()
            .map(|(&server_id, account)| ServerUsage {
                server_id,
                capacity: account.capacity,
                completed: account.completed,
                busy_time: account.busy_time,
                utilization: ratio(account.busy_time, total_simulation_time).min(1.0),
            })
            .collect();

        let total_busy: f64 = servers.iter().map(|s| s.busy_time).sum();
        let avg_cpu_utilization =
            ratio(total_busy, servers.len() as f64 * total_simulation_time).min(1.0);

        Report {
            policy,
            request_count: self.arrived,
            completed_count: completed,
            lost_count: self.lost_count(),
            undispatched_count: undispatched,
            total_simulation_time,
            avg_response_time,
            avg_cpu_utilization,
            max_wait: self.max_wait,
            throughput,
            migrations: self.migrations,
            servers,
        }
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infergrid_core::Priority;

    fn servers() -> Vec<ServerModel> {
        vec![ServerModel::new(1, 2), ServerModel::new(2, 1)]
    }

    fn finished(id: TaskId, server: ServerId, arrival: f64, start: f64, end: f64) -> Task {
        let mut t = Task::new(id, "text", Priority::Medium, end - start, arrival);
        t.assigned_server = Some(server);
        t.start_time = Some(start);
        t.completion_time = Some(end);
        t
    }

    #[test]
    fn summary_of_two_completions() {
        let mut m = MetricsCollector::new(&servers());
        let a = finished(1, 1, 0.0, 1.0, 5.0);
        let b = finished(2, 2, 1.0, 1.0, 3.0);
        m.record_arrival(&a);
        m.record_arrival(&b);
        m.record_start(&a);
        m.record_start(&b);
        assert!(m.record_completion(&b));
        assert!(m.record_completion(&a));

        let r = m.summarize(Policy::ShortestJobFirst, 10.0, 0);
        assert_eq!(r.request_count, 2);
        assert_eq!(r.completed_count, 2);
        // (5 - 0 + 3 - 1) / 2
        assert_eq!(r.avg_response_time, 3.5);
        assert_eq!(r.max_wait, 1.0);
        assert_eq!(r.throughput, 0.2);
        // Server 1: 4s over 2 slots = 2. Server 2: 2s over 1 slot = 2.
        assert_eq!(r.servers[0].busy_time, 2.0);
        assert_eq!(r.servers[1].busy_time, 2.0);
        assert_eq!(r.avg_cpu_utilization, 4.0 / 20.0);
        assert_eq!(r.migrations, 0);
        assert_eq!(m.started_count(), 2);
    }

    #[test]
    fn completions_are_counted_once() {
        let mut m = MetricsCollector::new(&servers());
        let a = finished(1, 1, 0.0, 0.0, 2.0);
        assert!(m.record_completion(&a));
        assert!(!m.record_completion(&a));
        assert_eq!(m.completed_count(), 1);
        assert_eq!(m.summarize(Policy::RoundRobin, 2.0, 0).avg_response_time, 2.0);
    }

    #[test]
    fn incomplete_task_is_rejected() {
        let mut m = MetricsCollector::new(&servers());
        let t = Task::new(1, "text", Priority::Low, 1.0, 0.0);
        assert!(!m.record_completion(&t));
        assert_eq!(m.completed_count(), 0);
    }

    #[test]
    fn lost_tasks_are_excluded() {
        let mut m = MetricsCollector::new(&servers());
        m.record_lost(7);
        let late = finished(7, 1, 0.0, 0.0, 100.0);
        assert!(!m.record_completion(&late));

        let ok = finished(8, 2, 0.0, 0.0, 1.0);
        assert!(m.record_completion(&ok));
        m.record_lost(8);

        let r = m.summarize(Policy::Priority, 10.0, 3);
        assert_eq!(r.lost_count, 1);
        assert_eq!(r.completed_count, 1);
        assert_eq!(r.avg_response_time, 1.0);
        assert_eq!(r.undispatched_count, 3);
    }

    #[test]
    fn migrations_and_empty_run() {
        let mut m = MetricsCollector::new(&servers());
        m.record_migration();
        m.record_migration();
        let r = m.summarize(Policy::RoundRobin, 0.0, 0);
        assert_eq!(r.migrations, 2);
        assert_eq!(r.throughput, 0.0);
        assert_eq!(r.avg_response_time, 0.0);
        assert_eq!(r.avg_cpu_utilization, 0.0);
    }

    #[test]
    fn report_serializes() {
        let m = MetricsCollector::new(&servers());
        let r = m.summarize(Policy::RoundRobin, 1.0, 0);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["policy"], "round_robin");
        assert_eq!(json["servers"].as_array().unwrap().len(), 2);
    }
}
