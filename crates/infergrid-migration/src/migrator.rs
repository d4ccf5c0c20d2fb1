//! Migration manager — overload detection and queued-task relocation.
//!
//! Operates directly on the orchestrator's `ServerModel`s and reports
//! what it did. Emitting events and counting migrations is the caller's
//! job.

use std::sync::Arc;

use tracing::debug;

use infergrid_core::{Priority, ServerId, ServerModel, TaskId};
use infergrid_scheduler::LoadBalancer;

/// A server is overloaded above this multiple of the cluster mean load.
pub const OVERLOAD_FACTOR: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub task_id: TaskId,
    pub from: ServerId,
    pub to: ServerId,
}

/// Result of evaluating one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    Moved(Migration),
    /// No destination qualified; the task stays where it is.
    Skipped { task_id: TaskId, from: ServerId },
}

pub struct MigrationManager {
    balancer: Arc<dyn LoadBalancer>,
    factor: f64,
}

impl MigrationManager {
    pub fn new(balancer: Arc<dyn LoadBalancer>) -> Self {
        Self {
            balancer,
            factor: OVERLOAD_FACTOR,
        }
    }

    /// Mean `current_load` across online servers. Zero if none are online.
    pub fn cluster_mean(servers: &[ServerModel]) -> f64 {
        let online: Vec<&ServerModel> = servers.iter().filter(|s| s.online).collect();
        if online.is_empty() {
            return 0.0;
        }
        let total: u32 = online.iter().map(|s| s.current_load).sum();
        f64::from(total) / online.len() as f64
    }

    pub fn threshold(&self, mean: f64) -> f64 {
        self.factor * mean
    }

    pub fn is_overloaded(&self, server: &ServerModel, mean: f64) -> bool {
        server.online && f64::from(server.current_load) > self.threshold(mean)
    }

    /// Ids of online servers currently above the overload threshold.
    pub fn overloaded(&self, servers: &[ServerModel]) -> Vec<ServerId> {
        let mean = Self::cluster_mean(servers);
        servers
            .iter()
            .filter(|s| self.is_overloaded(s, mean))
            .map(|s| s.id)
            .collect()
    }

    /// One migration pass over all servers.
    pub fn rebalance(&self, servers: &mut [ServerModel]) -> Vec<MigrationOutcome> {
        let mean = Self::cluster_mean(servers);
        let threshold = self.threshold(mean);
        let mut outcomes = Vec::new();

        for source_id in self.overloaded(servers) {
            let Some(src) = index_of(servers, source_id) else {
                continue;
            };

            debug!(
                server_id = source_id,
                load = servers[src].current_load,
                mean,
                "server overloaded"
            );

            for task_id in candidates(&servers[src]) {
                if !self.is_overloaded(&servers[src], mean) {
                    break;
                }

                let Some(task) = servers[src].queue.iter().find(|t| t.id == task_id) else {
                    continue;
                };

                let dest = self
                    .balancer
                    .choose_server_excluding(task, servers, Some(source_id))
                    .and_then(|id| index_of(servers, id))
                    .filter(|&d| f64::from(servers[d].current_load + 1) <= threshold);

                let Some(dst) = dest else {
                    // The balancer's choice does not depend on the task, so
                    // the remaining candidates would be refused too.
                    outcomes.push(MigrationOutcome::Skipped {
                        task_id,
                        from: source_id,
                    });
                    break;
                };

                if let Some(mut task) = servers[src].take_queued(task_id) {
                    task.migration_count += 1;
                    let to = servers[dst].id;
                    servers[dst].enqueue(task);
                    outcomes.push(MigrationOutcome::Moved(Migration {
                        task_id,
                        from: source_id,
                        to,
                    }));
                }
            }
        }

        outcomes
    }
}

fn index_of(servers: &[ServerModel], id: ServerId) -> Option<usize> {
    servers.iter().position(|s| s.id == id)
}

/// Queued, not-started tasks in migration order: lowest priority first,
/// then oldest arrival, then id.
fn candidates(server: &ServerModel) -> Vec<TaskId> {
    let mut queued: Vec<(Priority, f64, TaskId)> = server
        .queue
        .iter()
        .filter(|t| !t.has_started())
        .map(|t| (t.priority, t.arrival_time, t.id))
        .collect();
    queued.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then(a.1.total_cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });
    queued.into_iter().map(|(_, _, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use infergrid_core::Task;
    use infergrid_scheduler::LeastAdjustedLoad;

    fn manager() -> MigrationManager {
        MigrationManager::new(Arc::new(LeastAdjustedLoad))
    }

    fn task(id: TaskId, priority: Priority, arrival: f64) -> Task {
        Task::new(id, "text", priority, 1.0, arrival)
    }

    /// Server 1 (capacity 10) holds six queued tasks, servers 2 and 3
    /// (capacity 1) are empty. Mean = 2, threshold = 4.
    fn skewed_cluster() -> Vec<ServerModel> {
        let mut big = ServerModel::new(1, 10);
        big.enqueue(task(1, Priority::High, 0.0));
        big.enqueue(task(2, Priority::Low, 0.3));
        big.enqueue(task(3, Priority::Medium, 0.0));
        big.enqueue(task(4, Priority::Low, 0.1));
        big.enqueue(task(5, Priority::High, 0.2));
        big.enqueue(task(6, Priority::Medium, 0.4));
        vec![big, ServerModel::new(2, 1), ServerModel::new(3, 1)]
    }

    #[test]
    fn cluster_mean_ignores_offline_servers() {
        let mut servers = skewed_cluster();
        assert_eq!(MigrationManager::cluster_mean(&servers), 2.0);
        servers[2].online = false;
        assert_eq!(MigrationManager::cluster_mean(&servers), 3.0);
        assert_eq!(MigrationManager::cluster_mean(&[]), 0.0);
    }

    #[test]
    fn detects_overload_at_twice_the_mean() {
        let servers = skewed_cluster();
        assert_eq!(manager().overloaded(&servers), vec![1]);

        // Exactly 2x the mean is not overloaded.
        let mut even = vec![
            ServerModel::new(1, 4),
            ServerModel::new(2, 4),
            ServerModel::new(3, 4),
        ];
        even[0].current_load = 2;
        even[1].current_load = 1;
        assert!(manager().overloaded(&even).is_empty());
        even[0].current_load = 3;
        assert_eq!(manager().overloaded(&even), vec![1]);
    }

    #[test]
    fn moves_low_priority_oldest_first_until_not_overloaded() {
        let mut servers = skewed_cluster();
        let outcomes = manager().rebalance(&mut servers);

        assert_eq!(
            outcomes,
            vec![
                MigrationOutcome::Moved(Migration { task_id: 4, from: 1, to: 2 }),
                MigrationOutcome::Moved(Migration { task_id: 2, from: 1, to: 3 }),
            ]
        );
        assert_eq!(servers[0].current_load, 4);
        assert_eq!(servers[1].current_load, 1);
        assert_eq!(servers[2].current_load, 1);

        let moved = &servers[1].queue[0];
        assert_eq!(moved.id, 4);
        assert_eq!(moved.migration_count, 1);
        assert_eq!(moved.assigned_server, Some(2));

        // Load is conserved.
        let total: u32 = servers.iter().map(|s| s.current_load).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn skips_when_no_destination_has_a_slot() {
        let mut servers = skewed_cluster();
        servers[1].current_load = 1;
        servers[2].current_load = 1;
        // Mean = 8/3, threshold ≈ 5.33, source at 6.
        let outcomes = manager().rebalance(&mut servers);
        assert_eq!(outcomes, vec![MigrationOutcome::Skipped { task_id: 4, from: 1 }]);
        assert_eq!(servers[0].current_load, 6);
        assert!(servers[0].queue.iter().all(|t| t.migration_count == 0));
    }

    #[test]
    fn refuses_destination_that_would_become_overloaded() {
        // Source holds 10, server 2 holds 6 with plenty of slots, four
        // small servers are full. Mean = 20/6, threshold ≈ 6.67: the
        // balancer picks server 2, but 7 would put it over.
        let mut src = ServerModel::new(1, 100);
        for id in 1..=10 {
            src.enqueue(task(id, Priority::Low, id as f64));
        }
        let mut dst = ServerModel::new(2, 100);
        dst.current_load = 6;
        let mut servers = vec![src, dst];
        for id in 3..=6 {
            let mut small = ServerModel::new(id, 1);
            small.current_load = 1;
            servers.push(small);
        }

        let outcomes = manager().rebalance(&mut servers);
        assert_eq!(outcomes, vec![MigrationOutcome::Skipped { task_id: 1, from: 1 }]);
        assert_eq!(servers[0].current_load, 10);
        assert_eq!(servers[1].current_load, 6);
    }

    #[test]
    fn started_tasks_are_never_migrated() {
        let mut servers = skewed_cluster();
        for t in servers[0].queue.iter_mut() {
            t.start_time = Some(0.5);
        }
        let outcomes = manager().rebalance(&mut servers);
        assert!(outcomes.is_empty());
        assert_eq!(servers[0].queue.len(), 6);
    }

    #[test]
    fn balanced_cluster_is_left_alone() {
        let mut servers = vec![ServerModel::new(1, 2), ServerModel::new(2, 2)];
        servers[0].enqueue(task(1, Priority::Low, 0.0));
        servers[1].enqueue(task(2, Priority::Low, 0.0));
        assert!(manager().rebalance(&mut servers).is_empty());

        let mut idle = vec![ServerModel::new(1, 2)];
        assert!(manager().rebalance(&mut idle).is_empty());
    }
}
