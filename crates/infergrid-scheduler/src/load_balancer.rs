//! Least-adjusted-load balancer.
//!
//! Picks the online server with a free slot whose `current_load / capacity`
//! is lowest, lowest id on ties. Greedy and per-task: it does not look
//! ahead at the rest of the pending pool, so the overall assignment is an
//! approximation, not an optimum.

use infergrid_core::{ServerId, ServerModel, Task};

/// Chooses which server receives a dispatched task.
pub trait LoadBalancer: Send + Sync {
    /// Pick a server for `task`, never `exclude`. `None` when no server
    /// has a free slot.
    fn choose_server_excluding(
        &self,
        task: &Task,
        servers: &[ServerModel],
        exclude: Option<ServerId>,
    ) -> Option<ServerId>;

    fn choose_server(&self, task: &Task, servers: &[ServerModel]) -> Option<ServerId> {
        self.choose_server_excluding(task, servers, None)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LeastAdjustedLoad;

impl LoadBalancer for LeastAdjustedLoad {
    fn choose_server_excluding(
        &self,
        _task: &Task,
        servers: &[ServerModel],
        exclude: Option<ServerId>,
    ) -> Option<ServerId> {
        servers
            .iter()
            .filter(|s| s.has_free_slot() && Some(s.id) != exclude)
            .min_by(|a, b| {
                a.adjusted_load()
                    .total_cmp(&b.adjusted_load())
                    .then(a.id.cmp(&b.id))
            })
            .map(|s| s.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infergrid_core::Priority;

    fn servers(caps: &[(ServerId, u32, u32)]) -> Vec<ServerModel> {
        caps.iter()
            .map(|&(id, capacity, load)| {
                let mut s = ServerModel::new(id, capacity);
                s.current_load = load;
                s
            })
            .collect()
    }

    fn any_task() -> Task {
        Task::new(1, "text", Priority::Medium, 1.0, 0.0)
    }

    #[test]
    fn empty_cluster_breaks_tie_by_lowest_id() {
        let lb = LeastAdjustedLoad;
        let s = servers(&[(2, 1, 0), (1, 3, 0), (3, 2, 0)]);
        assert_eq!(lb.choose_server(&any_task(), &s), Some(1));
    }

    #[test]
    fn prefers_lowest_adjusted_load() {
        let lb = LeastAdjustedLoad;
        // 1/4 = 0.25 beats 1/2 = 0.5 even though raw load ties.
        let s = servers(&[(1, 2, 1), (2, 4, 1)]);
        assert_eq!(lb.choose_server(&any_task(), &s), Some(2));
    }

    #[test]
    fn never_picks_a_full_server() {
        let lb = LeastAdjustedLoad;
        let s = servers(&[(1, 1, 1), (2, 10, 9)]);
        assert_eq!(lb.choose_server(&any_task(), &s), Some(2));

        let full = servers(&[(1, 1, 1), (2, 2, 2)]);
        assert_eq!(lb.choose_server(&any_task(), &full), None);
    }

    #[test]
    fn skips_offline_and_excluded_servers() {
        let lb = LeastAdjustedLoad;
        let mut s = servers(&[(1, 2, 0), (2, 2, 1), (3, 2, 1)]);
        s[0].online = false;
        assert_eq!(lb.choose_server(&any_task(), &s), Some(2));
        assert_eq!(lb.choose_server_excluding(&any_task(), &s, Some(2)), Some(3));
        assert_eq!(lb.choose_server(&any_task(), &[]), None);
    }
}
