//! Scheduling policies — the ordering the pending pool hands tasks out in.
//!
//! All three policies are non-preemptive: they only decide which pending
//! task is dispatched next. Once a task reaches a worker it runs to
//! completion.

use std::cmp::Ordering;

use infergrid_core::{Policy, Task};

/// A total order over pending tasks. `Less` means "dispatch first".
pub trait DispatchOrder {
    fn compare(&self, a: &Task, b: &Task) -> Ordering;
}

impl DispatchOrder for Policy {
    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let by_arrival = || {
            a.arrival_time
                .total_cmp(&b.arrival_time)
                .then(a.id.cmp(&b.id))
        };
        match self {
            // Strict FIFO.
            Policy::RoundRobin => by_arrival(),
            Policy::ShortestJobFirst => a.exec_time.total_cmp(&b.exec_time).then_with(by_arrival),
            Policy::Priority => a.priority.cmp(&b.priority).then_with(by_arrival),
        }
    }
}
