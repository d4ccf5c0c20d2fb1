//! Pending pool — arrived tasks waiting for a server.
//!
//! The container shape follows the active policy: a FIFO deque for Round
//! Robin, a min-heap keyed by the policy's order for SJF and Priority.
//! Callers only see `insert` / `peek` / `select_next`.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use infergrid_core::{Policy, Task};

use crate::policy::DispatchOrder;

/// Heap entry whose `Ord` is the reverse of the policy order, so the
/// max-heap yields the task the policy wants first.
#[derive(Debug)]
struct Ranked {
    policy: Policy,
    task: Task,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.policy.compare(&other.task, &self.task)
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

#[derive(Debug)]
enum Store {
    Fifo(VecDeque<Task>),
    Heap(BinaryHeap<Ranked>),
}

#[derive(Debug)]
pub struct PendingPool {
    policy: Policy,
    store: Store,
}

impl PendingPool {
    pub fn new(policy: Policy) -> Self {
        let store = match policy {
            Policy::RoundRobin => Store::Fifo(VecDeque::new()),
            Policy::ShortestJobFirst | Policy::Priority => Store::Heap(BinaryHeap::new()),
        };
        Self { policy, store }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn insert(&mut self, task: Task) {
        match &mut self.store {
            Store::Fifo(queue) => {
                // Arrivals are admitted in order, so this is almost always a push_back.
                let policy = self.policy;
                let pos = queue.partition_point(|t| policy.compare(t, &task).is_le());
                queue.insert(pos, task);
            }
            Store::Heap(heap) => heap.push(Ranked {
                policy: self.policy,
                task,
            }),
        }
    }

    /// The task `select_next` would return, without removing it.
    pub fn peek(&self) -> Option<&Task> {
        match &self.store {
            Store::Fifo(queue) => queue.front(),
            Store::Heap(heap) => heap.peek().map(|r| &r.task),
        }
    }

    /// Remove and return the next task in policy order.
    pub fn select_next(&mut self) -> Option<Task> {
        match &mut self.store {
            Store::Fifo(queue) => queue.pop_front(),
            Store::Heap(heap) => heap.pop().map(|r| r.task),
        }
    }

    /// Up to `n` tasks in the order they would be dispatched.
    pub fn peek_candidates(&self, n: usize) -> Vec<&Task> {
        match &self.store {
            Store::Fifo(queue) => queue.iter().take(n).collect(),
            Store::Heap(heap) => {
                let mut tasks: Vec<&Task> = heap.iter().map(|r| &r.task).collect();
                tasks.sort_by(|a, b| self.policy.compare(a, b));
                tasks.truncate(n);
                tasks
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.store {
            Store::Fifo(queue) => queue.len(),
            Store::Heap(heap) => heap.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty the pool, in policy order.
    pub fn drain(&mut self) -> Vec<Task> {
        let mut out = Vec::with_capacity(self.len());
        while let Some(task) = self.select_next() {
            out.push(task);
        }
        out
    }
}
