//! Synthetic stress-test workload generation.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::config::{RequestSpec, ServerSpec, SimConfig, SimulationSettings};
use crate::types::{Priority, ServerId, TaskId};

const KINDS: &[&str] = &["text", "image", "audio", "embedding", "video"];
const PRIORITIES: &[Priority] = &[Priority::High, Priority::Medium, Priority::Low];

/// Shape of a generated workload.
#[derive(Debug, Clone)]
pub struct WorkloadShape {
    pub servers: u32,
    pub requests: u32,
    pub max_capacity: u32,
    pub min_exec_time: f64,
    pub max_exec_time: f64,
    pub seed: u64,
}

impl Default for WorkloadShape {
    fn default() -> Self {
        Self {
            servers: 3,
            requests: 20,
            max_capacity: 4,
            min_exec_time: 0.5,
            max_exec_time: 10.0,
            seed: 42,
        }
    }
}

/// Build a random but reproducible config for `shape`.
///
/// Arrival times are left implicit so the simulation settings decide
/// the spacing.
pub fn generate(shape: &WorkloadShape) -> SimConfig {
    let mut rng = StdRng::seed_from_u64(shape.seed);

    let server_config = (1..=shape.servers as ServerId)
        .map(|id| ServerSpec {
            id,
            capacity: rng.random_range(1..=shape.max_capacity.max(1)),
            fail_after: None,
        })
        .collect();

    let request_data = (1..=u64::from(shape.requests))
        .map(|id: TaskId| {
            let exec_time = rng.random_range(shape.min_exec_time..=shape.max_exec_time);
            RequestSpec {
                id,
                kind: KINDS.choose(&mut rng).copied().unwrap_or("text").to_string(),
                priority: PRIORITIES.choose(&mut rng).copied().unwrap_or(Priority::Medium),
                // One decimal, like hand-written inputs.
                exec_time: (exec_time * 10.0).round().max(1.0) / 10.0,
                arrival_time: None,
            }
        })
        .collect();

    SimConfig {
        server_config,
        request_data,
        simulation: SimulationSettings {
            seed: shape.seed,
            ..SimulationSettings::default()
        },
    }
}
