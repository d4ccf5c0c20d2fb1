//! Execution-time models.
//!
//! Turn a task's nominal `exec_time` into the duration the worker actually
//! sleeps for, in simulation seconds.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use infergrid_core::Task;

pub trait DurationModel: Send {
    fn realize(&mut self, task: &Task) -> f64;
}

/// Runs every task for exactly its nominal time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nominal;

impl DurationModel for Nominal {
    fn realize(&mut self, task: &Task) -> f64 {
        task.exec_time
    }
}

/// Scales nominal time by a factor drawn uniformly from
/// `[1 - spread, 1 + spread]`.
#[derive(Debug)]
pub struct Jittered {
    spread: f64,
    rng: StdRng,
}

impl Jittered {
    /// `spread` is clamped to `[0, 0.99]` so durations stay positive.
    pub fn new(spread: f64, seed: u64) -> Self {
        Self {
            spread: spread.clamp(0.0, 0.99),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DurationModel for Jittered {
    fn realize(&mut self, task: &Task) -> f64 {
        if self.spread == 0.0 {
            return task.exec_time;
        }
        let factor = self.rng.random_range(1.0 - self.spread..=1.0 + self.spread);
        task.exec_time * factor
    }
}

/// Any `FnMut(&Task) -> f64` works as a model, mainly for tests.
impl<F> DurationModel for F
where
    F: FnMut(&Task) -> f64 + Send,
{
    fn realize(&mut self, task: &Task) -> f64 {
        self(task)
    }
}
