//! Simulation clock.
//!
//! Maps tokio's monotonic clock onto simulation seconds. Built on
//! `tokio::time::Instant` so paused-time tests advance it deterministically.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    origin: Instant,
    /// Wall seconds per simulated second.
    time_scale: f64,
}

impl SimClock {
    /// Start a clock at t=0 now.
    pub fn start(time_scale: f64) -> Self {
        Self {
            origin: Instant::now(),
            time_scale,
        }
    }

    /// Simulation seconds elapsed since start.
    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() / self.time_scale
    }

    /// Wall duration corresponding to `sim_secs` of simulated time.
    /// Saturates at `Duration::MAX`.
    pub fn wall(&self, sim_secs: f64) -> Duration {
        Duration::try_from_secs_f64((sim_secs * self.time_scale).max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Wall-clock instant at which the simulation reaches `sim_secs`.
    /// Saturates at `far_future()`.
    pub fn instant_at(&self, sim_secs: f64) -> Instant {
        self.origin
            .checked_add(self.wall(sim_secs))
            .unwrap_or_else(far_future)
    }
}

/// An instant roughly 30 years ahead, used where a deadline would overflow.
pub fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn scaled_time_advances() {
        let clock = SimClock::start(0.5);
        assert_eq!(clock.now(), 0.0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!((clock.now() - 2.0).abs() < 1e-6, "now was {}", clock.now());
    }

    #[test]
    fn wall_conversion() {
        let clock = SimClock::start(0.1);
        assert_eq!(clock.wall(10.0), Duration::from_secs(1));
        assert_eq!(clock.wall(-1.0), Duration::ZERO);
    }

    #[test]
    fn huge_times_saturate() {
        let clock = SimClock::start(1.0);
        assert_eq!(clock.wall(1e300), Duration::MAX);
        assert_eq!(clock.wall(f64::INFINITY), Duration::MAX);
        assert_eq!(clock.wall(f64::NAN), Duration::ZERO);

        let late = clock.instant_at(1e19);
        assert!(late > clock.instant_at(1e6));
        assert!(late > Instant::now());
    }
}
