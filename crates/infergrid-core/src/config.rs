//! Simulation input parser.
//!
//! Accepts the `input.json` layout (`server_config` / `request_data`) or
//! the same structure written as TOML, plus an optional `simulation`
//! section with run settings.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Priority, ServerId, Task, TaskId};

/// Upper bound on any simulated time or duration in a config, in seconds.
pub const MAX_SIM_SECONDS: f64 = 1.0e6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub server_config: Vec<ServerSpec>,
    pub request_data: Vec<RequestSpec>,
    #[serde(default)]
    pub simulation: SimulationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub id: ServerId,
    /// Concurrent execution slots.
    pub capacity: u32,
    /// Worker stops abruptly after completing this many tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_after: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub id: TaskId,
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    pub priority: Priority,
    pub exec_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Upper bound on how long one orchestrator tick waits for completions.
    pub tick_interval_ms: u64,
    /// Wall seconds per simulated second.
    pub time_scale: f64,
    /// Relative spread applied to execution times, in `[0, 1)`.
    pub jitter: f64,
    pub seed: u64,
    pub arrival: ArrivalPattern,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            time_scale: 1.0,
            jitter: 0.0,
            seed: 42,
            arrival: ArrivalPattern::default(),
        }
    }
}

impl SimulationSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.tick_interval_ms == 0 || self.tick_interval_ms as f64 > MAX_SIM_SECONDS * 1000.0 {
            return Err(invalid(
                "tick_interval_ms",
                format!("must be in 1..={}", MAX_SIM_SECONDS * 1000.0),
            ));
        }
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(invalid("time_scale", format!("must be positive, got {}", self.time_scale)));
        }
        if !(self.jitter.is_finite() && (0.0..1.0).contains(&self.jitter)) {
            return Err(invalid("jitter", format!("must be in [0, 1), got {}", self.jitter)));
        }
        if let ArrivalPattern::Uniform { min_gap, max_gap } = self.arrival {
            if !(0.0..=MAX_SIM_SECONDS).contains(&min_gap)
                || !(0.0..=MAX_SIM_SECONDS).contains(&max_gap)
                || min_gap > max_gap
            {
                return Err(invalid(
                    "arrival",
                    format!("uniform gaps need 0 <= min_gap <= max_gap, got {min_gap}..{max_gap}"),
                ));
            }
        }
        Ok(())
    }
}

/// How implicit arrival times are spaced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ArrivalPattern {
    /// Every implicit request arrives together with the previous one.
    Simultaneous,
    /// Gap to the previous request drawn uniformly from `[min_gap, max_gap]`.
    Uniform { min_gap: f64, max_gap: f64 },
}

impl Default for ArrivalPattern {
    fn default() -> Self {
        ArrivalPattern::Uniform {
            min_gap: 0.1,
            max_gap: 1.5,
        }
    }
}

impl ArrivalPattern {
    fn next_gap(&self, rng: &mut StdRng) -> f64 {
        match *self {
            ArrivalPattern::Simultaneous => 0.0,
            ArrivalPattern::Uniform { min_gap, max_gap } if min_gap == max_gap => min_gap,
            ArrivalPattern::Uniform { min_gap, max_gap } => rng.random_range(min_gap..=max_gap),
        }
    }
}

impl SimConfig {
    /// Load and validate a config file. `.toml` files are parsed as TOML,
    /// everything else as JSON.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every structural rule. Runs before any worker is spawned.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server_config.is_empty() {
            return Err(ConfigError::NoServers);
        }
        if self.request_data.is_empty() {
            return Err(ConfigError::NoRequests);
        }

        let mut server_ids = HashSet::new();
        for server in &self.server_config {
            if !server_ids.insert(server.id) {
                return Err(ConfigError::DuplicateServer(server.id));
            }
            if server.capacity == 0 {
                return Err(ConfigError::ZeroCapacity(server.id));
            }
        }

        let mut request_ids = HashSet::new();
        for req in &self.request_data {
            if !request_ids.insert(req.id) {
                return Err(ConfigError::DuplicateRequest(req.id));
            }
            if !(req.exec_time > 0.0 && req.exec_time <= MAX_SIM_SECONDS) {
                return Err(ConfigError::InvalidExecTime {
                    id: req.id,
                    value: req.exec_time,
                });
            }
            if let Some(at) = req.arrival_time {
                if !(0.0..=MAX_SIM_SECONDS).contains(&at) {
                    return Err(ConfigError::InvalidArrivalTime { id: req.id, value: at });
                }
            }
        }

        self.simulation.validate()
    }

    /// Turn request descriptors into tasks with concrete arrival times,
    /// ordered by `(arrival_time, id)`.
    ///
    /// The first implicit arrival is at t=0; later ones follow the previous
    /// request by a gap from the arrival pattern. Explicit times are kept
    /// and move the cursor.
    pub fn resolve_arrivals(&self) -> Vec<Task> {
        let mut rng = StdRng::seed_from_u64(self.simulation.seed);
        let mut cursor: Option<f64> = None;
        let mut tasks = Vec::with_capacity(self.request_data.len());

        for spec in &self.request_data {
            let at = match (spec.arrival_time, cursor) {
                (Some(explicit), _) => explicit,
                (None, None) => 0.0,
                (None, Some(prev)) => prev + self.simulation.arrival.next_gap(&mut rng),
            };
            cursor = Some(at);
            tasks.push(Task::from_request(spec, at));
        }

        tasks.sort_by(|a, b| {
            a.arrival_time
                .total_cmp(&b.arrival_time)
                .then(a.id.cmp(&b.id))
        });
        tasks
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidSetting {
        field,
        reason: reason.into(),
    }
}
