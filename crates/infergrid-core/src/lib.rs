//! infergrid-core — shared types for the InferGrid load simulator.
//!
//! Everything the other crates exchange lives here: the `Task` record,
//! the orchestrator-owned `ServerModel`, the input configuration and its
//! validation, the simulation clock, and the event log types.

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod types;
pub mod workload;

pub use clock::{SimClock, far_future};
pub use config::{ArrivalPattern, MAX_SIM_SECONDS, RequestSpec, ServerSpec, SimConfig, SimulationSettings};
pub use error::{ConfigError, ConfigResult};
pub use event::{SimEvent, TimedEvent};
pub use types::*;
