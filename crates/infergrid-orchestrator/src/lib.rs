//! infergrid-orchestrator — the tick loop of the InferGrid simulator.
//!
//! Owns server load, the pending pool, migration and metrics. Workers are
//! reached only through their message queues.
//!
//! # Architecture
//!
//! ```text
//! SimConfig ──▶ Orchestrator::new(config, policy)
//!                 │
//!                 └── run()
//!                       ├── admit arrivals ──▶ PendingPool
//!                       ├── dispatch ──▶ LoadBalancer ──▶ server queue
//!                       ├── MigrationManager::rebalance()
//!                       ├── release ──▶ WorkerHandle::execute()
//!                       └── WorkerEvent ──▶ MetricsCollector + EventLog
//!                                               │
//!                                               ▼
//!                                      SimulationOutcome { report, events }
//! ```

pub mod error;
pub mod events;
pub mod orchestrator;

pub use error::{OrchestratorError, OrchestratorResult};
pub use events::EventLog;
pub use orchestrator::{DurationFactory, Orchestrator, SimulationOutcome};
