//! infergrid-worker — simulated inference servers.
//!
//! Each worker is a tokio task bound to one server. It owns a private
//! inbound queue and reports to the shared outbound queue the
//! orchestrator drains. No state is shared with the orchestrator.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator ──WorkerCommand──▶ worker inbox (one per server)
//!                                   │
//!                                   ├── Semaphore(capacity) execution slots
//!                                   └── per task: Started → sleep(realized) → Completed
//!                                                      │
//! Orchestrator ◀──────WorkerEvent── shared outbox ◀────┘
//! ```
//!
//! Execution time comes from a pluggable `DurationModel` so tests can
//! replace random jitter with exact durations.

pub mod duration;
pub mod worker;

pub use duration::{DurationModel, Jittered, Nominal};
pub use worker::{
    WorkerCommand, WorkerConfig, WorkerError, WorkerEvent, WorkerExit, WorkerHandle, spawn_worker,
};
