//! infergrid-migration — moves queued work off overloaded servers.
//!
//! Runs once per orchestrator tick, after dispatch and before queued
//! tasks are released to workers.
//!
//! # Algorithm
//!
//! ```text
//! mean = Σ current_load / online_servers
//!
//! for each server with current_load > 2 × mean:
//!     candidates = queued tasks, Low priority first, then oldest arrival
//!     while server still overloaded:
//!         dest = load_balancer.choose_server(candidate, excluding server)
//!         if dest.current_load + 1 <= 2 × mean:
//!             move candidate, migration_count += 1
//!         else:
//!             skip (retried next tick)
//! ```
//!
//! Moving a task never changes the cluster total, so `mean` is fixed for
//! the whole pass. Tasks that have started are never candidates.

pub mod migrator;

pub use migrator::{Migration, MigrationManager, MigrationOutcome, OVERLOAD_FACTOR};
