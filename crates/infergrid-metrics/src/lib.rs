//! infergrid-metrics — run statistics for the InferGrid simulator.
//!
//! Folds task lifecycle events into running sums as they happen and
//! produces one `Report` at the end of a run.
//!
//! # Architecture
//!
//! ```text
//! MetricsCollector
//!   ├── record_arrival() / record_start() / record_completion()
//!   ├── record_migration() / record_lost()
//!   └── summarize() → Report
//!
//! Rendering
//!   └── render_report() → boxed text summary
//! ```

pub mod collector;
pub mod report;

pub use collector::{MetricsCollector, Report, ServerUsage};
pub use report::render_report;
