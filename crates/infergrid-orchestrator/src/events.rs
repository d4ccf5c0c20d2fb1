//! Event log — every observable simulation event, in the order observed.
//!
//! Each recorded event is also emitted through `tracing`.

use tracing::{debug, info, warn};

use infergrid_core::{SimEvent, TimedEvent};

#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<TimedEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, at: f64, event: SimEvent) {
        match &event {
            SimEvent::Arrival { task_id } => {
                info!(at = format_args!("{at:.2}"), task_id, "request arrived");
            }
            SimEvent::Dispatch {
                task_id,
                policy,
                server_id,
            } => {
                info!(at = format_args!("{at:.2}"), %policy, task_id, server_id, "task dispatched");
            }
            SimEvent::Start { task_id, server_id } => {
                debug!(at = format_args!("{at:.2}"), task_id, server_id, "task started");
            }
            SimEvent::Completion {
                task_id,
                server_id,
                realized,
            } => {
                info!(
                    at = format_args!("{at:.2}"),
                    task_id,
                    server_id,
                    realized = format_args!("{realized:.2}"),
                    "task completed"
                );
            }
            SimEvent::Migration { task_id, from, to } => {
                info!(at = format_args!("{at:.2}"), task_id, from, to, "task migrated");
            }
            SimEvent::MigrationSkipped { task_id, from } => {
                debug!(at = format_args!("{at:.2}"), task_id, from, "no migration target");
            }
            SimEvent::WorkerLost { server_id, lost } => {
                warn!(at = format_args!("{at:.2}"), server_id, lost = ?lost, "worker lost");
            }
        }
        self.events.push(TimedEvent { at, event });
    }

    pub fn into_events(self) -> Vec<TimedEvent> {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let mut log = EventLog::new();
        log.record(0.0, SimEvent::Arrival { task_id: 1 });
        log.record(0.0, SimEvent::Arrival { task_id: 2 });
        log.record(
            0.1,
            SimEvent::Migration {
                task_id: 1,
                from: 1,
                to: 2,
            },
        );
        log.record(
            0.2,
            SimEvent::WorkerLost {
                server_id: 2,
                lost: vec![1],
            },
        );

        let events = log.into_events();
        let json = serde_json::to_string(&events).unwrap();
        assert!(json.contains("\"worker_lost\""));

        assert_eq!(events.len(), 4);
        let for_task_1 = events.iter().filter(|e| e.event.task_id() == Some(1)).count();
        assert_eq!(for_task_1, 2);
        assert_eq!(events[0].at, 0.0);
        assert_eq!(events[3].at, 0.2);
    }
}
