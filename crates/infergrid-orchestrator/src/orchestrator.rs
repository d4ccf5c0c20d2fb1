//! Orchestrator — owns every piece of mutable scheduling state and drives
//! the simulation tick by tick.
//!
//! Per tick:
//! 1. admit requests whose arrival time has passed into the pending pool
//! 2. dispatch: policy picks the task, load balancer picks the server
//! 3. migrate queued work off overloaded servers
//! 4. release queued tasks to their workers
//! 5. wait (bounded) for worker events and fold them into load + metrics
//! 6. detect lost workers
//!
//! Workers only ever see `Task` messages. Server load, the pending pool
//! and the metrics live here and are touched by this loop alone.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use infergrid_core::{
    Policy, ServerId, ServerModel, ServerSpec, SimClock, SimConfig, SimEvent, SimulationSettings,
    Task, TaskId, TimedEvent, far_future,
};
use infergrid_metrics::{MetricsCollector, Report};
use infergrid_migration::{MigrationManager, MigrationOutcome};
use infergrid_scheduler::{LeastAdjustedLoad, LoadBalancer, PendingPool};
use infergrid_worker::{
    DurationModel, Jittered, Nominal, WorkerConfig, WorkerEvent, WorkerExit, WorkerHandle,
    spawn_worker,
};

use crate::error::OrchestratorResult;
use crate::events::EventLog;

/// How many waiting task ids a "no free slot" log line lists.
const WAITING_LOG_LIMIT: usize = 5;

/// Builds the duration model for one server's worker.
pub type DurationFactory = Box<dyn Fn(ServerId) -> Box<dyn DurationModel> + Send>;

/// Everything a finished run produced.
#[derive(Debug)]
pub struct SimulationOutcome {
    pub report: Report,
    pub events: Vec<TimedEvent>,
    /// Completed tasks with their final scheduling metadata.
    pub finished: Vec<Task>,
}

impl SimulationOutcome {
    /// The event log as pretty-printed JSON.
    pub fn events_json(&self) -> OrchestratorResult<String> {
        Ok(serde_json::to_string_pretty(&self.events)?)
    }
}

/// Configured simulation, ready to run once.
pub struct Orchestrator {
    policy: Policy,
    settings: SimulationSettings,
    servers: Vec<ServerSpec>,
    arrivals: Vec<Task>,
    balancer: Arc<dyn LoadBalancer>,
    durations: DurationFactory,
}

impl Orchestrator {
    /// Validate `config` and prepare a run under `policy`.
    pub fn new(config: &SimConfig, policy: Policy) -> OrchestratorResult<Self> {
        config.validate()?;

        let settings = config.simulation.clone();
        let jitter = settings.jitter;
        let seed = settings.seed;
        let durations: DurationFactory = Box::new(move |server_id| -> Box<dyn DurationModel> {
            if jitter > 0.0 {
                Box::new(Jittered::new(jitter, seed ^ u64::from(server_id)))
            } else {
                Box::new(Nominal)
            }
        });

        let mut servers = config.server_config.clone();
        servers.sort_by_key(|s| s.id);

        Ok(Self {
            policy,
            settings,
            servers,
            arrivals: config.resolve_arrivals(),
            balancer: Arc::new(LeastAdjustedLoad),
            durations,
        })
    }

    /// Replace the per-worker duration model.
    pub fn with_duration_model<F>(mut self, factory: F) -> Self
    where
        F: Fn(ServerId) -> Box<dyn DurationModel> + Send + 'static,
    {
        self.durations = Box::new(factory);
        self
    }

    pub fn with_balancer(mut self, balancer: Arc<dyn LoadBalancer>) -> Self {
        self.balancer = balancer;
        self
    }

    /// Run to completion: every arrival processed and all in-flight work
    /// drained (or lost with its worker).
    pub async fn run(self) -> OrchestratorResult<SimulationOutcome> {
        let clock = SimClock::start(self.settings.time_scale);
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();

        let mut workers = Vec::with_capacity(self.servers.len());
        for spec in &self.servers {
            let config = WorkerConfig {
                server_id: spec.id,
                capacity: spec.capacity,
                fail_after: spec.fail_after,
            };
            let model = (self.durations)(spec.id);
            workers.push(Some(spawn_worker(config, clock, model, outbox_tx.clone())));
        }

        let servers: Vec<ServerModel> = self.servers.iter().map(ServerModel::from_spec).collect();

        info!(
            policy = self.policy.name(),
            servers = servers.len(),
            requests = self.arrivals.len(),
            "simulation starting"
        );

        let mut run = Run {
            tick: self.settings.tick_interval(),
            clock,
            metrics: MetricsCollector::new(&servers),
            migration: MigrationManager::new(self.balancer.clone()),
            balancer: self.balancer,
            servers,
            workers,
            pending: PendingPool::new(self.policy),
            arrivals: self.arrivals.into(),
            in_flight: HashMap::new(),
            events: EventLog::new(),
            finished: Vec::new(),
            outbox_rx,
            _outbox_tx: outbox_tx,
        };

        run.drive().await;
        let total_time = run.clock.now();
        run.shutdown_workers().await?;

        let undispatched = run.report_undispatched();
        let report = run
            .metrics
            .summarize(run.pending.policy(), total_time, undispatched);
        info!(
            started = run.metrics.started_count(),
            completed = report.completed_count,
            lost = report.lost_count,
            migrations = report.migrations,
            total_time = format_args!("{total_time:.2}"),
            "simulation finished"
        );

        Ok(SimulationOutcome {
            report,
            events: run.events.into_events(),
            finished: run.finished,
        })
    }
}

/// Mutable state of one run.
struct Run {
    tick: Duration,
    clock: SimClock,
    balancer: Arc<dyn LoadBalancer>,
    migration: MigrationManager,
    metrics: MetricsCollector,
    /// Sorted by id; `workers[i]` belongs to `servers[i]`.
    servers: Vec<ServerModel>,
    workers: Vec<Option<WorkerHandle>>,
    pending: PendingPool,
    arrivals: VecDeque<Task>,
    /// Released to a worker, not yet completed.
    in_flight: HashMap<TaskId, Task>,
    events: EventLog,
    finished: Vec<Task>,
    outbox_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    /// Keeps the outbound queue open even if every worker is gone.
    _outbox_tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl Run {
    async fn drive(&mut self) {
        loop {
            self.admit_arrivals();
            self.dispatch();
            self.migrate();
            self.release();
            self.check_load_accounting();

            if self.is_finished() {
                break;
            }

            self.wait_for_events().await;
            self.detect_lost_workers().await;
        }
    }

    fn admit_arrivals(&mut self) {
        let now = self.clock.now();
        while self.arrivals.front().is_some_and(|t| t.arrival_time <= now) {
            let Some(task) = self.arrivals.pop_front() else {
                break;
            };
            self.metrics.record_arrival(&task);
            self.events
                .record(task.arrival_time, SimEvent::Arrival { task_id: task.id });
            self.pending.insert(task);
        }
    }

    fn dispatch(&mut self) {
        while let Some(task) = self.pending.peek() {
            let Some(server_id) = self.balancer.choose_server(task, &self.servers) else {
                // Every server is full; retry next tick.
                let next: Vec<TaskId> = self
                    .pending
                    .peek_candidates(WAITING_LOG_LIMIT)
                    .iter()
                    .map(|t| t.id)
                    .collect();
                debug!(pending = self.pending.len(), ?next, "no free slot");
                break;
            };
            let (Some(idx), Some(task)) = (self.index_of(server_id), self.pending.select_next())
            else {
                break;
            };

            debug!(
                policy = self.pending.policy().tag(),
                task_id = task.id,
                exec_time = task.exec_time,
                priority = task.priority.label(),
                server_id,
                "dispatching"
            );
            self.events.record(
                self.clock.now(),
                SimEvent::Dispatch {
                    task_id: task.id,
                    policy: self.pending.policy(),
                    server_id,
                },
            );
            self.servers[idx].enqueue(task);
        }
    }

    fn migrate(&mut self) {
        let now = self.clock.now();
        for outcome in self.migration.rebalance(&mut self.servers) {
            match outcome {
                MigrationOutcome::Moved(m) => {
                    self.metrics.record_migration();
                    self.events.record(
                        now,
                        SimEvent::Migration {
                            task_id: m.task_id,
                            from: m.from,
                            to: m.to,
                        },
                    );
                }
                MigrationOutcome::Skipped { task_id, from } => {
                    self.events
                        .record(now, SimEvent::MigrationSkipped { task_id, from });
                }
            }
        }
    }

    /// Hand queued tasks to their workers. After this they can no longer
    /// be migrated.
    fn release(&mut self) {
        let mut failed = Vec::new();
        for idx in 0..self.servers.len() {
            if !self.servers[idx].online {
                continue;
            }
            for task in self.servers[idx].release_queue() {
                self.in_flight.insert(task.id, task.clone());
                let sent = match &self.workers[idx] {
                    Some(worker) => worker.execute(task).is_ok(),
                    None => false,
                };
                if !sent && !failed.contains(&idx) {
                    failed.push(idx);
                }
            }
        }
        if failed.is_empty() {
            return;
        }
        self.drain_events();
        for idx in failed {
            self.lose_worker(idx);
        }
    }

    /// Wait until the next worker event, the next arrival, or one tick,
    /// whichever comes first, then drain whatever else is queued.
    async fn wait_for_events(&mut self) {
        let mut deadline = Instant::now()
            .checked_add(self.tick)
            .unwrap_or_else(far_future);
        if let Some(next) = self.arrivals.front() {
            deadline = deadline.min(self.clock.instant_at(next.arrival_time));
        }

        if let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.outbox_rx.recv()).await {
            self.handle_event(event);
        }
        self.drain_events();
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.outbox_rx.try_recv() {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Started {
                server_id,
                task_id,
                start_time,
            } => {
                let Some(task) = self.in_flight.get_mut(&task_id) else {
                    debug!(task_id, server_id, "start for unknown task ignored");
                    return;
                };
                task.start_time = Some(start_time);
                self.metrics.record_start(task);
                self.events
                    .record(start_time, SimEvent::Start { task_id, server_id });
            }
            WorkerEvent::Completed {
                server_id,
                task,
                realized,
            } => {
                let Some(mut tracked) = self.in_flight.remove(&task.id) else {
                    debug!(task_id = task.id, server_id, "completion for unknown task ignored");
                    return;
                };
                if let Some(idx) = self.index_of(server_id) {
                    self.servers[idx].complete_one();
                }

                tracked.start_time = task.start_time.or(tracked.start_time);
                tracked.completion_time = task.completion_time;
                let at = tracked.completion_time.unwrap_or_else(|| self.clock.now());

                self.metrics.record_completion(&tracked);
                self.events.record(
                    at,
                    SimEvent::Completion {
                        task_id: tracked.id,
                        server_id,
                        realized,
                    },
                );
                self.finished.push(tracked);
            }
        }
    }

    async fn detect_lost_workers(&mut self) {
        let failed: Vec<usize> = self
            .workers
            .iter()
            .enumerate()
            .filter(|(_, w)| w.as_ref().is_some_and(|w| w.has_failed()))
            .map(|(idx, _)| idx)
            .collect();
        if failed.is_empty() {
            return;
        }

        // A finished worker has sent everything it ever will.
        self.drain_events();
        for idx in failed {
            if let Some(worker) = self.workers[idx].take() {
                match worker.join().await {
                    Ok(exit) => debug!(server_id = self.servers[idx].id, ?exit, "worker exited"),
                    Err(e) => error!(server_id = self.servers[idx].id, error = %e, "worker panicked"),
                }
            }
            self.lose_worker(idx);
        }
    }

    /// Take a server out of service and write off everything assigned to it.
    fn lose_worker(&mut self, idx: usize) {
        let server = &mut self.servers[idx];
        if !server.online {
            return;
        }
        server.online = false;
        let server_id = server.id;

        let mut lost: Vec<TaskId> = server.release_queue().into_iter().map(|t| t.id).collect();
        lost.extend(
            self.in_flight
                .values()
                .filter(|t| t.assigned_server == Some(server_id))
                .map(|t| t.id),
        );
        lost.sort_unstable();
        for task_id in &lost {
            self.in_flight.remove(task_id);
            self.metrics.record_lost(*task_id);
        }
        self.servers[idx].current_load = 0;
        self.workers[idx] = None;

        self.events
            .record(self.clock.now(), SimEvent::WorkerLost { server_id, lost });
    }

    fn is_finished(&self) -> bool {
        if self.in_flight.is_empty() && !self.servers.iter().any(|s| s.online) {
            return true;
        }
        self.arrivals.is_empty() && self.pending.is_empty() && self.in_flight.is_empty()
    }

    /// Σ current_load must equal the dispatched-but-not-completed count.
    fn check_load_accounting(&self) {
        let released: u32 = self.servers.iter().map(ServerModel::in_flight).sum();
        debug_assert_eq!(
            released as usize,
            self.in_flight.len(),
            "server load out of sync with in-flight tasks"
        );
    }

    async fn shutdown_workers(&mut self) -> OrchestratorResult<()> {
        for mut worker in self.workers.iter_mut().filter_map(Option::take) {
            let server_id = worker.server_id();
            worker.shutdown();
            match worker.join().await? {
                WorkerExit::Shutdown { completed } => {
                    debug!(server_id, completed, "worker shut down");
                }
                WorkerExit::Crashed { completed } => {
                    warn!(server_id, completed, "worker had crashed before shutdown");
                }
            }
        }
        Ok(())
    }

    /// Anything never dispatched is a final-state anomaly.
    fn report_undispatched(&mut self) -> u64 {
        let mut leftover = self.pending.drain();
        leftover.extend(self.arrivals.drain(..));
        for task in &leftover {
            warn!(task_id = task.id, "task was never dispatched");
        }
        leftover.len() as u64
    }

    fn index_of(&self, server_id: ServerId) -> Option<usize> {
        self.servers.iter().position(|s| s.id == server_id)
    }
}
