//! Simulation runtime — lifecycle, dispatch loop, and reporting loop.
//!
//! One [`Simulation`] owns one run: its immutable config, its counters and
//! latency samples, its bounded time-series buffer, a worker-slot pool, and
//! a shutdown signal. Three kinds of tasks operate on it:
//!
//! 1. The **dispatch loop** ticks once per second, asks the rate curve for a
//!    target, and attempts `floor(target)` launches. Each launch tries to
//!    take a worker slot without waiting; if none is free the unit is shed.
//!    The loop blocks only on its own ticker and the shutdown signal, never
//!    on network I/O, so the curve stays anchored to wall-clock time.
//! 2. **Executor tasks**, one per granted slot, run the request client and
//!    record exactly one success-or-failure increment plus one latency
//!    sample. The slot is an owned semaphore permit that drops with the
//!    task, so release happens on every exit path.
//! 3. The **reporting loop** samples the counters on its own interval,
//!    appends one time-series point, and pushes a progress event.
//!
//! # Backpressure
//!
//! The slot pool is sized to `concurrent_users`. Offered load beyond it is
//! dropped, not queued: queueing would let latency desynchronize the tick
//! loop from the curve, and the pool deliberately caps achievable RPS at
//! `concurrent_users / latency`. Shed launches are counted and visible in
//! the final report.
//!
//! # Lifecycle
//!
//! `Starting -> Running -> {Completed | Stopped | Failed}`. `Running` is set
//! at the first dispatch tick; `Completed` when the run's allotted duration
//! elapses; `Stopped` on explicit cancellation. On either terminal
//! transition the loops stop, in-flight executors are drained to completion
//! (never aborted mid-request), final percentiles are computed, and one
//! terminal snapshot is published and persisted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::RequestClient;
use crate::config::SimulationConfig;
use crate::engine::RunId;
use crate::hooks::{EventKind, Hooks, RunEvent};
use crate::metrics::{Counters, LatencySummary, RunMetrics, RunReport};
use crate::rate::target_rps;
use crate::series::{TimeSeriesBuffer, TimeSeriesPoint};

/// Lifecycle states. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created, before the first dispatch tick.
    Starting,
    Running,
    /// The run's allotted wall-clock time elapsed.
    Completed,
    /// Explicit external cancellation.
    Stopped,
    /// A run rejected before dispatching ever starts. The engine surfaces
    /// config errors synchronously instead of creating a failed run, so this
    /// state exists for API consumers (stored records, external dashboards)
    /// rather than for anything the engine itself constructs.
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Stopped | RunState::Failed)
    }
}

/// Serializable view of a run's current status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub id: RunId,
    pub name: String,
    pub state: RunState,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    pub counters: Counters,
    /// Requests completed during the most recent sample interval.
    pub current_rps: u64,
    pub latency: Option<LatencySummary>,
}

/// Composite status fields behind one lock, held only for short
/// read-modify-write sections. The raw counters bypass it via atomics.
#[derive(Debug)]
struct StatusInner {
    state: RunState,
    started_at_ms: Option<u64>,
    ended_at_ms: Option<u64>,
    current_rps: u64,
    latency: Option<LatencySummary>,
}

/// One live run. Mutated only by its own tasks; snapshots are read freely.
pub struct Simulation {
    id: RunId,
    config: SimulationConfig,
    metrics: RunMetrics,
    status: Mutex<StatusInner>,
    series: Mutex<TimeSeriesBuffer>,
    slots: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    explicit_stop: AtomicBool,
}

impl Simulation {
    pub(crate) fn new(id: RunId, config: SimulationConfig) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let slots = Arc::new(Semaphore::new(config.concurrent_users));
        Arc::new(Self {
            id,
            slots,
            metrics: RunMetrics::new(),
            status: Mutex::new(StatusInner {
                state: RunState::Starting,
                started_at_ms: None,
                ended_at_ms: None,
                current_rps: 0,
                latency: None,
            }),
            series: Mutex::new(TimeSeriesBuffer::new()),
            shutdown_tx,
            shutdown_rx,
            explicit_stop: AtomicBool::new(false),
            config,
        })
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Request early termination. Idempotent; in-flight requests finish.
    pub fn request_stop(&self) {
        self.explicit_stop.store(true, Ordering::Relaxed);
        let _ = self.shutdown_tx.send(true);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        StatusSnapshot {
            id: self.id,
            name: self.config.name.clone(),
            state: status.state,
            started_at_ms: status.started_at_ms,
            ended_at_ms: status.ended_at_ms,
            counters: self.metrics.counters(),
            current_rps: status.current_rps,
            latency: status.latency,
        }
    }

    /// Query the bounded time series: `since` filters by timestamp
    /// (inclusive), `limit` keeps only the newest N of the result.
    pub fn time_series(&self, since: Option<u64>, limit: Option<usize>) -> Vec<TimeSeriesPoint> {
        let series = self.series.lock().unwrap_or_else(|e| e.into_inner());
        let mut points = match since {
            Some(ts) => series.since(ts),
            None => series.since(0),
        };
        if let Some(n) = limit {
            let skip = points.len().saturating_sub(n);
            points.drain(..skip);
        }
        points
    }

    /// Drive the run to a terminal state. Spawned once by the engine.
    pub(crate) async fn run(self: Arc<Self>, client: Arc<dyn RequestClient>, hooks: Hooks) {
        let started = Instant::now();
        let started_ms = unix_ms();
        {
            let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
            status.started_at_ms = Some(started_ms);
        }
        info!(run_id = self.id, name = %self.config.name, "simulation starting");
        if let Err(e) = hooks.store.save(&self.snapshot()).await {
            warn!(run_id = self.id, error = %e, "failed to persist initial run snapshot");
        }
        hooks.broadcaster.publish(RunEvent::new(
            EventKind::RunStarted,
            self.id,
            serde_json::json!({ "name": self.config.name }),
        ));

        let reporter = tokio::spawn(Arc::clone(&self).report_loop(hooks.clone(), started));
        let handles = Arc::clone(&self)
            .dispatch_loop(Arc::clone(&client), hooks.clone(), started)
            .await;

        // Terminal: no new ticks, reporter stops, in-flight requests drain.
        let _ = self.shutdown_tx.send(true);
        join_all(handles).await;
        let _ = reporter.await;

        self.finalize(&hooks, started).await;
    }

    /// The once-per-second tick loop. Returns the in-flight executor handles
    /// still outstanding when the run goes terminal.
    async fn dispatch_loop(
        self: Arc<Self>,
        client: Arc<dyn RequestClient>,
        hooks: Hooks,
        started: Instant,
    ) -> Vec<JoinHandle<()>> {
        let deadline = started + self.config.duration;
        let mut shutdown = self.shutdown_rx.clone();
        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        let mut next_tick = started;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(next_tick) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
            // A stop racing the ticker must not dispatch one more round.
            if *shutdown.borrow() || Instant::now() >= deadline {
                break;
            }
            next_tick += Duration::from_secs(1);

            {
                let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
                if status.state == RunState::Starting {
                    status.state = RunState::Running;
                }
            }

            let target = self.target_at(started.elapsed());
            let launches = target.floor() as u64;
            debug!(run_id = self.id, target_rps = target, launches, "dispatch tick");

            for _ in 0..launches {
                match Arc::clone(&self.slots).try_acquire_owned() {
                    Ok(permit) => {
                        let sim = Arc::clone(&self);
                        let client = Arc::clone(&client);
                        let hooks = hooks.clone();
                        handles.push(tokio::spawn(async move {
                            sim.execute_one(client, hooks, permit).await;
                        }));
                    }
                    // No free slot: shed the unit. Never queued, never retried.
                    Err(_) => self.metrics.record_dropped(),
                }
            }
            handles.retain(|h| !h.is_finished());
        }
        handles
    }

    /// One granted request execution. The permit is released when this task
    /// ends, whatever the outcome.
    async fn execute_one(
        &self,
        client: Arc<dyn RequestClient>,
        hooks: Hooks,
        _permit: tokio::sync::OwnedSemaphorePermit,
    ) {
        let started = Instant::now();
        match client.execute(self.id).await {
            Ok(()) => self.metrics.record_success(started.elapsed()),
            Err(err) => {
                self.metrics.record_failure(started.elapsed());
                debug!(run_id = self.id, error = %err, "request failed");
                hooks.broadcaster.publish(RunEvent::new(
                    EventKind::RequestFailed,
                    self.id,
                    serde_json::json!({ "error": err.to_string() }),
                ));
            }
        }
    }

    /// Samples counters once per `sample_interval`, independent of dispatch.
    async fn report_loop(self: Arc<Self>, hooks: Hooks, started: Instant) {
        let mut shutdown = self.shutdown_rx.clone();
        let mut next_sample = started + self.config.sample_interval;
        let mut last_total = 0u64;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(next_sample) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
            next_sample += self.config.sample_interval;
            last_total = self.sample(&hooks, started, last_total);
        }
    }

    /// Take one observation: append a time-series point, refresh the derived
    /// status fields, publish a progress event. Returns the new total.
    fn sample(&self, hooks: &Hooks, started: Instant, last_total: u64) -> u64 {
        let counters = self.metrics.counters();
        let observed = counters.total.saturating_sub(last_total);
        let active = self
            .config
            .concurrent_users
            .saturating_sub(self.slots.available_permits());
        let point = TimeSeriesPoint {
            timestamp_ms: unix_ms(),
            observed_rps: observed,
            target_rps: self.target_at(started.elapsed()),
            mean_response_ms: self.metrics.mean_ms(),
            error_rate: self.metrics.error_rate(),
            active_workers: active,
        };

        {
            let mut series = self.series.lock().unwrap_or_else(|e| e.into_inner());
            series.push(point.clone());
        }
        {
            let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
            status.current_rps = observed;
            status.latency = self.metrics.latency_summary();
        }
        match serde_json::to_value(&point) {
            Ok(payload) => hooks
                .broadcaster
                .publish(RunEvent::new(EventKind::Progress, self.id, payload)),
            Err(e) => warn!(run_id = self.id, error = %e, "failed to encode progress event"),
        }
        counters.total
    }

    /// Terminal transition: final percentiles, one last snapshot, report out.
    async fn finalize(&self, hooks: &Hooks, started: Instant) {
        let final_state = if self.explicit_stop.load(Ordering::Relaxed) {
            RunState::Stopped
        } else {
            RunState::Completed
        };
        {
            let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
            status.state = final_state;
            status.ended_at_ms = Some(unix_ms());
            status.latency = self.metrics.latency_summary();
        }

        let snapshot = self.snapshot();
        let report = RunReport {
            name: self.config.name.clone(),
            counters: snapshot.counters,
            error_rate: self.metrics.error_rate(),
            latency: snapshot.latency,
            elapsed: started.elapsed(),
        };
        match serde_json::to_value(&report) {
            Ok(payload) => hooks
                .broadcaster
                .publish(RunEvent::new(EventKind::RunFinished, self.id, payload)),
            Err(e) => warn!(run_id = self.id, error = %e, "failed to encode final report"),
        }
        if let Err(e) = hooks.store.save(&snapshot).await {
            warn!(run_id = self.id, error = %e, "failed to persist final run snapshot");
        }
        info!(
            run_id = self.id,
            state = ?final_state,
            total = snapshot.counters.total,
            failed = snapshot.counters.failed,
            dropped = snapshot.counters.dropped,
            "simulation finished"
        );
    }

    fn target_at(&self, elapsed: Duration) -> f64 {
        target_rps(
            self.config.pattern,
            self.config.scale_mode,
            self.config.min_rps as f64,
            self.config.max_rps as f64,
            elapsed,
            self.config.duration,
            self.config.ramp_up,
        )
    }
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
