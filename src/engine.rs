//! Engine — the process-local registry of active simulations.
//!
//! An [`Engine`] is an owned value, not a global: tests run several side by
//! side, each with its own registry and id space. It validates configs
//! synchronously before allocating anything, hands every run the shared
//! collaborator bundle, and exposes the control surface operators call.
//! All operations are safe to call concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::client::{HttpRequestClient, RequestClient};
use crate::config::SimulationConfig;
use crate::error::EngineError;
use crate::hooks::Hooks;
use crate::series::TimeSeriesPoint;
use crate::simulation::{Simulation, StatusSnapshot};

/// Identifies one run for the lifetime of an engine. Monotonically
/// increasing; never reused, even after deletion.
pub type RunId = u64;

pub struct Engine {
    hooks: Hooks,
    next_id: AtomicU64,
    runs: Mutex<HashMap<RunId, Arc<Simulation>>>,
}

impl Engine {
    /// Engine with no-op collaborators.
    pub fn new() -> Self {
        Self::with_hooks(Hooks::default())
    }

    pub fn with_hooks(hooks: Hooks) -> Self {
        Self {
            hooks,
            next_id: AtomicU64::new(0),
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Validate, register, and launch a run against the default HTTP client.
    ///
    /// Validation happens before any task or slot exists; a rejected config
    /// leaves no trace. Must be called from within a tokio runtime.
    pub fn start(&self, config: SimulationConfig) -> Result<RunId, EngineError> {
        let mut config = config;
        config.validate()?;
        let client = Arc::new(HttpRequestClient::new(config.clone(), self.hooks.clone()));
        self.launch(config, client)
    }

    /// Same as [`start`](Self::start) with a caller-supplied request client.
    /// This is the seam tests use to substitute the network.
    pub fn start_with_client(
        &self,
        config: SimulationConfig,
        client: Arc<dyn RequestClient>,
    ) -> Result<RunId, EngineError> {
        let mut config = config;
        config.validate()?;
        self.launch(config, client)
    }

    fn launch(
        &self,
        config: SimulationConfig,
        client: Arc<dyn RequestClient>,
    ) -> Result<RunId, EngineError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let sim = Simulation::new(id, config);
        {
            let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
            runs.insert(id, Arc::clone(&sim));
        }
        info!(run_id = id, name = %sim.config().name, "run registered");
        tokio::spawn(sim.run(client, self.hooks.clone()));
        Ok(id)
    }

    /// Request early termination. The run drains and transitions to
    /// `Stopped`; it stays queryable until deleted.
    pub fn stop(&self, id: RunId) -> Result<(), EngineError> {
        self.get(id)?.request_stop();
        Ok(())
    }

    pub fn status(&self, id: RunId) -> Result<StatusSnapshot, EngineError> {
        Ok(self.get(id)?.snapshot())
    }

    pub fn list(&self) -> Vec<StatusSnapshot> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        let mut snapshots: Vec<StatusSnapshot> = runs.values().map(|s| s.snapshot()).collect();
        snapshots.sort_by_key(|s| s.id);
        snapshots
    }

    /// Bounded time-series query: points at or after `since`, newest `limit`.
    pub fn time_series(
        &self,
        id: RunId,
        since: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<TimeSeriesPoint>, EngineError> {
        Ok(self.get(id)?.time_series(since, limit))
    }

    /// Remove a run from the registry, stopping it first if still live.
    /// Idempotent: deleting an unknown id is a no-op. Historical records, if
    /// any, live with the configured store, not here.
    pub fn delete(&self, id: RunId) {
        let removed = {
            let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
            runs.remove(&id)
        };
        if let Some(sim) = removed {
            sim.request_stop();
            info!(run_id = id, "run deleted");
        }
    }

    fn get(&self, id: RunId) -> Result<Arc<Simulation>, EngineError> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs.get(&id).cloned().ok_or(EngineError::NotFound(id))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadPattern;
    use crate::error::{ConfigError, RequestError};
    use crate::simulation::RunState;
    use async_trait::async_trait;
    use std::time::Duration;

    struct InstantOk;

    #[async_trait]
    impl RequestClient for InstantOk {
        async fn execute(&self, _: RunId) -> Result<(), RequestError> {
            Ok(())
        }
    }

    fn config(duration_secs: u64) -> SimulationConfig {
        SimulationConfig::builder()
            .name("engine-test")
            .url("http://localhost:0")
            .max_rps(5)
            .pattern(LoadPattern::Constant)
            .duration(Duration::from_secs(duration_secs))
            .concurrent_users(8)
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn start_rejects_invalid_config_without_registering() {
        let engine = Engine::new();
        let mut bad = config(10);
        bad.max_rps = 0;
        match engine.start_with_client(bad, Arc::new(InstantOk)) {
            Err(EngineError::Config(ConfigError::InvalidRps)) => {}
            other => panic!("expected config error, got {other:?}"),
        }
        assert!(engine.list().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_ids_are_unique_and_monotonic() {
        let engine = Engine::new();
        let a = engine.start_with_client(config(60), Arc::new(InstantOk)).unwrap();
        let b = engine.start_with_client(config(60), Arc::new(InstantOk)).unwrap();
        assert!(b > a);
        assert_eq!(engine.list().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_transitions_run_and_keeps_it_queryable() {
        let engine = Engine::new();
        let id = engine.start_with_client(config(600), Arc::new(InstantOk)).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        engine.stop(id).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let snap = engine.status(id).unwrap();
        assert_eq!(snap.state, RunState::Stopped);
        assert_eq!(snap.counters.total, snap.counters.success + snap.counters.failed);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_is_idempotent() {
        let engine = Engine::new();
        let id = engine.start_with_client(config(600), Arc::new(InstantOk)).unwrap();
        engine.delete(id);
        // Second delete of the same id is a no-op, as is deleting an id
        // that never existed.
        engine.delete(id);
        engine.delete(9999);
        assert!(matches!(engine.status(id), Err(EngineError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_and_status_on_unknown_run_return_not_found() {
        let engine = Engine::new();
        assert!(matches!(engine.stop(42), Err(EngineError::NotFound(42))));
        assert!(matches!(engine.status(42), Err(EngineError::NotFound(42))));
        assert!(matches!(engine.time_series(42, None, None), Err(EngineError::NotFound(42))));
    }

    #[tokio::test(start_paused = true)]
    async fn engines_are_independent() {
        let left = Engine::new();
        let right = Engine::new();
        let id = left.start_with_client(config(60), Arc::new(InstantOk)).unwrap();
        assert!(left.status(id).is_ok());
        assert!(right.status(id).is_err());
        assert!(right.list().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn time_series_query_honors_since_and_limit() {
        let engine = Engine::new();
        let id = engine.start_with_client(config(8), Arc::new(InstantOk)).unwrap();
        tokio::time::sleep(Duration::from_secs(12)).await;

        let all = engine.time_series(id, None, None).unwrap();
        assert!(all.len() >= 7);
        let last_two = engine.time_series(id, None, Some(2)).unwrap();
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[1], *all.last().unwrap());
        let cutoff = all[3].timestamp_ms;
        let since = engine.time_series(id, Some(cutoff), None).unwrap();
        assert_eq!(since.first().unwrap().timestamp_ms, cutoff);
    }
}
