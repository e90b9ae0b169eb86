//! Surge — a load-generation engine for performance testing HTTP targets.
//!
//! Given a target endpoint and a load-shape description, Surge drives a
//! configurable request rate over time, executes requests concurrently under
//! a bounded worker budget, and continuously aggregates timing, throughput,
//! and error statistics for live observation.
//!
//! # Architecture
//!
//! The main building blocks are:
//!
//! - [`SimulationConfig`]: the immutable description of one run — target,
//!   rate shape ([`LoadPattern`] and [`ScaleMode`]), duration, and the
//!   concurrency budget.
//! - [`rate::target_rps`]: the pure rate-curve scheduler. Elapsed time in,
//!   target requests-per-second out; no state, no I/O.
//! - [`Simulation`]: one live run — a once-per-second dispatch loop that
//!   turns the curve's target into bounded worker launches, a reporting loop
//!   that appends one [`TimeSeriesPoint`] per interval, and a lifecycle
//!   state machine from `Starting` to a terminal state.
//! - [`Engine`]: the registry of active runs. Start, stop, query, and delete
//!   simulations; an engine is an owned value, so independent engines can
//!   coexist in one process.
//! - [`hooks::Hooks`]: the collaborator seams — auth, response validation,
//!   variable resolution, event broadcast, persistence — each a trait with a
//!   no-op default.
//!
//! # Backpressure
//!
//! Offered load beyond the worker budget is dropped, never queued: the
//! dispatch loop must stay synchronized with wall-clock time, so it will not
//! block waiting for a free slot. `concurrent_users` therefore caps
//! achievable RPS at roughly `concurrent_users / request_latency`; the shed
//! launches are counted and reported.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use surge::{Engine, LoadPattern, SimulationConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Engine::new();
//!     let config = SimulationConfig::builder()
//!         .name("checkout ramp")
//!         .url("http://localhost:3000/checkout")
//!         .min_rps(1)
//!         .max_rps(500)
//!         .pattern(LoadPattern::LinearRamp)
//!         .ramp_up(Duration::from_secs(30))
//!         .duration(Duration::from_secs(120))
//!         .concurrent_users(200)
//!         .build();
//!
//!     let id = engine.start(config).expect("config is valid");
//!     tokio::time::sleep(Duration::from_secs(121)).await;
//!
//!     let status = engine.status(id).expect("run exists");
//!     println!("{status:#?}");
//! }
//! ```

/// Per-request execution and the default HTTP client.
pub mod client;
/// Run configuration and validation.
pub mod config;
/// Run registry and control surface.
pub mod engine;
/// Error taxonomy.
pub mod error;
/// Collaborator seams: auth, validation, variables, broadcast, persistence.
pub mod hooks;
/// Counters, latency samples, and percentile summaries.
pub mod metrics;
/// Rate curves: elapsed time in, target RPS out.
pub mod rate;
/// Bounded per-second time series.
pub mod series;
/// The simulation runtime: dispatch, reporting, lifecycle.
pub mod simulation;

pub use config::{LoadPattern, ScaleMode, SimulationConfig};
pub use engine::{Engine, RunId};
pub use error::{ConfigError, EngineError, RequestError};
pub use metrics::{Counters, LatencySummary, RunReport};
pub use series::TimeSeriesPoint;
pub use simulation::{RunState, Simulation, StatusSnapshot};
