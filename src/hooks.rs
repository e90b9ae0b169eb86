//! Collaborator seams consumed by the simulation core.
//!
//! The core treats auth, response validation, variable resolution, event
//! broadcast, and persistence as replaceable strategies behind these traits,
//! the way reporters are pluggable in a benchmark pipeline. Every trait ships
//! a no-op default so an engine works out of the box; real deployments swap
//! in their own implementations through [`Hooks`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::engine::RunId;
use crate::error::RequestError;
use crate::simulation::StatusSnapshot;

/// Attaches credentials to an outgoing request.
///
/// Errors are counted as a per-request failure, never as a run failure.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn apply(&self, request: &mut reqwest::Request, run_id: RunId)
    -> Result<(), RequestError>;
}

/// Default auth: leave the request untouched.
pub struct NoAuth;

#[async_trait]
impl AuthProvider for NoAuth {
    async fn apply(&self, _: &mut reqwest::Request, _: RunId) -> Result<(), RequestError> {
        Ok(())
    }
}

/// Result of a response validation pass.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            errors: Vec::new(),
        }
    }

    pub fn fail(errors: Vec<String>) -> Self {
        Self {
            passed: false,
            errors,
        }
    }
}

/// Inspects a completed response. A failed validation counts exactly like an
/// HTTP error; the failure details travel to subscribers via the broadcaster.
#[async_trait]
pub trait ResponseValidator: Send + Sync {
    async fn validate(&self, status: u16, body: &str, elapsed: Duration) -> ValidationOutcome;
}

/// Default validator: everything passes. The client already turns non-2xx
/// statuses into request failures before validation runs.
pub struct AcceptAll;

#[async_trait]
impl ResponseValidator for AcceptAll {
    async fn validate(&self, _: u16, _: &str, _: Duration) -> ValidationOutcome {
        ValidationOutcome::pass()
    }
}

/// Pure string transform applied to URL, headers, and body templates before
/// each request. No side effects visible to the core.
pub trait VariableResolver: Send + Sync {
    fn resolve(&self, template: &str) -> String;
}

/// Default resolver: templates pass through unchanged.
pub struct IdentityResolver;

impl VariableResolver for IdentityResolver {
    fn resolve(&self, template: &str) -> String {
        template.to_string()
    }
}

/// Event kinds pushed to subscribers over a run's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    Progress,
    RequestFailed,
    RunFinished,
}

/// One fire-and-forget event. Payload shape depends on the kind.
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    pub kind: EventKind,
    pub run_id: RunId,
    pub payload: Value,
}

impl RunEvent {
    pub fn new(kind: EventKind, run_id: RunId, payload: Value) -> Self {
        Self {
            kind,
            run_id,
            payload,
        }
    }
}

/// Fan-out of run events. `publish` must never block: the core does not wait
/// for subscribers, and slow or absent subscribers must not distort the rate
/// loops.
pub trait Broadcaster: Send + Sync {
    fn publish(&self, event: RunEvent);
}

/// Default broadcaster: events vanish.
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn publish(&self, _: RunEvent) {}
}

/// Broadcast-channel fan-out. Lagging subscribers lose the oldest events
/// (the channel's lag semantics), which is the explicit drop policy here;
/// the sender never waits.
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<RunEvent>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, event: RunEvent) {
        // Err means no live subscriber; fire-and-forget either way.
        let _ = self.tx.send(event);
    }
}

/// Persists run snapshots: once at start, once at finalization. Failures are
/// logged by the caller and never fail the run.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn save(
        &self,
        snapshot: &StatusSnapshot,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Default store: nothing is persisted.
pub struct NoopStore;

#[async_trait]
impl RunStore for NoopStore {
    async fn save(
        &self,
        _: &StatusSnapshot,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

/// The collaborator bundle handed to every simulation an engine starts.
#[derive(Clone)]
pub struct Hooks {
    pub auth: Arc<dyn AuthProvider>,
    pub validator: Arc<dyn ResponseValidator>,
    pub resolver: Arc<dyn VariableResolver>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub store: Arc<dyn RunStore>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            auth: Arc::new(NoAuth),
            validator: Arc::new(AcceptAll),
            resolver: Arc::new(IdentityResolver),
            broadcaster: Arc::new(NoopBroadcaster),
            store: Arc::new(NoopStore),
        }
    }
}
