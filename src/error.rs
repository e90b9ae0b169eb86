use thiserror::Error;

use crate::engine::RunId;

/// Configuration problems caught before a run is allowed to exist.
///
/// These are surfaced synchronously from [`Engine::start`](crate::Engine::start);
/// no simulation, task, or worker slot is allocated when one is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("simulation name must not be empty")]
    MissingName,
    #[error("target url must not be empty")]
    MissingUrl,
    #[error("max_rps must be greater than zero")]
    InvalidRps,
    #[error("min_rps must not exceed max_rps")]
    InvalidRpsRange,
    #[error("duration must be greater than zero")]
    InvalidDuration,
    #[error("concurrent_users must be greater than zero")]
    InvalidConcurrency,
    #[error("sample_interval must be greater than zero")]
    InvalidSampleInterval,
}

/// Errors returned by the engine's control surface.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no run with id {0}")]
    NotFound(RunId),
}

/// Per-request failures. None of these abort a run; each one is recorded as
/// exactly one failed-request increment and the run keeps dispatching.
#[derive(Debug, Error, Clone)]
pub enum RequestError {
    #[error("failed to build request: {0}")]
    Build(String),
    #[error("auth rejected request: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("validation failed: {0:?}")]
    Validation(Vec<String>),
}
