//! The per-request unit of work.
//!
//! A [`RequestClient`] is what one worker slot executes once it is granted.
//! The HTTP implementation lives here; tests substitute stub clients with a
//! fixed latency, which is also how the backpressure properties are verified
//! without a network. Heavy state (the connection pool) is built once per run,
//! never inside the hot path.

use async_trait::async_trait;

use crate::config::SimulationConfig;
use crate::engine::RunId;
use crate::error::RequestError;
use crate::hooks::Hooks;

/// One request execution: build, resolve, authenticate, send, validate.
///
/// `Ok(())` counts as a success, any error as a failure; the caller records
/// exactly one of the two and one latency sample per call.
#[async_trait]
pub trait RequestClient: Send + Sync {
    async fn execute(&self, run_id: RunId) -> Result<(), RequestError>;
}

/// Default client: real HTTP via a pooled connection client.
pub struct HttpRequestClient {
    client: reqwest::Client,
    config: SimulationConfig,
    hooks: Hooks,
}

impl HttpRequestClient {
    pub fn new(config: SimulationConfig, hooks: Hooks) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            hooks,
        }
    }
}

#[async_trait]
impl RequestClient for HttpRequestClient {
    async fn execute(&self, run_id: RunId) -> Result<(), RequestError> {
        let resolver = &self.hooks.resolver;
        let url = resolver.resolve(&self.config.url);
        let method = reqwest::Method::from_bytes(self.config.method.as_bytes())
            .map_err(|e| RequestError::Build(e.to_string()))?;

        let mut builder = self.client.request(method, &url);
        for (name, value) in &self.config.headers {
            builder = builder.header(name.as_str(), resolver.resolve(value));
        }
        if let Some(body) = &self.config.body {
            builder = builder.body(resolver.resolve(body));
        }
        let mut request = builder
            .build()
            .map_err(|e| RequestError::Build(e.to_string()))?;

        self.hooks.auth.apply(&mut request, run_id).await?;

        let started = tokio::time::Instant::now();
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| RequestError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RequestError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(RequestError::Status(status.as_u16()));
        }

        let outcome = self
            .hooks
            .validator
            .validate(status.as_u16(), &body, started.elapsed())
            .await;
        if !outcome.passed {
            return Err(RequestError::Validation(outcome.errors));
        }
        Ok(())
    }
}
