//! Run configuration: the immutable description of one load-generation run.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::ConfigError;

/// Shape of the rate curve over the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPattern {
    /// Hold `max_rps` for the whole run.
    Constant,
    /// Ramp linearly from `min_rps` to `max_rps` over `ramp_up`, then hold.
    LinearRamp,
    /// Exponential growth, normalized to reach `max_rps` at the end of the run.
    Exponential,
    /// Fast early growth that flattens out, `log10`-shaped.
    Logarithmic,
    /// Ten discrete plateaus between `min_rps` and `max_rps`.
    StepRamp,
    /// A 10-second burst to `max_rps` around the midpoint, 10% of max elsewhere.
    Spike,
    /// Three full sine cycles oscillating between `min_rps` and `max_rps`.
    SineWave,
    /// Curve chosen by [`ScaleMode`], tuned for spanning 1 RPS to millions.
    MegaScale,
}

/// Curve family used by [`LoadPattern::MegaScale`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    #[default]
    Linear,
    Logarithmic,
    Exponential,
    /// Snap to power-of-ten rungs (1, 10, ... 1e6), clamped to the configured range.
    Step,
}

/// Everything a run needs to know, fixed before the first tick.
///
/// The target body is an opaque template string; variable resolution and body
/// encoding happen in the request client, not here.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct SimulationConfig {
    #[builder(setter(into))]
    pub name: String,
    #[builder(setter(into))]
    pub url: String,
    #[builder(default = "GET".to_string(), setter(into))]
    pub method: String,
    #[builder(default)]
    pub headers: HashMap<String, String>,
    #[builder(default, setter(into, strip_option))]
    pub body: Option<String>,

    /// Floor of the rate curve. Zero is coerced to 1 during validation so
    /// curves never target zero throughput.
    #[builder(default = 1)]
    pub min_rps: u64,
    pub max_rps: u64,
    #[builder(default = LoadPattern::Constant)]
    pub pattern: LoadPattern,
    #[builder(default)]
    pub scale_mode: ScaleMode,
    pub duration: Duration,
    #[builder(default = Duration::from_secs(10))]
    pub ramp_up: Duration,

    /// Worker-pool capacity; caps concurrently in-flight requests.
    pub concurrent_users: usize,
    /// Cadence of the reporting loop.
    #[builder(default = Duration::from_secs(1))]
    pub sample_interval: Duration,
}

impl SimulationConfig {
    /// Check invariants and normalize defaults. Called by the engine before
    /// any resources are allocated; a failing config never becomes a run.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        if self.max_rps == 0 {
            return Err(ConfigError::InvalidRps);
        }
        if self.duration.is_zero() {
            return Err(ConfigError::InvalidDuration);
        }
        if self.concurrent_users == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.sample_interval.is_zero() {
            return Err(ConfigError::InvalidSampleInterval);
        }
        if self.min_rps == 0 {
            self.min_rps = 1;
        }
        if self.min_rps > self.max_rps {
            return Err(ConfigError::InvalidRpsRange);
        }
        Ok(())
    }
}
