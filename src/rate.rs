//! Rate curves — pure functions from elapsed time to a target RPS.
//!
//! The dispatch loop calls [`target_rps`] once per tick to learn how many
//! request launches it should attempt. Everything here is side-effect free
//! and deterministic so curves can be unit-tested without a runtime and the
//! dispatch loop stays the single owner of all clocks.
//!
//! The independent variable of every curve is `progress`:
//!
//! ```text
//! progress = clamp(elapsed / duration, 0, 1)
//! ```
//!
//! Ticks that arrive after the nominal duration (scheduler jitter, drain)
//! therefore evaluate as `progress = 1` rather than extrapolating.
//!
//! Every curve floors its result at `min_rps` so no tick targets zero
//! throughput. The one exception is [`LoadPattern::Spike`]: its off-peak
//! valley sits at 10% of `max_rps` on purpose, which may be below `min_rps`.

use std::time::Duration;

use crate::config::{LoadPattern, ScaleMode};

/// Power-of-ten rungs used by [`ScaleMode::Step`].
const STEP_RUNGS: [f64; 7] = [1.0, 10.0, 100.0, 1e3, 1e4, 1e5, 1e6];

/// Half-width of the spike burst window, centered on `duration / 2`.
const SPIKE_HALF_WINDOW_SECS: f64 = 5.0;

/// Evaluate the configured curve at `elapsed`.
///
/// Pure: same inputs, same output. `min_rps`/`max_rps` are the configured
/// bounds, `ramp_up` only matters for [`LoadPattern::LinearRamp`].
pub fn target_rps(
    pattern: LoadPattern,
    scale_mode: ScaleMode,
    min_rps: f64,
    max_rps: f64,
    elapsed: Duration,
    duration: Duration,
    ramp_up: Duration,
) -> f64 {
    let progress = if duration.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
    };
    let span = max_rps - min_rps;

    let value = match pattern {
        LoadPattern::Constant => max_rps,
        LoadPattern::LinearRamp => {
            let ramp_progress = if ramp_up.is_zero() {
                1.0
            } else {
                (elapsed.as_secs_f64() / ramp_up.as_secs_f64()).clamp(0.0, 1.0)
            };
            min_rps + span * ramp_progress
        }
        LoadPattern::Exponential => exponential(min_rps, span, progress),
        LoadPattern::Logarithmic => logarithmic(min_rps, span, progress),
        LoadPattern::StepRamp => {
            // Ten plateaus: floor progress to the nearest tenth.
            let step_progress = (progress * 10.0).floor() / 10.0;
            min_rps + span * step_progress
        }
        LoadPattern::Spike => {
            let midpoint = duration.as_secs_f64() / 2.0;
            let t = elapsed.as_secs_f64().min(duration.as_secs_f64());
            if (t - midpoint).abs() <= SPIKE_HALF_WINDOW_SECS {
                max_rps
            } else {
                // Intentional valley; may sit below min_rps.
                return 0.1 * max_rps;
            }
        }
        LoadPattern::SineWave => {
            let amplitude = span / 2.0;
            let baseline = min_rps + amplitude;
            baseline + amplitude * (2.0 * std::f64::consts::PI * 3.0 * progress).sin()
        }
        LoadPattern::MegaScale => match scale_mode {
            ScaleMode::Linear => min_rps + span * progress,
            ScaleMode::Logarithmic => logarithmic(min_rps, span, progress),
            ScaleMode::Exponential => {
                if max_rps >= 1_000_000.0 {
                    // Steeper 10^x form so million-scale targets still show
                    // visible growth early in the run.
                    min_rps + span * (10f64.powf(6.0 * progress) - 1.0) / 999_999.0
                } else {
                    exponential(min_rps, span, progress)
                }
            }
            ScaleMode::Step => {
                let idx = ((progress * 6.0).floor() as usize).min(STEP_RUNGS.len() - 1);
                // Cap then floor, in that order: unlike f64::clamp this never
                // panics if a caller hands in an inverted range.
                STEP_RUNGS[idx].min(max_rps).max(min_rps)
            }
        },
    };

    value.max(min_rps)
}

/// `(e^p - 1) / (e - 1)` scaling: spans exactly [0, 1] over p in [0, 1].
fn exponential(min_rps: f64, span: f64, progress: f64) -> f64 {
    min_rps + span * (progress.exp() - 1.0) / (std::f64::consts::E - 1.0)
}

/// `log10(1 + 9p)` scaling: spans exactly [0, 1] over p in [0, 1].
fn logarithmic(min_rps: f64, span: f64, progress: f64) -> f64 {
    min_rps + span * (1.0 + 9.0 * progress).log10()
}
