//! The user-supplied scoring function, wrapped to be total.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use crate::program::Example;

/// `(example, outputs) -> [0,1]`. The caller-provided callable may be partial (it may
/// panic); [`Metric::score`] is the total wrapper every other component calls.
#[derive(Clone)]
pub struct Metric {
    inner: Arc<dyn Fn(&Example, &IndexMap<String, Value>) -> f64 + Send + Sync>,
}

impl Metric {
    pub fn new(f: impl Fn(&Example, &IndexMap<String, Value>) -> f64 + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(f) }
    }

    /// Evaluates the metric, clamping into `[0, 1]` and catching any panic as a score
    /// of `0.0` so one malformed example can never abort a run.
    pub fn score(&self, example: &Example, outputs: &IndexMap<String, Value>) -> f32 {
        let inner = &self.inner;
        match catch_unwind(AssertUnwindSafe(|| inner(example, outputs))) {
            Ok(score) => score.clamp(0.0, 1.0) as f32,
            Err(_) => {
                warn!(event = "metric_panicked");
                0.0
            }
        }
    }

    /// Smoke-tests the metric once against the first trainset example with empty
    /// outputs, simulating the worst case a malformed completion can produce. A metric
    /// that panics even on this call is rejected up front instead of silently scoring
    /// `0.0` on every trajectory for the whole run.
    pub fn validate(&self, example: &Example) -> Result<(), String> {
        let inner = &self.inner;
        let placeholder = IndexMap::new();
        catch_unwind(AssertUnwindSafe(|| inner(example, &placeholder)))
            .map(|_| ())
            .map_err(|payload| {
                payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "metric panicked with a non-string payload".to_string())
            })
    }
}

/// Mean of an empty slice is `0.0`.
pub fn average_score(scores: &[f32]) -> f32 {
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f32>() / scores.len() as f32
    }
}
