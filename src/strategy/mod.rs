//! The pluggable mutation protocol: given a bucket + source program, mint a new
//! candidate program or skip.

pub mod append_demo;
pub mod append_rule;

use async_trait::async_trait;
use rand::rngs::StdRng;
use std::sync::Arc;

use crate::bucket::Bucket;
use crate::lm::LmClient;
use crate::program::Program;
use crate::telemetry::CorrelationId;

pub use append_demo::AppendDemo;
pub use append_rule::AppendRule;

/// Knobs and shared resources strategies need, threaded through sequentially (strategies
/// never run concurrently with each other within one step, so a `&mut` RNG is enough).
pub struct StrategyContext<'a> {
    pub max_demos: usize,
    pub demo_input_field_maxlen: usize,
    pub quality_threshold: f32,
    pub rng: &'a mut StdRng,
    pub client: Arc<LmClient>,
    pub correlation_id: CorrelationId,
}

/// The result of one `Strategy::apply` call: either a new candidate, or a reason the
/// strategy declined — never a partial mutation.
#[derive(Debug, Clone)]
pub enum StrategyOutcome {
    Applied(Program),
    Skip(String),
}

impl StrategyOutcome {
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip(reason.into())
    }
}

/// One pluggable mutation. Implementations must be pure with respect to their inputs;
/// any LLM-side effects go through `ctx.client`, which is idempotent per cache key.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn applicable(&self, bucket: &Bucket, ctx: &StrategyContext<'_>) -> bool;

    async fn apply(
        &self,
        bucket: &Bucket,
        source: &Program,
        ctx: &mut StrategyContext<'_>,
    ) -> StrategyOutcome;
}

/// Walks `strategies` in order against `bucket`, applying the first one whose
/// `applicable` returns `true` and whose `apply` yields `Applied`. No two strategies are
/// applied to the same bucket in one step.
pub async fn apply_first_match(
    strategies: &[Arc<dyn Strategy>],
    bucket: &Bucket,
    source: &Program,
    ctx: &mut StrategyContext<'_>,
) -> StrategyOutcome {
    for strategy in strategies {
        if !strategy.applicable(bucket, ctx) {
            continue;
        }
        match strategy.apply(bucket, source, ctx).await {
            StrategyOutcome::Applied(program) => {
                tracing::info!(event = "strategy_applied", strategy = strategy.name());
                return StrategyOutcome::Applied(program);
            }
            StrategyOutcome::Skip(reason) => {
                tracing::debug!(event = "strategy_skipped", strategy = strategy.name(), reason = %reason);
            }
        }
    }
    StrategyOutcome::skip("no strategy applied")
}
