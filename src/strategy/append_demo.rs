//! Turns a successful trajectory into a new demonstration, probabilistically pruning
//! old demos as the set fills (§4.6).

use async_trait::async_trait;
use chrono::Utc;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Poisson};
use serde_json::Value;

use crate::bucket::Bucket;
use crate::program::{Demo, DemoMetadata, FieldMap, Program};
use crate::strategy::{Strategy, StrategyContext, StrategyOutcome};
use crate::telemetry::truncate;

/// Mints a demo from the bucket's best trajectory once it clears `quality_threshold`.
#[derive(Debug, Clone, Default)]
pub struct AppendDemo;

impl AppendDemo {
    pub fn new() -> Self {
        Self
    }

    fn truncate_field(value: &Value, maxlen: usize) -> Value {
        match value {
            Value::String(s) => Value::from(truncate(s, maxlen)),
            other => other.clone(),
        }
    }

    /// `k = max(Poisson(n/M) sample, indicator[n >= M])`, clamped to `[0, n]`. Drops at
    /// least one demo once the set is full, and otherwise drops in expectation `n/M`.
    fn eviction_count(n: usize, m: usize, rng: &mut impl rand::Rng) -> usize {
        if n == 0 {
            return 0;
        }
        let lambda = (n as f64 / m.max(1) as f64).max(f64::MIN_POSITIVE);
        let poisson_draw = Poisson::new(lambda)
            .map(|dist| dist.sample(rng) as usize)
            .unwrap_or(0);
        let indicator = if n >= m { 1 } else { 0 };
        poisson_draw.max(indicator).min(n)
    }
}

#[async_trait]
impl Strategy for AppendDemo {
    fn name(&self) -> &'static str {
        "append_demo"
    }

    fn applicable(&self, bucket: &Bucket, ctx: &StrategyContext<'_>) -> bool {
        ctx.max_demos > 0 && bucket.best().success && bucket.best().score >= ctx.quality_threshold
    }

    async fn apply(
        &self,
        bucket: &Bucket,
        source: &Program,
        ctx: &mut StrategyContext<'_>,
    ) -> StrategyOutcome {
        if ctx.max_demos == 0 {
            return StrategyOutcome::skip("max_demos is 0");
        }

        let best = bucket.best();
        if !best.success || best.score < ctx.quality_threshold {
            return StrategyOutcome::skip("best trajectory is below the quality threshold");
        }

        let mut inputs = FieldMap::new();
        for (field, value) in &best.inputs {
            inputs.insert(field.clone(), Self::truncate_field(value, ctx.demo_input_field_maxlen));
        }
        let mut outputs = FieldMap::new();
        for (field, value) in &best.outputs {
            outputs.insert(field.clone(), Self::truncate_field(value, ctx.demo_input_field_maxlen));
        }

        let new_demo = Demo::new(inputs, outputs).with_metadata(DemoMetadata {
            origin_score: best.score,
            created_at: Utc::now(),
            strategy: self.name().to_string(),
        });

        let n = source.demos.len();
        let k = Self::eviction_count(n, ctx.max_demos, ctx.rng);

        let dropped: std::collections::HashSet<usize> = {
            let mut indices: Vec<usize> = (0..n).collect();
            let (picked, _) = indices.partial_shuffle(ctx.rng, k);
            picked.iter().copied().collect()
        };
        let remaining: Vec<Demo> = source
            .demos
            .iter()
            .enumerate()
            .filter(|(idx, _)| !dropped.contains(idx))
            .map(|(_, demo)| demo.clone())
            .collect();

        let mut new_demos = Vec::with_capacity(remaining.len() + 1);
        new_demos.push(new_demo);
        new_demos.extend(remaining);
        new_demos.truncate(ctx.max_demos);

        StrategyOutcome::Applied(source.with_demos(new_demos))
    }
}
