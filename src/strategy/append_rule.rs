//! Contrasts the best and worst trajectories in a bucket and asks an LLM to synthesize
//! an instruction refinement (§4.7).

use async_trait::async_trait;

use crate::bucket::Bucket;
use crate::lm::{ChatMessage, ChatOptions};
use crate::program::Program;
use crate::strategy::{Strategy, StrategyContext, StrategyOutcome};
use crate::trajectory::Trajectory;

const OVERRIDE_TEMPERATURE: f32 = 0.3;
const MIN_ADVICE_LEN: usize = 10;

fn format_trajectory(label: &str, trajectory: &Trajectory) -> String {
    format!(
        "[{label}] Input: {:?} Output: {:?} Score: {} Success: {} Error: {}",
        trajectory.inputs,
        trajectory.outputs,
        trajectory.score,
        trajectory.success,
        trajectory.error.as_deref().unwrap_or("none"),
    )
}

/// Renders a program summary for the feedback prompt: no reflection, just the
/// signature's field lists and current instruction as plain text.
fn program_code(source: &Program) -> String {
    format!(
        "{}({}) -> {}\ninstruction: {}\ndemos: {}",
        source.signature_ref.name,
        source.signature_ref.input_fields.join(", "),
        source.signature_ref.output_fields.join(", "),
        source.instruction,
        source.demos.len(),
    )
}

fn modules_defn(source: &Program) -> String {
    format!(
        "Input Fields: {}\nOutput Fields: {}",
        source.signature_ref.input_fields.join(", "),
        source.signature_ref.output_fields.join(", "),
    )
}

/// Invokes the client through an internal `OfferFeedback` prompt and folds any returned
/// advice into the source program's instruction.
#[derive(Debug, Clone, Default)]
pub struct AppendRule;

impl AppendRule {
    pub fn new() -> Self {
        Self
    }

    fn extract_advice(raw: &str) -> Option<String> {
        let parsed: serde_json::Value = serde_json::from_str(raw).ok()?;
        let object = parsed.as_object()?;
        let advice = object
            .get("main")
            .and_then(|v| v.as_str())
            .or_else(|| object.values().next().and_then(|v| v.as_str()))?;
        Some(advice.to_string())
    }
}

#[async_trait]
impl Strategy for AppendRule {
    fn name(&self) -> &'static str {
        "append_rule"
    }

    fn applicable(&self, bucket: &Bucket, _ctx: &StrategyContext<'_>) -> bool {
        bucket.trajectories.len() >= 2 && bucket.has_successes_and_failures()
    }

    async fn apply(
        &self,
        bucket: &Bucket,
        source: &Program,
        ctx: &mut StrategyContext<'_>,
    ) -> StrategyOutcome {
        if !source.supports(crate::program::Capability::Instruction) {
            return StrategyOutcome::skip("source program does not support instruction mutation");
        }

        let better = bucket
            .trajectories
            .iter()
            .filter(|t| t.success)
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        let worse = bucket
            .trajectories
            .iter()
            .filter(|t| !t.success)
            .min_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));

        let (Some(better), Some(worse)) = (better, worse) else {
            return StrategyOutcome::skip("bucket lacks both a success and a failure");
        };

        let prompt = format!(
            "You are refining an instruction for this program:\n{}\n\nFields:\n{}\n\nBetter trajectory:\n{}\n\nWorse trajectory:\n{}\n\nReply as a JSON object with a single key \"main\" holding concrete, actionable advice.",
            program_code(source),
            modules_defn(source),
            format_trajectory("better", better),
            format_trajectory("worse", worse),
        );

        let options = ChatOptions {
            temperature: Some(OVERRIDE_TEMPERATURE),
            ..ChatOptions::default()
        };

        let response = match ctx
            .client
            .complete(vec![ChatMessage::user(prompt)], options)
            .await
        {
            Ok(response) => response,
            Err(e) => return StrategyOutcome::skip(format!("offer_feedback call failed: {e}")),
        };

        let raw = response.content().unwrap_or_default();
        let advice = match Self::extract_advice(raw) {
            Some(advice) if advice.trim().chars().count() > MIN_ADVICE_LEN => advice,
            _ => return StrategyOutcome::skip("no meaningful advice"),
        };

        let new_instruction = if source.instruction.is_empty() {
            advice
        } else {
            format!("{}\n\nAdditional guidance: {}", source.instruction, advice)
        };

        StrategyOutcome::Applied(source.with_instruction(new_instruction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::{ChatResponse, LmClient, LmClientConfig, Provider};
    use crate::program::{Example, FieldMap, SignatureRef};
    use indexmap::IndexMap as Map;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::Value;
    use std::sync::Arc;

    fn arithmetic_program() -> Program {
        Program::new(
            SignatureRef::new("QA", ["question"], ["answer"]),
            "Answer the question.",
            vec![],
            Map::new(),
        )
    }

    fn mixed_bucket() -> Bucket {
        let program = arithmetic_program();
        let good_example = Example::new(
            FieldMap::from([("question".to_string(), Value::from("2+2"))]),
            FieldMap::new(),
        );
        let bad_example = Example::new(
            FieldMap::from([("question".to_string(), Value::from("3+3"))]),
            FieldMap::new(),
        );
        let good = Trajectory::success(
            program.clone(),
            good_example,
            FieldMap::from([("answer".to_string(), Value::from("4"))]),
            1.0,
            10,
            Map::new(),
        );
        let bad = Trajectory::failure(program, bad_example, "wrong answer", None, Map::new());
        Bucket::new(vec![good, bad])
    }

    async fn ctx_with_client<'a>(rng: &'a mut StdRng, client: Arc<LmClient>) -> StrategyContext<'a> {
        StrategyContext {
            max_demos: 4,
            demo_input_field_maxlen: 1000,
            quality_threshold: 0.7,
            rng,
            client,
            correlation_id: crate::telemetry::CorrelationId::new(),
        }
    }

    #[tokio::test]
    async fn applies_and_folds_advice_into_instruction() {
        let config = LmClientConfig::builder()
            .provider(Provider::Test)
            .model("dummy")
            .cache(false)
            .build();
        let client = Arc::new(LmClient::new(config).await.unwrap());
        client
            .test_transport()
            .unwrap()
            .push_response(ChatResponse::single(r#"{"main": "Double-check arithmetic."}"#))
            .await;

        let mut rng = StdRng::seed_from_u64(1);
        let bucket = mixed_bucket();
        let source = arithmetic_program();
        let mut context = ctx_with_client(&mut rng, client).await;

        let outcome = AppendRule::new().apply(&bucket, &source, &mut context).await;
        match outcome {
            StrategyOutcome::Applied(program) => {
                assert!(program.instruction.contains("arithmetic"));
                assert_ne!(program.instruction, source.instruction);
                assert_eq!(program.demos, source.demos);
                assert_eq!(program.model_config, source.model_config);
            }
            StrategyOutcome::Skip(reason) => panic!("expected Applied, got Skip({reason})"),
        }
    }

    #[tokio::test]
    async fn skips_on_empty_advice() {
        let config = LmClientConfig::builder()
            .provider(Provider::Test)
            .model("dummy")
            .cache(false)
            .build();
        let client = Arc::new(LmClient::new(config).await.unwrap());
        client
            .test_transport()
            .unwrap()
            .push_response(ChatResponse::single(r#"{"main": "ok"}"#))
            .await;

        let mut rng = StdRng::seed_from_u64(1);
        let bucket = mixed_bucket();
        let source = arithmetic_program();
        let mut context = ctx_with_client(&mut rng, client).await;

        let outcome = AppendRule::new().apply(&bucket, &source, &mut context).await;
        assert!(matches!(outcome, StrategyOutcome::Skip(_)));
    }

    #[tokio::test]
    async fn not_applicable_without_both_outcomes() {
        let program = arithmetic_program();
        let example = Example::new(FieldMap::new(), FieldMap::new());
        let only_success = Bucket::new(vec![Trajectory::success(
            program,
            example,
            FieldMap::new(),
            1.0,
            1,
            Map::new(),
        )]);
        let mut rng = StdRng::seed_from_u64(1);
        let config = LmClientConfig::builder()
            .provider(Provider::Test)
            .model("dummy")
            .build();
        let client = LmClient::new(config).await.unwrap();
        let context = StrategyContext {
            max_demos: 4,
            demo_input_field_maxlen: 1000,
            quality_threshold: 0.7,
            rng: &mut rng,
            client: Arc::new(client),
            correlation_id: crate::telemetry::CorrelationId::new(),
        };
        assert!(!AppendRule::new().applicable(&only_success, &context));
    }
}
