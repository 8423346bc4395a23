//! One executed (program, example) pair and its outcome.

use indexmap::IndexMap;
use serde_json::Value;

use crate::program::{Example, FieldMap, Program};

/// The result of running one program against one example.
///
/// Invariant, enforced at construction: `success == false ⇒ score == 0.0`. Once built,
/// a `Trajectory` is never mutated — buckets and strategies only read it.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub program: Program,
    pub example: Example,
    pub inputs: FieldMap,
    pub outputs: FieldMap,
    pub score: f32,
    pub success: bool,
    pub duration_ms: Option<u64>,
    pub model_config: IndexMap<String, Value>,
    pub error: Option<String>,
    pub metadata: IndexMap<String, Value>,
}

impl Trajectory {
    /// Builds a trajectory for a successful execution, clamping `score` into `[0, 1]`.
    pub fn success(
        program: Program,
        example: Example,
        outputs: FieldMap,
        score: f32,
        duration_ms: u64,
        model_config: IndexMap<String, Value>,
    ) -> Self {
        let inputs = example.inputs.clone();
        Self {
            program,
            example,
            inputs,
            outputs,
            score: score.clamp(0.0, 1.0),
            success: true,
            duration_ms: Some(duration_ms),
            model_config,
            error: None,
            metadata: IndexMap::new(),
        }
    }

    /// Builds a trajectory for a failed execution. `score` is forced to `0.0` regardless
    /// of what the caller passes, matching the "success = false ⇒ score = 0" invariant.
    pub fn failure(
        program: Program,
        example: Example,
        error: impl Into<String>,
        duration_ms: Option<u64>,
        model_config: IndexMap<String, Value>,
    ) -> Self {
        let inputs = example.inputs.clone();
        Self {
            program,
            example,
            inputs,
            outputs: FieldMap::new(),
            score: 0.0,
            success: false,
            duration_ms,
            model_config,
            error: Some(error.into()),
            metadata: IndexMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::SignatureRef;
    use indexmap::IndexMap as Map;

    fn program() -> Program {
        Program::new(
            SignatureRef::new("QA", ["question"], ["answer"]),
            "Answer.",
            vec![],
            Map::new(),
        )
    }

    fn example() -> Example {
        Example::new(
            FieldMap::from([("question".to_string(), Value::from("2+2"))]),
            FieldMap::from([("answer".to_string(), Value::from("4"))]),
        )
    }

    #[test]
    fn success_clamps_score_into_unit_interval() {
        let t = Trajectory::success(program(), example(), FieldMap::new(), 1.4, 12, Map::new());
        assert_eq!(t.score, 1.0);
        assert!(t.success);
        assert!(t.error.is_none());
    }

    #[test]
    fn failure_forces_score_to_zero() {
        let t = Trajectory::failure(program(), example(), "timeout", Some(5), Map::new());
        assert_eq!(t.score, 0.0);
        assert!(!t.success);
        assert_eq!(t.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn inputs_mirror_example_inputs() {
        let t = Trajectory::success(program(), example(), FieldMap::new(), 0.5, 1, Map::new());
        assert_eq!(t.inputs, t.example.inputs);
    }
}
