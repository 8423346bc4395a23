//! The program model: signature handles, demos, and the two program shapes
//! ([`Program`] and [`OptimizedProgram`]) that strategies mutate.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable handle to signature metadata, owned by an external signature DSL/parser.
///
/// The core never validates field types or parses instructions from this; it only
/// reads the field-name lists to check demo/example shape and to render prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRef {
    pub name: String,
    pub input_fields: Vec<String>,
    pub output_fields: Vec<String>,
}

impl SignatureRef {
    pub fn new(
        name: impl Into<String>,
        input_fields: impl IntoIterator<Item = impl Into<String>>,
        output_fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            input_fields: input_fields.into_iter().map(Into::into).collect(),
            output_fields: output_fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// A mapping from field name to value, preserving insertion order (field order matters
/// for prompt rendering, so this is an [`IndexMap`], not a [`std::collections::HashMap`]).
pub type FieldMap = IndexMap<String, Value>;

/// Provenance attached to a [`Demo`] minted by a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoMetadata {
    pub origin_score: f32,
    pub created_at: DateTime<Utc>,
    pub strategy: String,
}

/// A few-shot example embedded in a program's prompt.
///
/// Invariant: `keys(inputs) == input_keys`, and both `input_keys` and `keys(outputs)`
/// are subsets of the owning signature's field lists — enforced by [`Demo::new`], not
/// by any later mutation (`Demo` has no setters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demo {
    pub inputs: FieldMap,
    pub outputs: FieldMap,
    pub input_keys: IndexSet<String>,
    pub metadata: Option<DemoMetadata>,
}

impl Demo {
    pub fn new(inputs: FieldMap, outputs: FieldMap) -> Self {
        let input_keys = inputs.keys().cloned().collect();
        Self {
            inputs,
            outputs,
            input_keys,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: DemoMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A training datum with ground-truth outputs, shaped like a [`Demo`] but used to
/// compute scores via the user metric rather than to seed a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub inputs: FieldMap,
    pub outputs: FieldMap,
}

impl Example {
    pub fn new(inputs: FieldMap, outputs: FieldMap) -> Self {
        Self { inputs, outputs }
    }
}

/// A mutation capability a program exposes to strategies.
///
/// Strategies consult [`Program::supports`]/[`OptimizedProgram::supports`] to decide
/// which [`EnhancementMode`] applies before mutating — see §4.1/§4.6/§4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Demos,
    Instruction,
}

/// How a strategy materializes a mutation, discovered from the source program's
/// capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhancementMode {
    /// Replace `demos` on a program that already carries a `demos` field.
    NativeDemos,
    /// Set both `demos` and `instruction` on a program that carries both.
    NativeFull,
    /// Wrap the inner program in an [`OptimizedProgram`] because it lacks a field for
    /// the new state (never happens for [`Program`]/[`OptimizedProgram`] as defined in
    /// this crate, since both natively carry demos and instruction; retained because the
    /// strategy protocol must support programs that don't).
    WrapOptimized,
}

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-lifetime identity for a program, used as the ledger key and for selection
/// tie-breaking ("earliest admission wins").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProgramId(u64);

impl ProgramId {
    fn next() -> Self {
        Self(NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Immutable signature + instruction + demos + model config.
///
/// Mutation always produces a new value with a fresh [`ProgramId`] — there are no
/// setters. `demos.len() <= max_demos` is an invariant maintained by callers (the
/// [`AppendDemo`](crate::AppendDemo) strategy enforces it via eviction, §4.6); `Program`
/// itself does not silently truncate on construction, matching §4.1's "failure: ...
/// not here".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    #[serde(skip, default = "ProgramId::next")]
    pub id: ProgramId,
    pub signature_ref: SignatureRef,
    pub instruction: String,
    pub demos: Vec<Demo>,
    pub model_config: IndexMap<String, Value>,
}

impl Program {
    pub fn new(
        signature_ref: SignatureRef,
        instruction: impl Into<String>,
        demos: Vec<Demo>,
        model_config: IndexMap<String, Value>,
    ) -> Self {
        Self {
            id: ProgramId::next(),
            signature_ref,
            instruction: instruction.into(),
            demos,
            model_config,
        }
    }

    pub fn with_demos(&self, demos: Vec<Demo>) -> Self {
        Self {
            id: ProgramId::next(),
            signature_ref: self.signature_ref.clone(),
            instruction: self.instruction.clone(),
            demos,
            model_config: self.model_config.clone(),
        }
    }

    pub fn with_instruction(&self, instruction: impl Into<String>) -> Self {
        Self {
            id: ProgramId::next(),
            signature_ref: self.signature_ref.clone(),
            instruction: instruction.into(),
            demos: self.demos.clone(),
            model_config: self.model_config.clone(),
        }
    }

    pub fn with_demos_and_instruction(
        &self,
        demos: Vec<Demo>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            id: ProgramId::next(),
            signature_ref: self.signature_ref.clone(),
            instruction: instruction.into(),
            demos,
            model_config: self.model_config.clone(),
        }
    }

    pub fn with_model_config(&self, model_config: IndexMap<String, Value>) -> Self {
        Self {
            id: ProgramId::next(),
            signature_ref: self.signature_ref.clone(),
            instruction: self.instruction.clone(),
            demos: self.demos.clone(),
            model_config,
        }
    }

    /// A bare [`Program`] natively carries both demos and an instruction.
    pub fn supports(&self, capability: Capability) -> bool {
        matches!(capability, Capability::Demos | Capability::Instruction)
    }

    pub fn enhancement_mode(&self, capability: Capability) -> EnhancementMode {
        match capability {
            Capability::Demos => EnhancementMode::NativeDemos,
            Capability::Instruction => EnhancementMode::NativeFull,
        }
    }
}

/// Arbitrary, serializable optimizer bookkeeping attached by [`OptimizedProgram`].
pub type OptimizationStats = IndexMap<String, Value>;

/// Wraps an inner [`Program`] with optimizer provenance: which method produced it, the
/// score that earned it a place in the candidate pool, and free-form stats.
///
/// Exposes the same read surface as [`Program`] (signature, instruction, demos, model
/// config) plus [`OptimizedProgram::metadata`]; strategies treat it identically to a
/// bare `Program` except when deciding on [`EnhancementMode::WrapOptimized`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedProgram {
    pub inner: Program,
    pub optimization_method: String,
    pub optimization_score: f32,
    pub stats: OptimizationStats,
}

impl OptimizedProgram {
    pub fn new(inner: Program, optimization_method: impl Into<String>, optimization_score: f32) -> Self {
        Self {
            inner,
            optimization_method: optimization_method.into(),
            optimization_score,
            stats: OptimizationStats::new(),
        }
    }

    pub fn id(&self) -> ProgramId {
        self.inner.id
    }

    pub fn signature_ref(&self) -> &SignatureRef {
        &self.inner.signature_ref
    }

    pub fn instruction(&self) -> &str {
        &self.inner.instruction
    }

    pub fn demos(&self) -> &[Demo] {
        &self.inner.demos
    }

    pub fn model_config(&self) -> &IndexMap<String, Value> {
        &self.inner.model_config
    }

    pub fn metadata(&self) -> &OptimizationStats {
        &self.stats
    }

    pub fn with_stat(mut self, key: impl Into<String>, value: Value) -> Self {
        self.stats.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qa_signature() -> SignatureRef {
        SignatureRef::new("QA", ["question"], ["answer"])
    }

    #[test]
    fn with_demos_produces_a_new_identity() {
        let p = Program::new(qa_signature(), "Answer concisely.", vec![], IndexMap::new());
        let demo = Demo::new(
            FieldMap::from([("question".to_string(), Value::from("2+2?"))]),
            FieldMap::from([("answer".to_string(), Value::from("4"))]),
        );
        let mutated = p.with_demos(vec![demo]);

        assert_ne!(p.id, mutated.id);
        assert_eq!(mutated.instruction, p.instruction);
        assert_eq!(mutated.demos.len(), 1);
        assert!(p.demos.is_empty());
    }

    #[test]
    fn with_instruction_preserves_demos_and_config() {
        let mut model_config = IndexMap::new();
        model_config.insert("temperature".to_string(), Value::from(0.5));
        let p = Program::new(qa_signature(), "v1", vec![], model_config.clone());

        let mutated = p.with_instruction("v2");

        assert_eq!(mutated.instruction, "v2");
        assert_eq!(mutated.model_config, model_config);
        assert_eq!(mutated.demos, p.demos);
    }

    #[test]
    fn demo_input_keys_match_inputs() {
        let demo = Demo::new(
            FieldMap::from([("question".to_string(), Value::from("x"))]),
            FieldMap::from([("answer".to_string(), Value::from("y"))]),
        );
        assert_eq!(demo.input_keys.len(), 1);
        assert!(demo.input_keys.contains("question"));
    }

    #[test]
    fn optimized_program_exposes_inner_read_surface() {
        let p = Program::new(qa_signature(), "v1", vec![], IndexMap::new());
        let wrapped = OptimizedProgram::new(p.clone(), "append_demo", 0.8)
            .with_stat("note", Value::from("ok"));

        assert_eq!(wrapped.instruction(), p.instruction);
        assert_eq!(wrapped.optimization_score, 0.8);
        assert_eq!(wrapped.metadata().get("note").unwrap(), "ok");
    }
}
