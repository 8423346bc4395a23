//! SIMBA: a stochastic introspective mini-batch ascent optimizer for LM programs.
//!
//! The entry point is [`Simba::configure`] plus the [`Optimizer::compile`] trait
//! method. A program is a signature handle, an instruction, and a list of few-shot
//! demos ([`Program`]); `compile` runs the mini-batch search described in the crate's
//! design notes and returns the best-scoring program it found.

pub mod adapter;
pub mod bucket;
pub mod error;
pub mod evaluate;
pub mod executor;
pub mod lm;
pub mod optimizer;
pub mod program;
pub mod strategy;
pub mod telemetry;
pub mod trajectory;

pub use adapter::{ChatAdapter, SimpleChatAdapter};
pub use bucket::Bucket;
pub use error::{AdapterError, ClientError, CompileError, ExecutorError};
pub use evaluate::{average_score, Metric};
pub use executor::{Executor, ExecutorOutcome};
pub use lm::{
    ChatMessage, ChatOptions, ChatRequest, ChatResponse, LmClient, LmClientConfig, Provider,
    ProviderTransport, TestTransport,
};
pub use optimizer::{Optimizer, ProgressEvent, ProgressPhase, Simba, SimbaConfig};
pub use program::{
    Capability, Demo, DemoMetadata, EnhancementMode, Example, FieldMap, OptimizedProgram,
    OptimizationStats, Program, ProgramId, SignatureRef,
};
pub use strategy::{AppendDemo, AppendRule, Strategy, StrategyContext, StrategyOutcome};
pub use telemetry::{init_tracing, truncate, CorrelationId};
pub use trajectory::Trajectory;
