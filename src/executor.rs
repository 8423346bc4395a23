//! Evaluates one program against one example, wrapping adapter + client.

use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::instrument;

use crate::adapter::{ChatAdapter, SimpleChatAdapter};
use crate::error::{AdapterError, ExecutorError};
use crate::lm::{ChatOptions, LmClient};
use crate::program::{Example, Program};

/// The result of one `forward` call: the parsed outputs plus wall-clock duration.
#[derive(Debug, Clone)]
pub struct ExecutorOutcome {
    pub outputs: IndexMap<String, Value>,
    pub duration_ms: u64,
}

/// Renders a program's prompt, calls the client, and parses the response — pure with
/// respect to the program (no mutation; failures never panic, they return `Err`).
pub struct Executor {
    client: Arc<LmClient>,
    adapter: Arc<dyn ChatAdapter>,
}

impl Executor {
    pub fn new(client: Arc<LmClient>) -> Self {
        Self {
            client,
            adapter: Arc::new(SimpleChatAdapter::new()),
        }
    }

    pub fn with_adapter(client: Arc<LmClient>, adapter: Arc<dyn ChatAdapter>) -> Self {
        Self { client, adapter }
    }

    /// Validates `example.inputs` covers the signature's input fields, renders the
    /// prompt, dispatches through the client, and parses the response.
    #[instrument(skip(self, program, example, options))]
    pub async fn forward(
        &self,
        program: &Program,
        example: &Example,
        options: ChatOptions,
    ) -> Result<ExecutorOutcome, ExecutorError> {
        for field in &program.signature_ref.input_fields {
            if !example.inputs.contains_key(field) {
                return Err(ExecutorError::Adapter(AdapterError::MissingInput {
                    field: field.clone(),
                }));
            }
        }

        let messages = self.adapter.format(
            &program.signature_ref,
            &program.instruction,
            &program.demos,
            example,
        );

        let started = Instant::now();
        let response = self.client.complete(messages, options).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let content = response.content().unwrap_or_default();
        let outputs = self.adapter.parse(&program.signature_ref, content)?;

        Ok(ExecutorOutcome { outputs, duration_ms })
    }
}
