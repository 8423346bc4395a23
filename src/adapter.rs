//! The default prompt-rendering / response-parsing callback the executor invokes.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::AdapterError;
use crate::lm::chat::ChatMessage;
use crate::program::{Demo, Example, SignatureRef};

/// Renders `(instruction, demos, example)` into chat turns and parses a raw response
/// body back into a signature's output fields.
///
/// Richer, structured/typed adapters are an external collaborator; this trait is the
/// seam a caller swaps them in through, defaulting to [`SimpleChatAdapter`].
pub trait ChatAdapter: Send + Sync {
    fn format(
        &self,
        signature: &SignatureRef,
        instruction: &str,
        demos: &[Demo],
        example: &Example,
    ) -> Vec<ChatMessage>;

    fn parse(
        &self,
        signature: &SignatureRef,
        raw_response: &str,
    ) -> Result<IndexMap<String, Value>, AdapterError>;
}

/// The crate's shipped default: demos render as alternating user/assistant JSON-object
/// turns, and the final response is parsed as a strict JSON object first, falling back
/// to single-field passthrough when the signature has exactly one output field.
#[derive(Debug, Clone, Default)]
pub struct SimpleChatAdapter;

impl SimpleChatAdapter {
    pub fn new() -> Self {
        Self
    }

    fn render_fields(fields: &IndexMap<String, Value>) -> String {
        serde_json::to_string(fields).unwrap_or_else(|_| "{}".to_string())
    }
}

impl ChatAdapter for SimpleChatAdapter {
    fn format(
        &self,
        _signature: &SignatureRef,
        instruction: &str,
        demos: &[Demo],
        example: &Example,
    ) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(instruction)];

        for demo in demos {
            messages.push(ChatMessage::user(Self::render_fields(&demo.inputs)));
            messages.push(ChatMessage::assistant(Self::render_fields(&demo.outputs)));
        }

        messages.push(ChatMessage::user(Self::render_fields(&example.inputs)));
        messages
    }

    fn parse(
        &self,
        signature: &SignatureRef,
        raw_response: &str,
    ) -> Result<IndexMap<String, Value>, AdapterError> {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw_response) {
            return Ok(map.into_iter().collect());
        }

        if let [only_field] = signature.output_fields.as_slice() {
            let mut outputs = IndexMap::new();
            outputs.insert(only_field.clone(), Value::from(raw_response.trim()));
            return Ok(outputs);
        }

        Err(AdapterError::ParseFailed {
            reason: "response is not a JSON object and the signature has more than one output field".to_string(),
            raw_response: raw_response.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::FieldMap;

    fn qa_signature() -> SignatureRef {
        SignatureRef::new("QA", ["question"], ["answer"])
    }

    fn multi_output_signature() -> SignatureRef {
        SignatureRef::new("Sentiment", ["text"], ["sentiment", "reasoning"])
    }

    #[test]
    fn format_renders_demos_as_alternating_turns() {
        let adapter = SimpleChatAdapter::new();
        let demo = Demo::new(
            FieldMap::from([("question".to_string(), Value::from("1+1"))]),
            FieldMap::from([("answer".to_string(), Value::from("2"))]),
        );
        let example = Example::new(
            FieldMap::from([("question".to_string(), Value::from("2+2"))]),
            FieldMap::new(),
        );

        let messages = adapter.format(&qa_signature(), "Answer briefly.", &[demo], &example);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3].role, "user");
    }

    #[test]
    fn parse_decodes_strict_json_object() {
        let adapter = SimpleChatAdapter::new();
        let parsed = adapter
            .parse(&multi_output_signature(), r#"{"sentiment":"positive","reasoning":"great"}"#)
            .unwrap();
        assert_eq!(parsed.get("sentiment").unwrap(), "positive");
    }

    #[test]
    fn parse_falls_back_to_passthrough_for_single_output_field() {
        let adapter = SimpleChatAdapter::new();
        let parsed = adapter.parse(&qa_signature(), "  42  ").unwrap();
        assert_eq!(parsed.get("answer").unwrap(), "42");
    }

    #[test]
    fn parse_fails_for_non_json_with_multiple_output_fields() {
        let adapter = SimpleChatAdapter::new();
        let err = adapter.parse(&multi_output_signature(), "not json at all").unwrap_err();
        assert!(matches!(err, AdapterError::ParseFailed { .. }));
    }
}
