//! Per-provider HTTP dispatch, behind a common trait so the client never branches on
//! provider identity after construction.

use async_trait::async_trait;
use enum_dispatch::enum_dispatch;
use tokio::sync::Mutex;

use crate::error::ClientError;
use crate::lm::chat::{ChatRequest, ChatResponse};

/// One provider's wire dialect, reduced to "send this normalized request, get back a
/// normalized response". Implementations own their own `reqwest::Client` and endpoint.
#[async_trait]
#[enum_dispatch]
pub trait ProviderTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError>;
}

/// A thin `reqwest` wrapper posting the normalized chat body to an OpenAI-compatible
/// `/chat/completions` endpoint and unwrapping `choices[0].message.content`.
#[derive(Debug, Clone)]
pub struct OpenAiTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiTransport {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ProviderTransport for OpenAiTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        dispatch_openai_shaped(&self.client, &self.endpoint, &self.api_key, request).await
    }
}

/// Anthropic's Messages API differs in envelope shape from OpenAI's, but for the
/// purposes of this client's normalized wire protocol (§6) the distinction collapses to
/// the endpoint and auth header; a richer adapter would diverge further.
#[derive(Debug, Clone)]
pub struct AnthropicTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl AnthropicTransport {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ProviderTransport for AnthropicTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::NetworkError {
                message: e.to_string(),
            })?;

        normalize_response(response).await
    }
}

#[derive(Debug, Clone)]
pub struct GeminiTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiTransport {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta/chat/completions".to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ProviderTransport for GeminiTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        dispatch_openai_shaped(&self.client, &self.endpoint, &self.api_key, request).await
    }
}

async fn dispatch_openai_shaped(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    request: &ChatRequest,
) -> Result<ChatResponse, ClientError> {
    let response = client
        .post(endpoint)
        .bearer_auth(api_key)
        .json(request)
        .send()
        .await
        .map_err(|e| ClientError::NetworkError {
            message: e.to_string(),
        })?;

    normalize_response(response).await
}

async fn normalize_response(response: reqwest::Response) -> Result<ChatResponse, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::ApiError {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<ChatResponse>()
        .await
        .map_err(|e| ClientError::ApiError {
            status: status.as_u16(),
            body: format!("could not decode response body: {e}"),
        })
}

/// A scripted request/response pair replayed by [`TestTransport`] in request order.
#[derive(Debug, Clone)]
pub enum Scripted {
    Response(ChatResponse),
    Error(String),
}

/// Deterministic, network-free transport for tests: replays a queue of canned
/// responses/errors and records every request it received.
#[derive(Debug)]
pub struct TestTransport {
    queue: Mutex<std::collections::VecDeque<Scripted>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl TestTransport {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(std::collections::VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn push_response(&self, response: ChatResponse) {
        self.queue.lock().await.push_back(Scripted::Response(response));
    }

    pub async fn push_error(&self, message: impl Into<String>) {
        self.queue.lock().await.push_back(Scripted::Error(message.into()));
    }

    pub async fn requests_seen(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().await.last().cloned()
    }
}

impl Default for TestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderTransport for TestTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        self.requests.lock().await.push(request.clone());

        match self.queue.lock().await.pop_front() {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Error(message)) => Err(ClientError::NetworkError { message }),
            None => Ok(ChatResponse::single("{}")),
        }
    }
}

/// Static-dispatch union of every transport kind, so the client holds one concrete type
/// regardless of which provider it was constructed for.
#[enum_dispatch(ProviderTransport)]
#[derive(Debug)]
pub enum Transport {
    OpenAi(OpenAiTransport),
    Anthropic(AnthropicTransport),
    Gemini(GeminiTransport),
    Test(TestTransport),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::chat::{ChatOptions, ChatRequest};

    fn request() -> ChatRequest {
        ChatRequest::new("dummy", vec![], ChatOptions::default())
    }

    #[tokio::test]
    async fn test_transport_replays_scripted_responses_in_order() {
        let transport = TestTransport::new();
        transport.push_response(ChatResponse::single("first")).await;
        transport.push_response(ChatResponse::single("second")).await;

        let first = transport.send(&request()).await.unwrap();
        let second = transport.send(&request()).await.unwrap();

        assert_eq!(first.content(), Some("first"));
        assert_eq!(second.content(), Some("second"));
        assert_eq!(transport.requests_seen().await.len(), 2);
    }

    #[tokio::test]
    async fn test_transport_replays_scripted_errors() {
        let transport = TestTransport::new();
        transport.push_error("dns failure").await;

        let err = transport.send(&request()).await.unwrap_err();
        assert!(matches!(err, ClientError::NetworkError { .. }));
    }

    #[tokio::test]
    async fn test_transport_defaults_to_empty_object_when_queue_drained() {
        let transport = TestTransport::new();
        let response = transport.send(&request()).await.unwrap();
        assert_eq!(response.content(), Some("{}"));
    }
}
