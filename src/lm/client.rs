//! The resilient LM client façade: cache → breaker → transport, in that order.

use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::ClientError;
use crate::lm::breaker::{Admission, BreakerConfig, CircuitBreaker};
use crate::lm::cache::ResponseCache;
use crate::lm::chat::{ChatOptions, ChatRequest, ChatResponse};
use crate::lm::config::{LmClientConfig, Provider};
use crate::lm::transport::{AnthropicTransport, GeminiTransport, OpenAiTransport, ProviderTransport, TestTransport, Transport};

/// One `(provider, model)` client instance. Safe to call concurrently: cache and
/// breaker writes are serialized behind their own mutexes, and the transport itself is
/// immutable after construction.
#[derive(Debug)]
pub struct LmClient {
    config: LmClientConfig,
    transport: Transport,
    cache: Option<ResponseCache>,
    breaker: Mutex<CircuitBreaker>,
}

impl LmClient {
    /// Builds a client, resolving provider credentials from the environment and
    /// failing fast (not lazily on first request) if a required variable is absent.
    pub async fn new(config: LmClientConfig) -> Result<Self, ClientError> {
        let transport = Self::build_transport(&config)?;
        let cache = if config.cache {
            Some(
                ResponseCache::new()
                    .await
                    .map_err(|e| ClientError::NetworkError {
                        message: format!("could not initialize response cache: {e}"),
                    })?,
            )
        } else {
            None
        };

        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: config.breaker_failure_threshold,
            window: Duration::from_millis(config.breaker_window_ms),
            reset_timeout: Duration::from_millis(config.breaker_reset_timeout_ms),
            ..BreakerConfig::default()
        });

        Ok(Self {
            config,
            transport,
            cache,
            breaker: Mutex::new(breaker),
        })
    }

    fn build_transport(config: &LmClientConfig) -> Result<Transport, ClientError> {
        if let Some(env_var) = config.provider.credential_env_var() {
            let api_key = env::var(env_var).map_err(|_| ClientError::ProviderNotConfigured {
                provider: config.provider.name().to_string(),
                env_var: env_var.to_string(),
            })?;

            return Ok(match config.provider {
                Provider::OpenAi => Transport::OpenAi(OpenAiTransport::new(api_key)),
                Provider::Anthropic => Transport::Anthropic(AnthropicTransport::new(api_key)),
                Provider::Gemini => Transport::Gemini(GeminiTransport::new(api_key)),
                Provider::Test => unreachable!("Provider::Test has no credential_env_var"),
            });
        }

        Ok(Transport::Test(TestTransport::new()))
    }

    /// Lets tests install scripted behavior against a `Provider::Test` client.
    pub fn test_transport(&self) -> Option<&TestTransport> {
        match &self.transport {
            Transport::Test(t) => Some(t),
            _ => None,
        }
    }

    /// Issues one chat-completion request, consulting cache and breaker first.
    #[instrument(skip(self, request), fields(cache_hit, breaker_state))]
    pub async fn request(&self, request: ChatRequest) -> Result<ChatResponse, ClientError> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&request).await {
                debug!(event = "cache_hit");
                return Ok(cached);
            }
        }

        let admission = {
            let mut breaker = self.breaker.lock().await;
            breaker.admit()
        };

        if admission == Admission::Blocked {
            return Err(ClientError::CircuitOpen);
        }

        let deadline = Duration::from_millis(self.config.timeout_ms);
        let outcome = tokio::time::timeout(deadline, self.transport.send(&request))
            .await
            .map_err(|_| ClientError::Timeout)
            .and_then(|result| result);

        let counted_failure = match &outcome {
            Ok(_) => false,
            Err(e) => e.counts_as_breaker_failure(),
        };

        if !matches!(outcome, Err(ClientError::CircuitOpen)) {
            let mut breaker = self.breaker.lock().await;
            breaker.record(counted_failure);
        }

        if let (Ok(response), Some(cache)) = (&outcome, &self.cache) {
            cache.put_success(&request, response.clone());
        }

        outcome
    }

    /// Convenience entry point used by the executor: builds a `ChatRequest` from the
    /// client's configured model and per-call options, then dispatches it.
    pub async fn complete(
        &self,
        messages: Vec<crate::lm::chat::ChatMessage>,
        options: ChatOptions,
    ) -> Result<ChatResponse, ClientError> {
        let request = ChatRequest::new(self.config.model.clone(), messages, options);
        self.request(request).await
    }
}

/// Shared handle to an [`LmClient`], cloned cheaply across concurrent executor tasks.
pub type SharedLmClient = Arc<LmClient>;

#[allow(dead_code)]
fn elapsed_since(instant: Instant) -> Duration {
    instant.elapsed()
}
