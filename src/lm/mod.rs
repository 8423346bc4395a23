//! The resilient LM client: wire types, config, cache, breaker, and transport.

pub mod breaker;
pub mod cache;
pub mod chat;
pub mod client;
pub mod config;
pub mod transport;

pub use breaker::{Admission, BreakerConfig, CircuitBreaker, CircuitState};
pub use cache::ResponseCache;
pub use chat::{ChatChoice, ChatMessage, ChatOptions, ChatRequest, ChatResponse};
pub use client::{LmClient, SharedLmClient};
pub use config::{LmClientConfig, Provider};
pub use transport::{
    AnthropicTransport, GeminiTransport, OpenAiTransport, ProviderTransport, TestTransport, Transport,
};
