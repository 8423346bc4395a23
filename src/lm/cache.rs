//! Response cache keyed by a stable hash of `(messages, model, options)`.
//!
//! Backed by a `foyer::HybridCache` over a temp-directory filesystem device.
//! Only successful responses are ever inserted; errors are never cached.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use foyer::{BlockEngineBuilder, DeviceBuilder, FsDeviceBuilder, HybridCache, HybridCacheBuilder};

use crate::lm::chat::{ChatRequest, ChatResponse};

fn cache_key(request: &ChatRequest) -> u64 {
    let (model, messages, options) = request.cache_key_parts();
    let mut hasher = DefaultHasher::new();
    model.hash(&mut hasher);
    for message in &messages {
        message.hash(&mut hasher);
    }
    // `ChatOptions` isn't `Hash` (it carries `f32`s); its canonical JSON form is, so
    // hash that instead of deriving a lossy float hash by hand.
    serde_json::to_string(&options).unwrap_or_default().hash(&mut hasher);
    hasher.finish()
}

/// Wraps a `foyer::HybridCache` keyed by [`cache_key`].
#[derive(Debug)]
pub struct ResponseCache {
    handler: HybridCache<u64, ChatResponse>,
}

impl ResponseCache {
    pub async fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;

        let device = FsDeviceBuilder::new(dir.path())
            .with_capacity(256 * 1024 * 1024)
            .build()?;

        let handler: HybridCache<u64, ChatResponse> = HybridCacheBuilder::new()
            .memory(64 * 1024 * 1024)
            .storage()
            .with_engine_config(BlockEngineBuilder::new(device))
            .build()
            .await?;

        Ok(Self { handler })
    }

    pub async fn get(&self, request: &ChatRequest) -> Option<ChatResponse> {
        self.handler
            .get(&cache_key(request))
            .await
            .ok()
            .flatten()
            .map(|entry| entry.value().clone())
    }

    /// Inserts a successful response. Callers must never call this for an error
    /// outcome — the cache has no notion of a cached failure.
    pub fn put_success(&self, request: &ChatRequest, response: ChatResponse) {
        self.handler.insert(cache_key(request), response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::chat::{ChatMessage, ChatOptions};

    fn request(model: &str, content: &str) -> ChatRequest {
        ChatRequest::new(model, vec![ChatMessage::user(content)], ChatOptions::default())
    }

    #[test]
    fn identical_requests_hash_to_the_same_key() {
        let a = request("gpt-4o-mini", "hello");
        let b = request("gpt-4o-mini", "hello");
        assert_eq!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn different_models_hash_differently() {
        let a = request("gpt-4o-mini", "hello");
        let b = request("claude-3", "hello");
        assert_ne!(cache_key(&a), cache_key(&b));
    }

    #[tokio::test]
    async fn cache_miss_then_hit_after_insert() {
        let cache = ResponseCache::new().await.expect("cache should build in a temp dir");
        let req = request("gpt-4o-mini", "2+2?");

        assert!(cache.get(&req).await.is_none());

        cache.put_success(&req, ChatResponse::single("4"));
        let hit = cache.get(&req).await;
        assert_eq!(hit.and_then(|r| r.content().map(str::to_string)), Some("4".to_string()));
    }
}
