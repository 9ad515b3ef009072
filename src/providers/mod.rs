//! Provider adapter contract
//!
//! Adapters translate [`ProviderRequest`]s into upstream HTTP calls and map
//! upstream failures onto [`ProviderError`](crate::core::ProviderError)
//! (429 → `RateLimited`, 401/403 → `AuthFailed`, 400 → `InvalidRequest`,
//! transport/5xx → `Unavailable`). Adapter implementations live outside
//! this crate; the router only depends on these traits.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::{
    config::Auth,
    core::ProviderError,
    protocols::{Message, StreamChunk, Usage},
};

/// Request sent to a provider adapter.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub auth: Auth,
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub stop: Vec<String>,
    pub stream: bool,
}

/// Response from a provider adapter.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub id: String,
    pub content: String,
    pub finish_reason: String,
    pub usage: Usage,
    pub model: String,
}

/// A streaming response in progress.
///
/// `next` yields chunks until the stream ends (`None`); the last chunk
/// conventionally carries usage. `close` releases upstream resources.
#[async_trait]
pub trait ProviderStream: Send {
    async fn next(&mut self) -> Option<Result<StreamChunk, ProviderError>>;
    async fn close(&mut self) -> Result<(), ProviderError>;
}

/// An upstream LLM provider.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Stable provider identifier (e.g. "gemini", "openai").
    fn name(&self) -> &str;

    /// Whether this provider can serve the given model.
    fn supports_model(&self, model: &str) -> bool;

    /// Perform a synchronous chat completion.
    async fn chat_completion(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Open a streaming chat completion.
    async fn chat_completion_stream(
        &self,
        request: ProviderRequest,
    ) -> Result<Box<dyn ProviderStream>, ProviderError>;
}
