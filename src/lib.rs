//! Client-side routing core for LLM chat completions
//!
//! Dispatches each request across a fleet of configured provider accounts,
//! choosing which (provider, account, model) triple to try in which order.
//! Per attempt the router reserves quota against the account's daily
//! budget, calls the provider, and commits the reservation with actual
//! usage or rolls it back. Repeated failures trip a per-account circuit
//! breaker; paid accounts are subject to daily dollar-spend ceilings;
//! retryable errors fall over to the next candidate while fatal ones stop
//! immediately. Streaming responses share the same reservation discipline
//! with commit deferred to stream close.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use llm_router::{
//!     ChatRequest, Message, MemoryQuotaStore, Router, RouterConfig,
//! };
//!
//! # async fn run(provider: Arc<dyn llm_router::Provider>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = RouterConfig::from_file("router.yaml")?;
//! let router = Router::builder(config)
//!     .provider(provider)
//!     .quota_store(Arc::new(MemoryQuotaStore::new()))
//!     .build()?;
//!
//! let response = router
//!     .chat_completion(ChatRequest {
//!         messages: vec![Message::new("user", "hello")],
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("{} via {}", response.content(), response.routing.provider);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod meter;
pub mod policies;
pub mod protocols;
pub mod providers;
pub mod quota;
pub mod routers;

#[cfg(test)]
mod test_util;

pub use config::{AccountConfig, Auth, ConfigError, ModelMapping, ModelRef, QuotaUnit, RouterConfig};
pub use crate::core::{
    estimate_tokens, HealthConfig, HealthState, HealthTracker, ProviderError, QuotaError,
    RouterError, RouterResult, SpendTracker,
};
pub use meter::{LogMeter, Meter, NoopMeter, ResultEvent, RouteEvent};
pub use policies::{CostFirstPolicy, FreeFirstPolicy, RoutingPolicy};
pub use protocols::{ChatRequest, ChatResponse, Choice, Message, RoutingInfo, StreamChunk, Usage};
pub use providers::{Provider, ProviderRequest, ProviderResponse, ProviderStream};
pub use quota::{MemoryQuotaStore, QuotaInitializer, QuotaStore, Reservation};
pub use routers::{Candidate, Router, RouterBuilder, RouterStream};
