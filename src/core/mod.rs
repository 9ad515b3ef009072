//! Core abstractions shared across the router
//!
//! - Error taxonomy for provider, quota, and routing failures
//! - Per-account circuit breaker (health tracking)
//! - Per-account dollar spend tracking with daily reset
//! - Rough token estimation for quota reservations

pub mod error;
pub mod estimate;
pub mod health;
pub mod spend;

pub use error::{ProviderError, QuotaError, RouterError, RouterResult};
pub use estimate::estimate_tokens;
pub use health::{HealthConfig, HealthState, HealthTracker};
pub use spend::{dollar_cost, SpendTracker};
