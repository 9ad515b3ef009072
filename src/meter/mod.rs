//! Metering hooks
//!
//! The router reports one `RouteEvent` per attempt and one `ResultEvent`
//! per outcome. Both callbacks are fire-and-forget: the router never
//! inspects their effect and tolerates any implementation, including none.

pub mod log;

use std::time::Duration;

use crate::protocols::Usage;

pub use log::LogMeter;

/// A routing decision about to be attempted.
#[derive(Debug, Clone)]
pub struct RouteEvent {
    pub provider: String,
    pub account_id: String,
    pub model: String,
    pub free: bool,
    /// 1-based attempt index within the request.
    pub attempt_num: usize,
    /// Estimated prompt tokens used for the reservation.
    pub estimated_in: i64,
}

/// The outcome of a provider call or a closed stream.
#[derive(Debug, Clone)]
pub struct ResultEvent {
    pub provider: String,
    pub account_id: String,
    pub model: String,
    pub free: bool,
    pub success: bool,
    pub duration: Duration,
    pub usage: Usage,
    pub error: Option<String>,
    pub dollar_cost: f64,
}

/// Observes routing events for monitoring and logging.
pub trait Meter: Send + Sync {
    fn on_route(&self, event: &RouteEvent);
    fn on_result(&self, event: &ResultEvent);
}

/// A meter that does nothing.
#[derive(Debug, Default)]
pub struct NoopMeter;

impl Meter for NoopMeter {
    fn on_route(&self, _event: &RouteEvent) {}
    fn on_result(&self, _event: &ResultEvent) {}
}
