//! Tracing-backed meter

use tracing::{info, warn};

use super::{Meter, ResultEvent, RouteEvent};

/// Logs routing events as structured `tracing` records.
#[derive(Debug, Default)]
pub struct LogMeter;

impl LogMeter {
    pub fn new() -> Self {
        Self
    }
}

impl Meter for LogMeter {
    fn on_route(&self, event: &RouteEvent) {
        info!(
            provider = %event.provider,
            account = %event.account_id,
            model = %event.model,
            free = event.free,
            attempt = event.attempt_num,
            estimated_tokens = event.estimated_in,
            "route"
        );
    }

    fn on_result(&self, event: &ResultEvent) {
        if event.success {
            info!(
                provider = %event.provider,
                account = %event.account_id,
                model = %event.model,
                free = event.free,
                duration_ms = event.duration.as_millis() as u64,
                prompt_tokens = event.usage.prompt_tokens,
                completion_tokens = event.usage.completion_tokens,
                dollar_cost = event.dollar_cost,
                "result"
            );
        } else {
            warn!(
                provider = %event.provider,
                account = %event.account_id,
                model = %event.model,
                free = event.free,
                duration_ms = event.duration.as_millis() as u64,
                error = event.error.as_deref().unwrap_or("unknown"),
                "result_error"
            );
        }
    }
}
