//! Per-account dollar spend tracking
//!
//! Spend accumulates per account and resets when the UTC day changes. The
//! reset is applied lazily on access. Used to enforce `max_daily_spend`
//! ceilings for paid accounts.

use std::collections::HashMap;

use chrono::{Datelike, Utc};
use parking_lot::Mutex;

use crate::protocols::Usage;

#[derive(Debug)]
struct SpendInner {
    accounts: HashMap<String, f64>,
    /// UTC day-of-year of the last reset.
    reset_day: u32,
}

/// Accumulates dollar spend per account with a UTC daily reset.
#[derive(Debug)]
pub struct SpendTracker {
    inner: Mutex<SpendInner>,
}

impl Default for SpendTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SpendTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SpendInner {
                accounts: HashMap::new(),
                reset_day: Utc::now().ordinal(),
            }),
        }
    }

    /// Record dollar spend for an account.
    pub fn record_spend(&self, account_id: &str, dollars: f64) {
        let mut inner = self.inner.lock();
        check_reset(&mut inner);
        *inner.accounts.entry(account_id.to_string()).or_insert(0.0) += dollars;
    }

    /// Current daily spend for an account.
    pub fn get_spend(&self, account_id: &str) -> f64 {
        let mut inner = self.inner.lock();
        check_reset(&mut inner);
        inner.accounts.get(account_id).copied().unwrap_or(0.0)
    }

    #[cfg(test)]
    fn force_reset_day(&self, day: u32) {
        self.inner.lock().reset_day = day;
    }
}

fn check_reset(inner: &mut SpendInner) {
    let today = Utc::now().ordinal();
    if today != inner.reset_day {
        inner.accounts.clear();
        inner.reset_day = today;
    }
}

/// Dollar cost of a request given the account's rates and reported usage.
///
/// Prefers the per-direction rates; falls back to the legacy single rate
/// applied to total tokens; otherwise 0.
pub fn dollar_cost(
    cost_per_input_token: f64,
    cost_per_output_token: f64,
    cost_per_token: f64,
    usage: &Usage,
) -> f64 {
    if cost_per_input_token > 0.0 || cost_per_output_token > 0.0 {
        return usage.prompt_tokens as f64 * cost_per_input_token
            + usage.completion_tokens as f64 * cost_per_output_token;
    }
    if cost_per_token > 0.0 {
        return usage.total_tokens as f64 * cost_per_token;
    }
    0.0
}
