//! Per-account circuit breaker
//!
//! Accounts move between three states: `Healthy` accounts take traffic,
//! `Unhealthy` accounts are excluded from routing, and `HalfOpen` accounts
//! receive a single probe request whose outcome decides the next state.
//! The Unhealthy → HalfOpen transition is computed lazily on read; there
//! are no background timers.

use std::{
    collections::HashMap,
    fmt,
    time::{Duration, Instant},
};

use parking_lot::RwLock;
use tracing::info;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Failures within `failure_window` that trip the circuit.
    pub failure_threshold: usize,
    /// Sliding window for failure counting.
    pub failure_window: Duration,
    /// Cooldown before an unhealthy account is probed again.
    pub unhealthy_period: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_window: Duration::from_secs(5 * 60),
            unhealthy_period: Duration::from_secs(30),
        }
    }
}

/// Health state of a provider account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy,
    HalfOpen,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
            HealthState::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug)]
struct AccountHealth {
    state: HealthState,
    /// Sliding window of recent failure times.
    failures: Vec<Instant>,
    unhealthy_since: Option<Instant>,
}

impl AccountHealth {
    fn new() -> Self {
        Self {
            state: HealthState::Healthy,
            failures: Vec::new(),
            unhealthy_since: None,
        }
    }

    fn cooldown_elapsed(&self, period: Duration) -> bool {
        self.state == HealthState::Unhealthy
            && self
                .unhealthy_since
                .is_some_and(|since| since.elapsed() >= period)
    }
}

/// Tracks per-account health across requests.
#[derive(Debug, Default)]
pub struct HealthTracker {
    config: HealthConfig,
    accounts: RwLock<HashMap<String, AccountHealth>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::with_config(HealthConfig::default())
    }

    pub fn with_config(config: HealthConfig) -> Self {
        Self {
            config,
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Current health state for an account.
    ///
    /// This is the sole observer of the time-based Unhealthy → HalfOpen
    /// edge: the transition is applied here when the cooldown has elapsed.
    pub fn get_health(&self, account_id: &str) -> HealthState {
        {
            let accounts = self.accounts.read();
            match accounts.get(account_id) {
                None => return HealthState::Healthy,
                Some(health) if !health.cooldown_elapsed(self.config.unhealthy_period) => {
                    return health.state;
                }
                Some(_) => {}
            }
        }

        let mut accounts = self.accounts.write();
        match accounts.get_mut(account_id) {
            Some(health) => {
                // Re-check under the write lock; another reader may have
                // already applied the transition.
                if health.cooldown_elapsed(self.config.unhealthy_period) {
                    health.state = HealthState::HalfOpen;
                    info!(account_id, "account circuit half-open");
                }
                health.state
            }
            None => HealthState::Healthy,
        }
    }

    /// Record a successful request. Restores the account to `Healthy` from
    /// any state and clears the failure window.
    pub fn record_success(&self, account_id: &str) {
        let mut accounts = self.accounts.write();
        let health = accounts
            .entry(account_id.to_string())
            .or_insert_with(AccountHealth::new);

        if health.state != HealthState::Healthy {
            info!(account_id, from = %health.state, "account circuit closed");
        }
        health.state = HealthState::Healthy;
        health.failures.clear();
        health.unhealthy_since = None;
    }

    /// Record a failed request.
    ///
    /// Ignored while the account is already `Unhealthy` so that repeated
    /// failures do not extend the cooldown.
    pub fn record_failure(&self, account_id: &str) {
        let mut accounts = self.accounts.write();
        let health = accounts
            .entry(account_id.to_string())
            .or_insert_with(AccountHealth::new);

        if health.state == HealthState::Unhealthy {
            return;
        }

        let now = Instant::now();
        let window = self.config.failure_window;
        health.failures.retain(|t| now.duration_since(*t) < window);
        health.failures.push(now);

        if health.failures.len() >= self.config.failure_threshold {
            health.state = HealthState::Unhealthy;
            health.unhealthy_since = Some(now);
            info!(
                account_id,
                failures = health.failures.len(),
                "account circuit open"
            );
        }
    }
}
