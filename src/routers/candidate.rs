//! Candidate construction and filtering
//!
//! A candidate is a (provider, account, model) triple eligible for one
//! attempt. Candidates are derived per request from the config plus live
//! store and tracker reads, and are immutable once constructed.

use std::{collections::HashMap, sync::Arc};

use crate::{
    config::{Auth, ModelRef, QuotaUnit, RouterConfig},
    core::{HealthState, HealthTracker, SpendTracker},
    providers::Provider,
    quota::QuotaStore,
};

/// One eligible route for a request.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub provider: Arc<dyn Provider>,
    pub account_id: String,
    pub auth: Auth,
    pub model: String,
    /// Whether this attempt would draw on a free daily allowance.
    pub free: bool,
    pub remaining: i64,
    pub quota_unit: QuotaUnit,
    pub health: HealthState,
    pub cost_per_input_token: f64,
    pub cost_per_output_token: f64,
    pub cost_per_token: f64,
    pub max_daily_spend: f64,
    pub current_spend: f64,
}

impl Candidate {
    /// Weighted per-token cost used for ordering paid candidates.
    ///
    /// Output tokens are weighted 2:1 over input, reflecting typical chat
    /// traffic.
    pub fn blended_cost(&self) -> f64 {
        if self.cost_per_input_token > 0.0 || self.cost_per_output_token > 0.0 {
            return (self.cost_per_input_token + 2.0 * self.cost_per_output_token) / 3.0;
        }
        self.cost_per_token
    }
}

/// Resolve a requested model through aliases.
///
/// Returns the alias's (provider, model) list, or an empty list meaning
/// "direct": the model is tried against every provider that supports it.
fn resolve_model<'a>(config: &'a RouterConfig, request_model: Option<&str>) -> &'a [ModelRef] {
    let model = match request_model {
        Some(m) if !m.is_empty() => m,
        _ => config.default_model.as_str(),
    };

    for mapping in &config.models {
        if mapping.alias == model {
            return &mapping.models;
        }
    }

    &[]
}

/// Models to try for one account, given the resolved refs.
fn models_for_account(
    refs: &[ModelRef],
    account_provider: &str,
    provider: &dyn Provider,
    request_model: Option<&str>,
    config: &RouterConfig,
) -> Vec<String> {
    if !refs.is_empty() {
        return refs
            .iter()
            .filter(|r| r.provider == account_provider)
            .map(|r| r.model.clone())
            .collect();
    }

    let model = match request_model {
        Some(m) if !m.is_empty() => m,
        _ => config.default_model.as_str(),
    };
    if !model.is_empty() && provider.supports_model(model) {
        return vec![model.to_string()];
    }

    Vec::new()
}

/// Expand accounts × resolved models into candidates, in config order.
pub(crate) async fn build_candidates(
    config: &RouterConfig,
    providers: &HashMap<String, Arc<dyn Provider>>,
    quota: &dyn QuotaStore,
    health: &HealthTracker,
    spend: &SpendTracker,
    request_model: Option<&str>,
) -> Vec<Candidate> {
    let refs = resolve_model(config, request_model);
    let mut candidates = Vec::new();

    for account in &config.accounts {
        let Some(provider) = providers.get(&account.provider) else {
            continue;
        };

        let models = models_for_account(
            refs,
            &account.provider,
            provider.as_ref(),
            request_model,
            config,
        );

        for model in models {
            // A store read failure counts as no remaining free quota.
            let remaining = quota.remaining(&account.id).await.unwrap_or(0);
            let free = account.daily_free > 0 && remaining > 0;

            candidates.push(Candidate {
                provider: Arc::clone(provider),
                account_id: account.id.clone(),
                auth: account.auth.clone(),
                model,
                free,
                remaining,
                quota_unit: account.quota_unit,
                health: health.get_health(&account.id),
                cost_per_input_token: account.cost_per_input_token,
                cost_per_output_token: account.cost_per_output_token,
                cost_per_token: account.cost_per_token,
                max_daily_spend: account.max_daily_spend,
                current_spend: spend.get_spend(&account.id),
            });
        }
    }

    candidates
}

/// Drop candidates the request must not use.
///
/// Rules, in order: unhealthy accounts are excluded (half-open accounts
/// stay in and receive one probe); paid candidates are excluded unless
/// paid usage is allowed; paid candidates at or over their daily spend
/// ceiling are excluded.
pub(crate) fn filter_candidates(candidates: Vec<Candidate>, allow_paid: bool) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| c.health != HealthState::Unhealthy)
        .filter(|c| c.free || allow_paid)
        .filter(|c| c.free || c.max_daily_spend <= 0.0 || c.current_spend < c.max_daily_spend)
        .collect()
}
