//! Shared helpers for unit tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::{Auth, QuotaUnit},
    core::{HealthState, ProviderError},
    providers::{Provider, ProviderRequest, ProviderResponse, ProviderStream},
    routers::Candidate,
};

/// A provider that advertises a fixed model list and never serves traffic.
#[derive(Debug)]
pub(crate) struct StaticProvider {
    name: String,
    models: Vec<String>,
}

impl StaticProvider {
    pub(crate) fn new(name: &str, models: &[&str]) -> Arc<dyn Provider> {
        Arc::new(Self {
            name: name.to_string(),
            models: models.iter().map(|m| m.to_string()).collect(),
        })
    }
}

#[async_trait]
impl Provider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    async fn chat_completion(
        &self,
        _request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Unavailable {
            message: "static test provider".to_string(),
        })
    }

    async fn chat_completion_stream(
        &self,
        _request: ProviderRequest,
    ) -> Result<Box<dyn ProviderStream>, ProviderError> {
        Err(ProviderError::Unavailable {
            message: "static test provider".to_string(),
        })
    }
}

pub(crate) fn candidate(account_id: &str, free: bool, remaining: i64, cost_per_token: f64) -> Candidate {
    Candidate {
        provider: StaticProvider::new("static", &[]),
        account_id: account_id.to_string(),
        auth: Auth::default(),
        model: "test-model".to_string(),
        free,
        remaining,
        quota_unit: QuotaUnit::Tokens,
        health: HealthState::Healthy,
        cost_per_input_token: 0.0,
        cost_per_output_token: 0.0,
        cost_per_token,
        max_daily_spend: 0.0,
        current_spend: 0.0,
    }
}

pub(crate) fn candidate_with_rates(
    account_id: &str,
    cost_per_input_token: f64,
    cost_per_output_token: f64,
) -> Candidate {
    let mut c = candidate(account_id, false, 0, 0.0);
    c.cost_per_input_token = cost_per_input_token;
    c.cost_per_output_token = cost_per_output_token;
    c
}
