//! Request routing
//!
//! The [`Router`] owns the attempt loop: per request it resolves the model,
//! estimates tokens, builds and filters candidates, orders them through the
//! configured policy, then walks the list reserving quota, calling the
//! provider, and committing or rolling back the reservation. Retryable
//! failures move to the next candidate; fatal failures stop immediately.

pub mod candidate;
pub mod stream;

use std::{collections::HashMap, sync::Arc, time::Instant};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::{ConfigError, ConfigResult, QuotaUnit, RouterConfig},
    core::{
        dollar_cost, estimate_tokens, HealthTracker, QuotaError, RouterError, RouterResult,
        SpendTracker,
    },
    meter::{Meter, NoopMeter, ResultEvent, RouteEvent},
    policies::RoutingPolicy,
    protocols::{ChatRequest, ChatResponse, Choice, Message, RoutingInfo, Usage},
    providers::{Provider, ProviderRequest},
    quota::{NoopQuotaStore, QuotaStore, Reservation},
};

pub use candidate::Candidate;
pub use stream::RouterStream;

use candidate::{build_candidates, filter_candidates};

/// Routes chat completion requests across providers and accounts.
///
/// A single router is shared across concurrent requests; per-request state
/// is stack-local and cross-request state lives in the quota store, health
/// tracker, and spend tracker.
pub struct Router {
    config: RouterConfig,
    providers: HashMap<String, Arc<dyn Provider>>,
    policy: Arc<dyn RoutingPolicy>,
    quota: Arc<dyn QuotaStore>,
    meter: Arc<dyn Meter>,
    health: Arc<HealthTracker>,
    spend: Arc<SpendTracker>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("policy", &self.policy.name())
            .finish_non_exhaustive()
    }
}

/// Builder default policy: free candidates ahead of paid ones, preserving
/// config order within each group.
#[derive(Debug, Default)]
struct FreeBeforePaidPolicy;

impl RoutingPolicy for FreeBeforePaidPolicy {
    fn select(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        let (free, paid): (Vec<_>, Vec<_>) =
            candidates.iter().cloned().partition(|c| c.free);
        free.into_iter().chain(paid).collect()
    }

    fn name(&self) -> &'static str {
        "free_before_paid"
    }
}

/// Builds a [`Router`] from a config plus collaborators.
///
/// Defaults: a free-before-paid policy that preserves config order, a
/// no-op quota store, [`NoopMeter`], and fresh health/spend trackers.
pub struct RouterBuilder {
    config: RouterConfig,
    providers: Vec<Arc<dyn Provider>>,
    policy: Option<Arc<dyn RoutingPolicy>>,
    quota: Option<Arc<dyn QuotaStore>>,
    meter: Option<Arc<dyn Meter>>,
    health: Option<Arc<HealthTracker>>,
    spend: Option<Arc<SpendTracker>>,
}

impl RouterBuilder {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            providers: Vec::new(),
            policy: None,
            quota: None,
            meter: None,
            health: None,
            spend: None,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn policy(mut self, policy: Arc<dyn RoutingPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn quota_store(mut self, quota: Arc<dyn QuotaStore>) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn meter(mut self, meter: Arc<dyn Meter>) -> Self {
        self.meter = Some(meter);
        self
    }

    pub fn health_tracker(mut self, health: Arc<HealthTracker>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn spend_tracker(mut self, spend: Arc<SpendTracker>) -> Self {
        self.spend = Some(spend);
        self
    }

    pub fn build(self) -> ConfigResult<Router> {
        if self.providers.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "at least one provider is required".to_string(),
            });
        }

        let providers: HashMap<String, Arc<dyn Provider>> = self
            .providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();

        let quota = self
            .quota
            .unwrap_or_else(|| Arc::new(NoopQuotaStore) as Arc<dyn QuotaStore>);

        // Seed daily limits from config when the store supports it. Paid
        // accounts without a free allowance get no row and reserve as
        // unlimited at the store level.
        if let Some(init) = quota.as_initializer() {
            for account in &self.config.accounts {
                if account.daily_free > 0 || !account.paid_enabled {
                    init.set_quota(&account.id, account.daily_free, account.quota_unit);
                }
            }
        }

        Ok(Router {
            config: self.config,
            providers,
            policy: self
                .policy
                .unwrap_or_else(|| Arc::new(FreeBeforePaidPolicy) as Arc<dyn RoutingPolicy>),
            quota,
            meter: self
                .meter
                .unwrap_or_else(|| Arc::new(NoopMeter) as Arc<dyn Meter>),
            health: self.health.unwrap_or_default(),
            spend: self.spend.unwrap_or_default(),
        })
    }
}

impl Router {
    /// Start building a router from a validated config.
    pub fn builder(config: RouterConfig) -> RouterBuilder {
        RouterBuilder::new(config)
    }

    /// Perform a chat completion, falling over between candidates on
    /// retryable errors.
    pub async fn chat_completion(&self, request: ChatRequest) -> RouterResult<ChatResponse> {
        let estimated_tokens = estimate_tokens(&request.messages);
        let ordered = self.ordered_candidates(&request).await?;

        let mut any_failed = false;
        for (index, chosen) in ordered.iter().enumerate() {
            let attempt = index + 1;

            let reservation = match self.reserve_for(chosen, estimated_tokens).await {
                Ok(reservation) => reservation,
                Err(_) => {
                    any_failed = true;
                    continue;
                }
            };

            self.meter.on_route(&RouteEvent {
                provider: chosen.provider.name().to_string(),
                account_id: chosen.account_id.clone(),
                model: chosen.model.clone(),
                free: chosen.free,
                attempt_num: attempt,
                estimated_in: estimated_tokens,
            });

            let provider_request = provider_request_for(chosen, &request, false);
            let start = Instant::now();
            let result = chosen.provider.chat_completion(provider_request).await;
            let duration = start.elapsed();

            match result {
                Err(err) => {
                    if let Err(rollback_err) = self.quota.rollback(reservation).await {
                        warn!(
                            account = %chosen.account_id,
                            error = %rollback_err,
                            "reservation rollback failed"
                        );
                    }
                    self.health.record_failure(&chosen.account_id);
                    self.meter.on_result(&ResultEvent {
                        provider: chosen.provider.name().to_string(),
                        account_id: chosen.account_id.clone(),
                        model: chosen.model.clone(),
                        free: chosen.free,
                        success: false,
                        duration,
                        usage: Usage::default(),
                        error: Some(err.to_string()),
                        dollar_cost: 0.0,
                    });

                    if err.is_fatal() {
                        return Err(RouterError::Attempt {
                            provider: chosen.provider.name().to_string(),
                            account_id: chosen.account_id.clone(),
                            model: chosen.model.clone(),
                            attempts: attempt,
                            source: err,
                        });
                    }

                    any_failed = true;
                }
                Ok(response) => {
                    let actual = match chosen.quota_unit {
                        QuotaUnit::Requests => 1,
                        _ => response.usage.total_tokens,
                    };
                    if let Err(commit_err) = self.quota.commit(reservation, actual).await {
                        warn!(
                            account = %chosen.account_id,
                            error = %commit_err,
                            "reservation commit failed"
                        );
                    }
                    self.health.record_success(&chosen.account_id);

                    let cost = dollar_cost(
                        chosen.cost_per_input_token,
                        chosen.cost_per_output_token,
                        chosen.cost_per_token,
                        &response.usage,
                    );
                    if cost > 0.0 {
                        self.spend.record_spend(&chosen.account_id, cost);
                    }

                    self.meter.on_result(&ResultEvent {
                        provider: chosen.provider.name().to_string(),
                        account_id: chosen.account_id.clone(),
                        model: chosen.model.clone(),
                        free: chosen.free,
                        success: true,
                        duration,
                        usage: response.usage,
                        error: None,
                        dollar_cost: cost,
                    });

                    return Ok(ChatResponse {
                        id: response.id,
                        model: response.model,
                        choices: vec![Choice {
                            index: 0,
                            message: Message::new("assistant", response.content),
                            finish_reason: response.finish_reason,
                        }],
                        usage: response.usage,
                        routing: RoutingInfo {
                            provider: chosen.provider.name().to_string(),
                            account_id: chosen.account_id.clone(),
                            model: chosen.model.clone(),
                            attempts: attempt,
                            free: chosen.free,
                        },
                    });
                }
            }
        }

        if any_failed {
            Err(RouterError::AllFailed {
                attempts: ordered.len(),
            })
        } else {
            Err(RouterError::NoCandidates)
        }
    }

    /// Open a streaming chat completion.
    ///
    /// The returned stream owns the quota reservation; it is committed or
    /// rolled back when the stream is closed, not here.
    pub async fn chat_completion_stream(&self, request: ChatRequest) -> RouterResult<RouterStream> {
        let estimated_tokens = estimate_tokens(&request.messages);
        let ordered = self.ordered_candidates(&request).await?;

        let mut any_failed = false;
        for (index, chosen) in ordered.iter().enumerate() {
            let attempt = index + 1;

            let reservation = match self.reserve_for(chosen, estimated_tokens).await {
                Ok(reservation) => reservation,
                Err(_) => {
                    any_failed = true;
                    continue;
                }
            };

            self.meter.on_route(&RouteEvent {
                provider: chosen.provider.name().to_string(),
                account_id: chosen.account_id.clone(),
                model: chosen.model.clone(),
                free: chosen.free,
                attempt_num: attempt,
                estimated_in: estimated_tokens,
            });

            let provider_request = provider_request_for(chosen, &request, true);
            let start = Instant::now();
            match chosen.provider.chat_completion_stream(provider_request).await {
                Err(err) => {
                    if let Err(rollback_err) = self.quota.rollback(reservation).await {
                        warn!(
                            account = %chosen.account_id,
                            error = %rollback_err,
                            "reservation rollback failed"
                        );
                    }
                    self.health.record_failure(&chosen.account_id);
                    self.meter.on_result(&ResultEvent {
                        provider: chosen.provider.name().to_string(),
                        account_id: chosen.account_id.clone(),
                        model: chosen.model.clone(),
                        free: chosen.free,
                        success: false,
                        duration: start.elapsed(),
                        usage: Usage::default(),
                        error: Some(err.to_string()),
                        dollar_cost: 0.0,
                    });

                    if err.is_fatal() {
                        return Err(RouterError::Attempt {
                            provider: chosen.provider.name().to_string(),
                            account_id: chosen.account_id.clone(),
                            model: chosen.model.clone(),
                            attempts: attempt,
                            source: err,
                        });
                    }

                    any_failed = true;
                }
                Ok(inner) => {
                    return Ok(RouterStream::new(
                        inner,
                        reservation,
                        chosen.clone(),
                        Arc::clone(&self.quota),
                        Arc::clone(&self.meter),
                        Arc::clone(&self.health),
                        Arc::clone(&self.spend),
                    ));
                }
            }
        }

        if any_failed {
            Err(RouterError::AllFailed {
                attempts: ordered.len(),
            })
        } else {
            Err(RouterError::NoCandidates)
        }
    }

    async fn ordered_candidates(&self, request: &ChatRequest) -> RouterResult<Vec<Candidate>> {
        let candidates = build_candidates(
            &self.config,
            &self.providers,
            self.quota.as_ref(),
            &self.health,
            &self.spend,
            request.model.as_deref(),
        )
        .await;

        let filtered = filter_candidates(candidates, self.config.allow_paid);
        if filtered.is_empty() {
            return Err(RouterError::NoCandidates);
        }

        Ok(self.policy.select(&filtered))
    }

    /// Reserve quota for one attempt with a fresh idempotency key.
    ///
    /// A reserve failure is a quota decision, not a provider fault: it is
    /// not recorded against health and emits no meter event.
    async fn reserve_for(
        &self,
        chosen: &Candidate,
        estimated_tokens: i64,
    ) -> Result<Reservation, QuotaError> {
        let idempotency_key = Uuid::new_v4().to_string();
        let reserve_amount = match chosen.quota_unit {
            QuotaUnit::Requests => 1,
            _ => estimated_tokens,
        };

        self.quota
            .reserve(
                &chosen.account_id,
                reserve_amount,
                chosen.quota_unit,
                &idempotency_key,
            )
            .await
            .inspect_err(|err| {
                debug!(
                    account = %chosen.account_id,
                    amount = reserve_amount,
                    error = %err,
                    "reservation refused"
                );
            })
    }
}

fn provider_request_for(chosen: &Candidate, request: &ChatRequest, stream: bool) -> ProviderRequest {
    ProviderRequest {
        auth: chosen.auth.clone(),
        model: chosen.model.clone(),
        messages: request.messages.clone(),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        top_p: request.top_p,
        stop: request.stop.clone(),
        stream,
    }
}
