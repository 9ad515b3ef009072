// Shared mock provider and helpers for integration tests.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;

use llm_router::{
    protocols::{Delta, StreamChoice},
    AccountConfig, Auth, Meter, Provider, ProviderError, ProviderRequest, ProviderResponse,
    ProviderStream, QuotaUnit, ResultEvent, RouteEvent, RouterConfig, StreamChunk, Usage,
};

/// Install a log subscriber for tests when `RUST_LOG` is set.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// One scripted outcome for a mock provider call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Succeed { content: String, usage: Usage },
    Fail(ProviderError),
}

/// Configurable mock provider.
///
/// Calls consume scripted outcomes first and fall back to the default
/// outcome once the script is exhausted.
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    models: Vec<String>,
    script: Mutex<VecDeque<MockOutcome>>,
    default_outcome: MockOutcome,
    stream_chunks: Vec<String>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &str, models: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            models: models.iter().map(|m| m.to_string()).collect(),
            script: Mutex::new(VecDeque::new()),
            default_outcome: MockOutcome::Succeed {
                content: "mock response".to_string(),
                usage: Usage {
                    prompt_tokens: 20,
                    completion_tokens: 10,
                    total_tokens: 30,
                },
            },
            stream_chunks: vec!["mock ".to_string(), "response".to_string()],
            calls: AtomicUsize::new(0),
        }
    }

    /// Replace the default outcome with a fixed response.
    pub fn with_response(mut self, content: &str, usage: Usage) -> Self {
        self.default_outcome = MockOutcome::Succeed {
            content: content.to_string(),
            usage,
        };
        self
    }

    /// Replace the default outcome with a fixed error.
    pub fn with_error(mut self, error: ProviderError) -> Self {
        self.default_outcome = MockOutcome::Fail(error);
        self
    }

    /// Chunks yielded by streaming calls; usage from the default outcome
    /// rides on the last chunk.
    pub fn with_stream_chunks(mut self, chunks: &[&str]) -> Self {
        self.stream_chunks = chunks.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Queue a one-shot outcome ahead of the default.
    pub fn push_outcome(&self, outcome: MockOutcome) {
        self.script.lock().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> MockOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_outcome.clone())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    async fn chat_completion(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        match self.next_outcome() {
            MockOutcome::Succeed { content, usage } => Ok(ProviderResponse {
                id: format!("resp-{}", self.calls()),
                content,
                finish_reason: "stop".to_string(),
                usage,
                model: request.model,
            }),
            MockOutcome::Fail(error) => Err(error),
        }
    }

    async fn chat_completion_stream(
        &self,
        request: ProviderRequest,
    ) -> Result<Box<dyn ProviderStream>, ProviderError> {
        match self.next_outcome() {
            MockOutcome::Succeed { usage, .. } => Ok(Box::new(MockStream::new(
                &self.stream_chunks,
                usage,
                &request.model,
            ))),
            MockOutcome::Fail(error) => Err(error),
        }
    }
}

/// Stream that yields fixed chunks with usage on the last one.
pub struct MockStream {
    chunks: VecDeque<StreamChunk>,
}

impl MockStream {
    pub fn new(contents: &[String], usage: Usage, model: &str) -> Self {
        let last = contents.len().saturating_sub(1);
        let chunks = contents
            .iter()
            .enumerate()
            .map(|(i, content)| StreamChunk {
                id: format!("chunk-{i}"),
                choices: vec![StreamChoice {
                    index: 0,
                    delta: Delta {
                        role: (i == 0).then(|| "assistant".to_string()),
                        content: Some(content.clone()),
                    },
                    finish_reason: (i == last).then(|| "stop".to_string()),
                }],
                model: model.to_string(),
                usage: (i == last).then_some(usage),
            })
            .collect();
        Self { chunks }
    }
}

#[async_trait]
impl ProviderStream for MockStream {
    async fn next(&mut self) -> Option<Result<StreamChunk, ProviderError>> {
        self.chunks.pop_front().map(Ok)
    }

    async fn close(&mut self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Meter that records every event for assertions.
#[derive(Debug, Default)]
pub struct RecordingMeter {
    pub routes: Mutex<Vec<RouteEvent>>,
    pub results: Mutex<Vec<ResultEvent>>,
}

impl Meter for RecordingMeter {
    fn on_route(&self, event: &RouteEvent) {
        self.routes.lock().push(event.clone());
    }

    fn on_result(&self, event: &ResultEvent) {
        self.results.lock().push(event.clone());
    }
}

pub fn free_account(id: &str, provider: &str, daily_free: i64, unit: QuotaUnit) -> AccountConfig {
    AccountConfig {
        provider: provider.to_string(),
        id: id.to_string(),
        auth: Auth {
            api_key: format!("key-{id}"),
        },
        daily_free,
        quota_unit: unit,
        paid_enabled: false,
        max_daily_spend: 0.0,
        cost_per_token: 0.0,
        cost_per_input_token: 0.0,
        cost_per_output_token: 0.0,
    }
}

pub fn paid_account(id: &str, provider: &str, cost_per_token: f64) -> AccountConfig {
    AccountConfig {
        provider: provider.to_string(),
        id: id.to_string(),
        auth: Auth {
            api_key: format!("key-{id}"),
        },
        daily_free: 0,
        quota_unit: QuotaUnit::Tokens,
        paid_enabled: true,
        max_daily_spend: 0.0,
        cost_per_token,
        cost_per_input_token: 0.0,
        cost_per_output_token: 0.0,
    }
}

pub fn config(
    allow_paid: bool,
    default_model: &str,
    accounts: Vec<AccountConfig>,
) -> RouterConfig {
    let mut config = RouterConfig {
        allow_paid,
        default_model: default_model.to_string(),
        models: vec![],
        accounts,
    };
    config.normalize();
    config
}
