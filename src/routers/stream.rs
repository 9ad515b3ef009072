//! Streaming continuation of a routing attempt
//!
//! A successful stream open transfers ownership of the quota reservation
//! from the router to the [`RouterStream`]. Exactly one of commit or
//! rollback fires per reservation, at the first `close`. Close is
//! idempotent and emits exactly one result event.

use std::{sync::Arc, time::Instant};

use tracing::warn;

use super::Candidate;
use crate::{
    config::QuotaUnit,
    core::{dollar_cost, HealthTracker, ProviderError, QuotaError, SpendTracker},
    meter::{Meter, ResultEvent},
    protocols::{StreamChunk, Usage},
    providers::ProviderStream,
    quota::{QuotaStore, Reservation},
};

/// A streaming chat completion with deferred quota commit.
pub struct RouterStream {
    inner: Box<dyn ProviderStream>,
    reservation: Option<Reservation>,
    candidate: Candidate,
    quota: Arc<dyn QuotaStore>,
    meter: Arc<dyn Meter>,
    health: Arc<HealthTracker>,
    spend: Arc<SpendTracker>,
    started_at: Instant,
    usage: Usage,
    stream_err: Option<ProviderError>,
    closed: bool,
}

impl RouterStream {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        inner: Box<dyn ProviderStream>,
        reservation: Reservation,
        candidate: Candidate,
        quota: Arc<dyn QuotaStore>,
        meter: Arc<dyn Meter>,
        health: Arc<HealthTracker>,
        spend: Arc<SpendTracker>,
    ) -> Self {
        Self {
            inner,
            reservation: Some(reservation),
            candidate,
            quota,
            meter,
            health,
            spend,
            started_at: Instant::now(),
            usage: Usage::default(),
            stream_err: None,
            closed: false,
        }
    }

    /// Which provider/account is serving this stream.
    pub fn routing(&self) -> (&str, &str, &str) {
        (
            self.candidate.provider.name(),
            &self.candidate.account_id,
            &self.candidate.model,
        )
    }

    /// Forward the next chunk from the provider.
    ///
    /// Remembers the latest usage seen (conventionally on the final chunk)
    /// and retains the first error encountered.
    pub async fn next(&mut self) -> Option<Result<StreamChunk, ProviderError>> {
        match self.inner.next().await {
            Some(Ok(chunk)) => {
                if let Some(usage) = chunk.usage {
                    self.usage = usage;
                }
                Some(Ok(chunk))
            }
            Some(Err(err)) => {
                if self.stream_err.is_none() {
                    self.stream_err = Some(err.clone());
                }
                Some(Err(err))
            }
            None => None,
        }
    }

    /// Close the stream and reconcile quota.
    ///
    /// On a clean stream the reservation is committed with the actual
    /// usage; otherwise it is rolled back. Idempotent: a second close is a
    /// no-op. Returns the inner stream's close error; a failed quota
    /// operation is reported through the meter instead of mutating the
    /// return value.
    pub async fn close(&mut self) -> Result<(), ProviderError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let close_result = self.inner.close().await;
        let duration = self.started_at.elapsed();
        let success = self.stream_err.is_none();

        let mut quota_err: Option<QuotaError> = None;
        if let Some(reservation) = self.reservation.take() {
            if success {
                let actual = match self.candidate.quota_unit {
                    QuotaUnit::Requests => 1,
                    _ => self.usage.total_tokens,
                };
                quota_err = self.quota.commit(reservation, actual).await.err();
                self.health.record_success(&self.candidate.account_id);
            } else {
                quota_err = self.quota.rollback(reservation).await.err();
                self.health.record_failure(&self.candidate.account_id);
            }
        }
        if let Some(err) = &quota_err {
            warn!(
                account = %self.candidate.account_id,
                error = %err,
                "stream quota reconciliation failed"
            );
        }

        let mut cost = 0.0;
        if success {
            cost = dollar_cost(
                self.candidate.cost_per_input_token,
                self.candidate.cost_per_output_token,
                self.candidate.cost_per_token,
                &self.usage,
            );
            if cost > 0.0 {
                self.spend.record_spend(&self.candidate.account_id, cost);
            }
        }

        let error = match (&self.stream_err, &quota_err) {
            (Some(err), _) => Some(err.to_string()),
            (None, Some(err)) => Some(format!("quota operation failed: {err}")),
            (None, None) => None,
        };

        self.meter.on_result(&ResultEvent {
            provider: self.candidate.provider.name().to_string(),
            account_id: self.candidate.account_id.clone(),
            model: self.candidate.model.clone(),
            free: self.candidate.free,
            success: success && quota_err.is_none(),
            duration,
            usage: self.usage,
            error,
            dollar_cost: cost,
        });

        close_result
    }
}

impl Drop for RouterStream {
    fn drop(&mut self) {
        if !self.closed {
            // The reservation can only be reconciled by an async close;
            // dropping the stream without one leaks it until daily reset.
            warn!(
                account = %self.candidate.account_id,
                "stream dropped without close; reservation not reconciled"
            );
        }
    }
}
