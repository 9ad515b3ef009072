//! In-memory quota store
//!
//! Reference implementation of the [`QuotaStore`] contract. A single mutex
//! guards the account map and the idempotency ledger, which makes every
//! operation atomic with respect to concurrent callers.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::{QuotaInitializer, QuotaStore, Reservation};
use crate::{config::QuotaUnit, core::QuotaError};

/// Idempotency ledger entries older than this are pruned.
fn ledger_retention() -> Duration {
    Duration::hours(24)
}

#[derive(Debug)]
struct AccountRow {
    daily_limit: i64,
    used: i64,
    reserved: i64,
    unit: QuotaUnit,
    reset_at: DateTime<Utc>,
}

impl AccountRow {
    fn available(&self) -> i64 {
        self.daily_limit - self.used - self.reserved
    }

    fn maybe_reset(&mut self, now: DateTime<Utc>) {
        if now >= self.reset_at {
            self.used = 0;
            self.reserved = 0;
            self.reset_at = next_utc_midnight(now);
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<String, AccountRow>,
    /// Recently seen idempotency keys and when they were recorded.
    ledger: HashMap<String, DateTime<Utc>>,
}

/// In-memory [`QuotaStore`] with lazy daily reset at UTC midnight.
#[derive(Debug, Default)]
pub struct MemoryQuotaStore {
    inner: Mutex<Inner>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn force_reset_at(&self, account_id: &str, reset_at: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        if let Some(row) = inner.accounts.get_mut(account_id) {
            row.reset_at = reset_at;
        }
    }

    #[cfg(test)]
    fn age_ledger_key(&self, key: &str, seen_at: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.ledger.get_mut(key) {
            *entry = seen_at;
        }
    }

    #[cfg(test)]
    fn ledger_len(&self) -> usize {
        self.inner.lock().ledger.len()
    }
}

impl QuotaInitializer for MemoryQuotaStore {
    fn set_quota(&self, account_id: &str, daily_limit: i64, unit: QuotaUnit) {
        let mut inner = self.inner.lock();
        match inner.accounts.get_mut(account_id) {
            Some(row) => {
                // Upsert keeps in-flight accounting intact.
                row.daily_limit = daily_limit;
                row.unit = unit;
            }
            None => {
                inner.accounts.insert(
                    account_id.to_string(),
                    AccountRow {
                        daily_limit,
                        used: 0,
                        reserved: 0,
                        unit,
                        reset_at: next_utc_midnight(Utc::now()),
                    },
                );
            }
        }
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn reserve(
        &self,
        account_id: &str,
        amount: i64,
        unit: QuotaUnit,
        idempotency_key: &str,
    ) -> Result<Reservation, QuotaError> {
        let now = Utc::now();
        let mut inner = self.inner.lock();

        if !idempotency_key.is_empty() && inner.ledger.contains_key(idempotency_key) {
            return Err(QuotaError::DuplicateKey {
                key: idempotency_key.to_string(),
            });
        }

        inner
            .ledger
            .retain(|_, seen_at| now.signed_duration_since(*seen_at) < ledger_retention());

        let reservation = Reservation {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            amount,
            unit,
        };

        if let Some(row) = inner.accounts.get_mut(account_id) {
            row.maybe_reset(now);

            if amount > row.available() {
                // The key insert is withheld so a later attempt with the
                // same key is not locked out by this quota failure.
                return Err(QuotaError::Exceeded {
                    account_id: account_id.to_string(),
                });
            }
            row.reserved += amount;
        }
        // No configured row: the account is unlimited and the reservation
        // is synthetic.

        if !idempotency_key.is_empty() {
            inner.ledger.insert(idempotency_key.to_string(), now);
        }

        Ok(reservation)
    }

    async fn commit(&self, reservation: Reservation, actual_amount: i64) -> Result<(), QuotaError> {
        let mut inner = self.inner.lock();
        if let Some(row) = inner.accounts.get_mut(&reservation.account_id) {
            row.reserved -= reservation.amount;
            row.used += actual_amount;
        }
        Ok(())
    }

    async fn rollback(&self, reservation: Reservation) -> Result<(), QuotaError> {
        let mut inner = self.inner.lock();
        if let Some(row) = inner.accounts.get_mut(&reservation.account_id) {
            row.reserved -= reservation.amount;
        }
        Ok(())
    }

    async fn remaining(&self, account_id: &str) -> Result<i64, QuotaError> {
        let inner = self.inner.lock();
        match inner.accounts.get(account_id) {
            Some(row) => {
                // Lazy-read reset: a row past its reset time reports the
                // full limit without persisting the reset.
                if Utc::now() >= row.reset_at {
                    Ok(row.daily_limit.max(0))
                } else {
                    Ok(row.available().max(0))
                }
            }
            None => Ok(0),
        }
    }

    fn as_initializer(&self) -> Option<&dyn QuotaInitializer> {
        Some(self)
    }
}

fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + chrono::Days::new(1);
    tomorrow.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::task::JoinSet;

    use super::*;

    fn store_with(account_id: &str, limit: i64, unit: QuotaUnit) -> MemoryQuotaStore {
        let store = MemoryQuotaStore::new();
        store.set_quota(account_id, limit, unit);
        store
    }

    #[tokio::test]
    async fn test_reserve_commit_accounting() {
        let store = store_with("a1", 1000, QuotaUnit::Tokens);

        let reservation = store
            .reserve("a1", 50, QuotaUnit::Tokens, "k1")
            .await
            .unwrap();
        assert_eq!(store.remaining("a1").await.unwrap(), 950);

        store.commit(reservation, 30).await.unwrap();
        assert_eq!(store.remaining("a1").await.unwrap(), 970);
    }

    #[tokio::test]
    async fn test_reserve_rollback_identity() {
        let store = store_with("a1", 1000, QuotaUnit::Tokens);
        let before = store.remaining("a1").await.unwrap();

        let reservation = store
            .reserve("a1", 123, QuotaUnit::Tokens, "k1")
            .await
            .unwrap();
        store.rollback(reservation).await.unwrap();

        assert_eq!(store.remaining("a1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_reserve_insufficient_quota() {
        let store = store_with("a1", 10, QuotaUnit::Tokens);

        let err = store
            .reserve("a1", 11, QuotaUnit::Tokens, "k1")
            .await
            .unwrap_err();
        assert!(matches!(err, QuotaError::Exceeded { account_id } if account_id == "a1"));
    }

    #[tokio::test]
    async fn test_duplicate_idempotency_key() {
        let store = store_with("a1", 1000, QuotaUnit::Tokens);

        store
            .reserve("a1", 1, QuotaUnit::Tokens, "same-key")
            .await
            .unwrap();
        let err = store
            .reserve("a1", 1, QuotaUnit::Tokens, "same-key")
            .await
            .unwrap_err();
        assert!(matches!(err, QuotaError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn test_empty_key_is_not_deduplicated() {
        let store = store_with("a1", 1000, QuotaUnit::Tokens);

        store.reserve("a1", 1, QuotaUnit::Tokens, "").await.unwrap();
        store.reserve("a1", 1, QuotaUnit::Tokens, "").await.unwrap();
        assert_eq!(store.ledger_len(), 0);
    }

    #[tokio::test]
    async fn test_failed_reserve_releases_key() {
        let store = store_with("a1", 10, QuotaUnit::Tokens);

        store
            .reserve("a1", 100, QuotaUnit::Tokens, "k1")
            .await
            .unwrap_err();

        // The quota failure must not burn the key.
        store.reserve("a1", 5, QuotaUnit::Tokens, "k1").await.unwrap();
    }

    #[tokio::test]
    async fn test_rollback_keeps_key_burned() {
        let store = store_with("a1", 1000, QuotaUnit::Tokens);

        let reservation = store
            .reserve("a1", 10, QuotaUnit::Tokens, "k1")
            .await
            .unwrap();
        store.rollback(reservation).await.unwrap();

        // A retried request must present a fresh key.
        let err = store
            .reserve("a1", 10, QuotaUnit::Tokens, "k1")
            .await
            .unwrap_err();
        assert!(matches!(err, QuotaError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn test_unconfigured_account_is_unlimited() {
        let store = MemoryQuotaStore::new();

        let reservation = store
            .reserve("ghost", 1_000_000, QuotaUnit::Tokens, "k1")
            .await
            .unwrap();
        assert_eq!(reservation.account_id, "ghost");

        // Commit and rollback are no-ops for unknown accounts.
        store.commit(reservation, 1_000_000).await.unwrap();
        assert_eq!(store.remaining("ghost").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_quota_preserves_in_flight_accounting() {
        let store = store_with("a1", 1000, QuotaUnit::Tokens);

        let _reservation = store
            .reserve("a1", 100, QuotaUnit::Tokens, "k1")
            .await
            .unwrap();
        store.set_quota("a1", 2000, QuotaUnit::Tokens);

        assert_eq!(store.remaining("a1").await.unwrap(), 1900);
    }

    #[tokio::test]
    async fn test_daily_reset_clears_usage() {
        let store = store_with("a1", 100, QuotaUnit::Tokens);

        let reservation = store
            .reserve("a1", 60, QuotaUnit::Tokens, "k1")
            .await
            .unwrap();
        store.commit(reservation, 60).await.unwrap();
        let _held = store
            .reserve("a1", 40, QuotaUnit::Tokens, "k2")
            .await
            .unwrap();
        assert_eq!(store.remaining("a1").await.unwrap(), 0);

        // Move the reset boundary into the past; the next access observes
        // a fresh day.
        store.force_reset_at("a1", Utc::now() - Duration::hours(1));
        assert_eq!(store.remaining("a1").await.unwrap(), 100);

        let reservation = store
            .reserve("a1", 100, QuotaUnit::Tokens, "k3")
            .await
            .unwrap();
        assert_eq!(reservation.amount, 100);
    }

    #[tokio::test]
    async fn test_ledger_prunes_old_keys() {
        let store = store_with("a1", 1000, QuotaUnit::Tokens);

        store
            .reserve("a1", 1, QuotaUnit::Tokens, "old-key")
            .await
            .unwrap();
        store.age_ledger_key("old-key", Utc::now() - Duration::hours(25));

        store
            .reserve("a1", 1, QuotaUnit::Tokens, "new-key")
            .await
            .unwrap();
        assert_eq!(store.ledger_len(), 1);

        // After pruning, the old key may be reused.
        store
            .reserve("a1", 1, QuotaUnit::Tokens, "old-key")
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_never_over_allocates_under_contention() {
        let store = Arc::new(store_with("a1", 10, QuotaUnit::Requests));
        let mut tasks = JoinSet::new();

        for i in 0..20 {
            let store = Arc::clone(&store);
            tasks.spawn(async move {
                store
                    .reserve("a1", 1, QuotaUnit::Requests, &format!("key-{i}"))
                    .await
                    .is_ok()
            });
        }

        let mut successes = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 10);
        assert_eq!(store.remaining("a1").await.unwrap(), 0);
    }
}
