//! Quota store contract
//!
//! A quota store linearizes `reserve` operations per account: the
//! `available >= amount` check and the `reserved += amount` update commit
//! atomically, so concurrent reserves can never over-allocate a daily
//! budget. The in-memory reference implementation uses a single mutex; a
//! distributed backend meets the same contract with one atomic script or
//! transactional statement per operation.

pub mod memory;

use std::fmt::Debug;

use async_trait::async_trait;

use crate::{config::QuotaUnit, core::QuotaError};

pub use memory::MemoryQuotaStore;

/// A single-use allocation held against an account's daily budget.
///
/// Created by `reserve`, consumed exactly once by either `commit` or
/// `rollback`, never reused across requests.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub id: String,
    pub account_id: String,
    pub amount: i64,
    pub unit: QuotaUnit,
}

/// Optional capability: stores that can be seeded with daily limits from
/// config implement this alongside [`QuotaStore`].
pub trait QuotaInitializer {
    /// Upsert an account row. `used`/`reserved` are preserved if the row
    /// already exists.
    fn set_quota(&self, account_id: &str, daily_limit: i64, unit: QuotaUnit);
}

/// Atomic reserve/commit/rollback against per-account daily budgets.
#[async_trait]
pub trait QuotaStore: Send + Sync + Debug {
    /// Reserve `amount` against the account's remaining daily budget.
    ///
    /// A non-empty `idempotency_key` that was already seen fails with
    /// [`QuotaError::DuplicateKey`]. An account with no configured row is
    /// unlimited: the reservation is granted synthetically. The daily
    /// reset is applied lazily when the stored reset time has passed.
    async fn reserve(
        &self,
        account_id: &str,
        amount: i64,
        unit: QuotaUnit,
        idempotency_key: &str,
    ) -> Result<Reservation, QuotaError>;

    /// Finalize a reservation with the actual usage:
    /// `reserved -= reservation.amount; used += actual_amount`.
    /// Unknown accounts are a no-op.
    async fn commit(&self, reservation: Reservation, actual_amount: i64) -> Result<(), QuotaError>;

    /// Release an unused reservation: `reserved -= reservation.amount`.
    /// Unknown accounts are a no-op. The idempotency key is not released;
    /// a retried request must present a fresh key.
    async fn rollback(&self, reservation: Reservation) -> Result<(), QuotaError>;

    /// Remaining free budget: `max(0, daily_limit - used - reserved)`.
    /// Unknown accounts report 0.
    async fn remaining(&self, account_id: &str) -> Result<i64, QuotaError>;

    /// Capability probe for config-driven seeding.
    fn as_initializer(&self) -> Option<&dyn QuotaInitializer> {
        None
    }
}

/// A store that grants every reservation and tracks nothing.
///
/// Used as the default when a router is built without a quota store.
#[derive(Debug, Default)]
pub struct NoopQuotaStore;

#[async_trait]
impl QuotaStore for NoopQuotaStore {
    async fn reserve(
        &self,
        account_id: &str,
        amount: i64,
        unit: QuotaUnit,
        _idempotency_key: &str,
    ) -> Result<Reservation, QuotaError> {
        Ok(Reservation {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            amount,
            unit,
        })
    }

    async fn commit(&self, _reservation: Reservation, _actual_amount: i64) -> Result<(), QuotaError> {
        Ok(())
    }

    async fn rollback(&self, _reservation: Reservation) -> Result<(), QuotaError> {
        Ok(())
    }

    async fn remaining(&self, _account_id: &str) -> Result<i64, QuotaError> {
        Ok(0)
    }
}
