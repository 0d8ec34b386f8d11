use super::catalog::{Product, Vendor};
use super::transaction::Transaction;
use crate::error::{LedgerStoreError, PosError};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// Read-only access to the external vendor/product source. Assumed slow and
/// eventually consistent; the catalog cache polls it, nothing else does.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> Result<(Vec<Vendor>, Vec<Product>), PosError>;
}

/// What an append did at the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// The transaction id already existed; the record was left untouched.
    Duplicate,
}

/// Append-only access to the external sales ledger.
///
/// `append` MUST be idempotent on `tx.id`: writing an id that already
/// exists is a successful no-op reported as [`AppendOutcome::Duplicate`].
/// This is what makes commit retries safe.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(&self, tx: Transaction) -> Result<AppendOutcome, LedgerStoreError>;

    /// One bounded page of the given day's transactions, in a stable order
    /// of the store's choosing. A page shorter than `limit` ends the day.
    async fn read_day_page(
        &self,
        day: NaiveDate,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerStoreError>;
}

pub type CatalogSourceRef = Arc<dyn CatalogSource>;
pub type LedgerStoreRef = Arc<dyn LedgerStore>;
