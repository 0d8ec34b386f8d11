use crate::domain::catalog::{Product, Vendor};
use crate::domain::ports::{AppendOutcome, CatalogSource, LedgerStore};
use crate::domain::transaction::Transaction;
use crate::error::{LedgerStoreError, PosError};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A catalog source serving a set held in memory.
///
/// The data can be swapped at runtime, which is what refresh tests use to
/// simulate the external sheet changing between polls.
#[derive(Default)]
pub struct InMemoryCatalogSource {
    data: RwLock<(Vec<Vendor>, Vec<Product>)>,
}

impl InMemoryCatalogSource {
    pub fn new(vendors: Vec<Vendor>, products: Vec<Product>) -> Self {
        Self {
            data: RwLock::new((vendors, products)),
        }
    }

    pub async fn set(&self, vendors: Vec<Vendor>, products: Vec<Product>) {
        *self.data.write().await = (vendors, products);
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalogSource {
    async fn fetch(&self) -> Result<(Vec<Vendor>, Vec<Product>), PosError> {
        let data = self.data.read().await;
        Ok(data.clone())
    }
}

#[derive(Default)]
struct LedgerInner {
    by_id: HashMap<Uuid, Transaction>,
    /// Append order, the store's stable read order.
    order: Vec<Uuid>,
}

/// A thread-safe in-memory ledger.
///
/// Deduplicates on transaction id exactly as the external append target is
/// contracted to. Ideal for tests and for running the binary without a
/// persistent store.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<LedgerInner>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, tx: Transaction) -> Result<AppendOutcome, LedgerStoreError> {
        let mut inner = self.inner.write().await;
        if inner.by_id.contains_key(&tx.id) {
            return Ok(AppendOutcome::Duplicate);
        }
        inner.order.push(tx.id);
        inner.by_id.insert(tx.id, tx);
        Ok(AppendOutcome::Appended)
    }

    async fn read_day_page(
        &self,
        day: NaiveDate,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerStoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|tx| tx.day() == day)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
