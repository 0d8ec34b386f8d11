use crate::domain::ports::{AppendOutcome, LedgerStore};
use crate::domain::transaction::Transaction;
use crate::error::{LedgerStoreError, PosError};
use async_trait::async_trait;
use chrono::NaiveDate;
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use std::path::Path;
use std::sync::Arc;

/// Column Family holding the append-only transaction log.
pub const CF_TRANSACTIONS: &str = "transactions";

/// A persistent ledger backed by RocksDB, keyed by transaction id.
///
/// The id key is what makes the append idempotent: a retried commit writes
/// the same key and is reported as a duplicate instead of landing twice.
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbLedgerStore {
    db: Arc<DB>,
}

impl RocksDbLedgerStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the transactions column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PosError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf = ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf])
            .map_err(|e| PosError::CatalogSource(format!("RocksDB open error: {e}")))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self) -> Result<&rocksdb::ColumnFamily, LedgerStoreError> {
        self.db.cf_handle(CF_TRANSACTIONS).ok_or_else(|| {
            LedgerStoreError::Unavailable("transactions column family not found".to_string())
        })
    }
}

#[async_trait]
impl LedgerStore for RocksDbLedgerStore {
    async fn append(&self, tx: Transaction) -> Result<AppendOutcome, LedgerStoreError> {
        let cf = self.cf()?;
        let key = tx.id.as_bytes();

        // Existence check before put keeps the append idempotent on id.
        let existing = self
            .db
            .get_pinned_cf(&cf, key)
            .map_err(|e| LedgerStoreError::Unavailable(e.to_string()))?;
        if existing.is_some() {
            return Ok(AppendOutcome::Duplicate);
        }

        let value = serde_json::to_vec(&tx)
            .map_err(|e| LedgerStoreError::Rejected(format!("serialization error: {e}")))?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| LedgerStoreError::Unavailable(e.to_string()))?;

        Ok(AppendOutcome::Appended)
    }

    async fn read_day_page(
        &self,
        day: NaiveDate,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerStoreError> {
        let cf = self.cf()?;
        let iter = self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start);

        let mut page = Vec::new();
        let mut matched = 0;
        for item in iter {
            let (_key, value) =
                item.map_err(|e| LedgerStoreError::Unavailable(e.to_string()))?;
            let tx: Transaction = serde_json::from_slice(&value).map_err(|e| {
                LedgerStoreError::Rejected(format!("deserialization error: {e}"))
            })?;
            if tx.day() != day {
                continue;
            }
            if matched >= offset {
                page.push(tx);
                if page.len() == limit {
                    break;
                }
            }
            matched += 1;
        }
        Ok(page)
    }
}
