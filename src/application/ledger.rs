use crate::config::RetryConfig;
use crate::domain::cart::Cart;
use crate::domain::catalog::{CatalogSnapshot, VendorId};
use crate::domain::money::Total;
use crate::domain::ports::{AppendOutcome, LedgerStoreRef};
use crate::domain::session::{CancelFlag, SessionId};
use crate::domain::transaction::{derive_transaction_id, PaymentMode, Transaction};
use crate::error::{CommitError, LedgerStoreError};
use chrono::Utc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The durable result of one confirmed checkout: one transaction per cart
/// item, plus the totals the confirmation message needs.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub transactions: Vec<Transaction>,
    pub total: Total,
    pub payment_mode: PaymentMode,
}

/// Writes confirmed carts to the ledger, exactly once per confirmation.
///
/// Transaction ids are derived before the first attempt and reused across
/// retries, so the append sequence is effectively atomic per record even
/// though the underlying store call is not transactional: either the record
/// lands under its id, or the caller is told the commit failed.
pub struct LedgerWriter {
    store: LedgerStoreRef,
    retry: RetryConfig,
}

impl LedgerWriter {
    pub fn new(store: LedgerStoreRef, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// Record one confirmed checkout. Prices are read from the snapshot the
    /// cashier confirmed against. Retries transient store failures with
    /// exponential backoff; `cancel` is only consulted between attempts, so
    /// a dispatched append always runs to its end.
    pub async fn commit(
        &self,
        session: SessionId,
        nonce: Uuid,
        cart: &Cart,
        vendor_id: VendorId,
        mode: PaymentMode,
        catalog: &CatalogSnapshot,
        cancel: &CancelFlag,
    ) -> Result<Receipt, CommitError> {
        let transactions = self
            .build_transactions(session, nonce, cart, mode, catalog)
            .map_err(CommitError::Permanent)?;
        let total: Total = transactions.iter().map(|t| t.amount).sum();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.append_all(&transactions).await {
                Ok(()) => {
                    info!(
                        %session,
                        %nonce,
                        lines = transactions.len(),
                        %total,
                        attempts = attempt,
                        "commit durable"
                    );
                    return Ok(Receipt {
                        transactions,
                        total,
                        payment_mode: mode,
                    });
                }
                Err(err) if !err.is_transient() => {
                    warn!(%session, %nonce, error = %err, "commit rejected by store");
                    return Err(CommitError::Permanent(err));
                }
                Err(err) => {
                    warn!(
                        %session,
                        %nonce,
                        attempt,
                        error = %err,
                        "commit attempt failed"
                    );
                    if attempt >= self.retry.max_attempts {
                        return Err(CommitError::Transient {
                            attempts: attempt,
                            last: err,
                        });
                    }
                    if cancel.is_cancelled() {
                        return Err(CommitError::Cancelled);
                    }
                    sleep(retry_delay(attempt - 1, &self.retry)).await;
                    if cancel.is_cancelled() {
                        return Err(CommitError::Cancelled);
                    }
                }
            }
        }
    }

    fn build_transactions(
        &self,
        session: SessionId,
        nonce: Uuid,
        cart: &Cart,
        mode: PaymentMode,
        catalog: &CatalogSnapshot,
    ) -> Result<Vec<Transaction>, LedgerStoreError> {
        if cart.is_empty() {
            return Err(LedgerStoreError::Rejected("empty cart".to_string()));
        }
        let fingerprint = cart.fingerprint();
        let timestamp = Utc::now();
        cart.items()
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let product = catalog.product_by_id(item.product_id).ok_or_else(|| {
                    LedgerStoreError::Rejected(format!(
                        "product {} not in catalog",
                        item.product_id
                    ))
                })?;
                Ok(Transaction {
                    id: derive_transaction_id(session, nonce, &fingerprint, index),
                    vendor_id: product.vendor_id,
                    product_id: product.id,
                    quantity: item.quantity,
                    amount: product.price.times(item.quantity),
                    payment_mode: mode,
                    timestamp,
                })
            })
            .collect()
    }

    /// Append every record of the confirmation. Re-appending a record whose
    /// id already landed on an earlier attempt is reported as a duplicate by
    /// the store and skipped here.
    async fn append_all(&self, transactions: &[Transaction]) -> Result<(), LedgerStoreError> {
        for tx in transactions {
            match self.store.append(tx.clone()).await? {
                AppendOutcome::Appended => {}
                AppendOutcome::Duplicate => {
                    debug!(id = %tx.id, "duplicate append suppressed by store");
                }
            }
        }
        Ok(())
    }
}

/// Exponential backoff with a ceiling and optional jitter.
fn retry_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let multiplier = 2u64.saturating_pow(attempt.min(63));
    let base = config.base_delay.as_millis() as u64;
    let capped = base
        .saturating_mul(multiplier)
        .min(config.max_delay.as_millis() as u64);

    let final_delay = if config.jitter {
        // 0–50% extra, seeded from the clock; no RNG dependency needed here.
        let jitter_factor = 1.0 + (subsec_fraction() * 0.5);
        (capped as f64 * jitter_factor) as u64
    } else {
        capped
    };

    Duration::from_millis(final_delay)
}

fn subsec_fraction() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}
