use super::catalog::{ProductId, VendorId};
use super::money::Total;
use super::session::SessionId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Cash,
    Cashless,
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMode::Cash => f.write_str("cash"),
            PaymentMode::Cashless => f.write_str("cashless"),
        }
    }
}

/// One durable sale record. Immutable once appended; the ledger has no
/// update or delete path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Idempotency key: deterministic per (session, checkout, item), so a
    /// retried append targets the same record.
    pub id: Uuid,
    pub vendor_id: VendorId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub amount: Total,
    pub payment_mode: PaymentMode,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Derive the transaction id for one cart item of one confirmed checkout.
///
/// **No RNG here.** Uses `Uuid::new_v5` (SHA-1 over the OID namespace), so
/// every retry of the same confirmation reproduces the same id and the
/// backing store can deduplicate on collision. The checkout `nonce` is
/// minted once when payment is chosen, which keeps ids distinct across
/// checkouts even when the cart contents are identical.
///
/// The `fairpos.tx.v1` prefix scopes the derivation against any other
/// UUIDv5 use in the system.
pub fn derive_transaction_id(
    session: SessionId,
    nonce: Uuid,
    cart_fingerprint: &str,
    item_index: usize,
) -> Uuid {
    let data = format!(
        "fairpos.tx.v1|{}|{}|{}|{}",
        session, nonce, cart_fingerprint, item_index
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, data.as_bytes())
}
