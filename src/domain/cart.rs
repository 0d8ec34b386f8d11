use super::catalog::{CatalogSnapshot, ProductId, VendorId};
use super::money::Total;
use crate::error::PosError;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Result of adding a product to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Item inserted or its quantity incremented; carries the new quantity.
    Added { quantity: u32 },
    /// The per-item quantity cap was already reached; nothing changed.
    Capped { cap: u32 },
}

/// The session-owned set of items pending checkout.
///
/// At most one entry exists per product; re-adding a product increments its
/// quantity. Totals are never cached here — they are recomputed against the
/// live catalog snapshot at each evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, product_id: ProductId, cap: u32) -> AddOutcome {
        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            if item.quantity >= cap {
                return AddOutcome::Capped { cap };
            }
            item.quantity += 1;
            return AddOutcome::Added {
                quantity: item.quantity,
            };
        }
        self.items.push(CartItem {
            product_id,
            quantity: 1,
        });
        AddOutcome::Added { quantity: 1 }
    }

    /// Remove a product entirely. Returns `false` if it was not in the cart.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Vendor owning the cart's items, resolved against the given snapshot.
    /// Carts are kept single-vendor by the conversation engine, so the first
    /// resolvable item decides.
    pub fn vendor_of(&self, catalog: &CatalogSnapshot) -> Option<VendorId> {
        self.items
            .iter()
            .find_map(|i| catalog.product_by_id(i.product_id))
            .map(|p| p.vendor_id)
    }

    /// Sum of `quantity × live price` over all items. Fails if any item's
    /// product has vanished from the snapshot since it was added.
    pub fn total(&self, catalog: &CatalogSnapshot) -> Result<Total, PosError> {
        let mut total = Total::ZERO;
        for item in &self.items {
            let product = catalog
                .product_by_id(item.product_id)
                .ok_or(PosError::UnknownProduct(item.product_id))?;
            total += product.price.times(item.quantity);
        }
        Ok(total)
    }

    /// Stable textual digest of the cart's contents, used as an input to
    /// transaction-id derivation. Items keep insertion order, so the same
    /// cart always fingerprints identically.
    pub fn fingerprint(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            let _ = write!(out, "{}x{};", item.product_id, item.quantity);
        }
        out
    }
}
