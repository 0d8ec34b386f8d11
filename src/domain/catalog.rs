use super::money::Price;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::warn;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VendorId(pub u32);

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ProductId(pub u32);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A seller at the event. `payment_ref` is an opaque locator for the
/// vendor's payment information (typically a QR image URL); the transport
/// collaborator decides how to render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub display_name: String,
    pub payment_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub vendor_id: VendorId,
    pub title: String,
    pub price: Price,
    pub image_ref: String,
    pub description: String,
}

/// An immutable, fully-indexed view of the catalog.
///
/// Snapshots are built whole and swapped atomically by the cache; readers
/// hold an `Arc` to one and never observe a partial update.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    vendors: Vec<Vendor>,
    products_by_vendor: HashMap<VendorId, Vec<Product>>,
    products_by_id: HashMap<ProductId, Product>,
}

impl CatalogSnapshot {
    /// Index a fetched vendor/product set. Products referencing a vendor
    /// that is not part of this fetch are dropped, since the conversation
    /// flow could never reach them.
    pub fn build(vendors: Vec<Vendor>, products: Vec<Product>) -> Self {
        let known: HashSet<VendorId> = vendors.iter().map(|v| v.id).collect();

        let mut products_by_vendor: HashMap<VendorId, Vec<Product>> = HashMap::new();
        let mut products_by_id = HashMap::new();
        for product in products {
            if !known.contains(&product.vendor_id) {
                warn!(
                    product = %product.id,
                    vendor = %product.vendor_id,
                    "dropping product with unknown vendor"
                );
                continue;
            }
            products_by_vendor
                .entry(product.vendor_id)
                .or_default()
                .push(product.clone());
            products_by_id.insert(product.id, product);
        }

        Self {
            vendors,
            products_by_vendor,
            products_by_id,
        }
    }

    /// Vendors in catalog order.
    pub fn vendors(&self) -> &[Vendor] {
        &self.vendors
    }

    pub fn vendor_by_id(&self, id: VendorId) -> Option<&Vendor> {
        self.vendors.iter().find(|v| v.id == id)
    }

    /// Products of one vendor, in catalog order. Empty for unknown vendors.
    pub fn products_of(&self, vendor_id: VendorId) -> &[Product] {
        self.products_by_vendor
            .get(&vendor_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn product_by_id(&self, id: ProductId) -> Option<&Product> {
        self.products_by_id.get(&id)
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;
    use rust_decimal::Decimal;

    pub fn vendor(id: u32, name: &str) -> Vendor {
        Vendor {
            id: VendorId(id),
            display_name: name.to_string(),
            payment_ref: format!("https://pay.example/qr/{id}.png"),
        }
    }

    pub fn product(id: u32, vendor_id: u32, title: &str, price: u32) -> Product {
        Product {
            id: ProductId(id),
            vendor_id: VendorId(vendor_id),
            title: title.to_string(),
            price: Price::new(Decimal::from(price)).unwrap(),
            image_ref: String::new(),
            description: String::new(),
        }
    }

    pub fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot::build(
            vec![vendor(1, "Aster Press"), vendor(2, "Briar Books")],
            vec![
                product(101, 1, "Field Notes", 300),
                product(102, 1, "River Atlas", 450),
                product(201, 2, "Night Walks", 250),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixtures::{product, snapshot, vendor};
    use super::*;

    #[test]
    fn test_snapshot_indexing() {
        let snap = snapshot();
        assert_eq!(snap.vendors().len(), 2);
        assert_eq!(snap.products_of(VendorId(1)).len(), 2);
        assert_eq!(snap.products_of(VendorId(2)).len(), 1);
        assert_eq!(
            snap.product_by_id(ProductId(101)).unwrap().title,
            "Field Notes"
        );
        assert!(snap.product_by_id(ProductId(999)).is_none());
    }

    #[test]
    fn test_snapshot_preserves_vendor_order() {
        let snap = snapshot();
        let names: Vec<&str> = snap
            .vendors()
            .iter()
            .map(|v| v.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Aster Press", "Briar Books"]);
    }

    #[test]
    fn test_orphan_products_are_dropped() {
        let snap = CatalogSnapshot::build(
            vec![vendor(1, "Aster Press")],
            vec![
                product(101, 1, "Field Notes", 300),
                product(901, 9, "Orphan", 100),
            ],
        );
        assert!(snap.product_by_id(ProductId(901)).is_none());
        assert_eq!(snap.products_of(VendorId(9)).len(), 0);
    }

    #[test]
    fn test_products_of_unknown_vendor_is_empty() {
        let snap = snapshot();
        assert!(snap.products_of(VendorId(42)).is_empty());
    }
}
