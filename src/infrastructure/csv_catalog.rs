use crate::domain::catalog::{Product, Vendor};
use crate::domain::ports::CatalogSource;
use crate::error::PosError;
use crate::interfaces::csv::catalog_reader::CatalogReader;
use async_trait::async_trait;
use std::fs::File;
use std::path::PathBuf;
use tracing::warn;

/// A catalog source reading the vendor and product sheets from CSV files —
/// the file-backed stand-in for the event's slow tabular store.
///
/// Rows that fail to parse are skipped with a warning; the rest of the
/// sheet still loads, matching how the cache degrades on partial data.
pub struct CsvCatalogSource {
    vendors_path: PathBuf,
    products_path: PathBuf,
}

impl CsvCatalogSource {
    pub fn new(vendors_path: PathBuf, products_path: PathBuf) -> Self {
        Self {
            vendors_path,
            products_path,
        }
    }
}

#[async_trait]
impl CatalogSource for CsvCatalogSource {
    async fn fetch(&self) -> Result<(Vec<Vendor>, Vec<Product>), PosError> {
        let vendors_file = File::open(&self.vendors_path)?;
        let mut vendors = Vec::new();
        for row in CatalogReader::read_vendors(vendors_file) {
            match row {
                Ok(vendor) => vendors.push(vendor),
                Err(err) => warn!(error = %err, "skipping malformed vendor row"),
            }
        }

        let products_file = File::open(&self.products_path)?;
        let mut products = Vec::new();
        for row in CatalogReader::read_products(products_file) {
            match row {
                Ok(product) => products.push(product),
                Err(err) => warn!(error = %err, "skipping malformed product row"),
            }
        }

        Ok((vendors, products))
    }
}
