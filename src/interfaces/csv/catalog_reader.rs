use crate::domain::catalog::{Product, ProductId, Vendor, VendorId};
use crate::domain::money::Price;
use crate::error::{PosError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct VendorRecord {
    vendor_id: u32,
    name: String,
    #[serde(default)]
    payment_ref: String,
}

#[derive(Debug, Deserialize)]
struct ProductRecord {
    product_id: u32,
    vendor_id: u32,
    title: String,
    price: Decimal,
    #[serde(default)]
    image: String,
    #[serde(default)]
    description: String,
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source)
}

/// Streaming parsers for the tabular catalog files.
///
/// Each row deserializes independently; a malformed row yields an `Err`
/// item and the stream continues, so one bad line never poisons the rest of
/// the sheet.
pub struct CatalogReader;

impl CatalogReader {
    pub fn read_vendors<R: Read>(source: R) -> impl Iterator<Item = Result<Vendor>> {
        reader(source).into_deserialize().map(|row| {
            let record: VendorRecord = row?;
            Ok(Vendor {
                id: VendorId(record.vendor_id),
                display_name: record.name,
                payment_ref: record.payment_ref,
            })
        })
    }

    pub fn read_products<R: Read>(source: R) -> impl Iterator<Item = Result<Product>> {
        reader(source).into_deserialize().map(|row| {
            let record: ProductRecord = row?;
            Ok(Product {
                id: ProductId(record.product_id),
                vendor_id: VendorId(record.vendor_id),
                title: record.title,
                price: Price::new(record.price)?,
                image_ref: record.image,
                description: record.description,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_read_vendors() {
        let data = "vendor_id, name, payment_ref\n1, Aster Press, https://pay.example/1.png\n2, Briar Books,\n";
        let vendors: Vec<Result<Vendor>> = CatalogReader::read_vendors(data.as_bytes()).collect();

        assert_eq!(vendors.len(), 2);
        let first = vendors[0].as_ref().unwrap();
        assert_eq!(first.id, VendorId(1));
        assert_eq!(first.display_name, "Aster Press");
        assert_eq!(vendors[1].as_ref().unwrap().payment_ref, "");
    }

    #[test]
    fn test_read_products() {
        let data = "product_id, vendor_id, title, price, image, description\n101, 1, Field Notes, 300, , A pocket notebook\n";
        let products: Vec<Result<Product>> =
            CatalogReader::read_products(data.as_bytes()).collect();

        let product = products[0].as_ref().unwrap();
        assert_eq!(product.id, ProductId(101));
        assert_eq!(product.price.value(), dec!(300));
        assert_eq!(product.description, "A pocket notebook");
    }

    #[test]
    fn test_malformed_rows_do_not_poison_the_stream() {
        let data = "product_id, vendor_id, title, price\n101, 1, Field Notes, 300\nbad, 1, Broken, 1\n102, 1, River Atlas, -5\n103, 1, Night Walks, 250\n";
        let products: Vec<Result<Product>> =
            CatalogReader::read_products(data.as_bytes()).collect();

        assert_eq!(products.len(), 4);
        assert!(products[0].is_ok());
        assert!(products[1].is_err()); // non-numeric id
        assert!(products[2].is_err()); // negative price
        assert!(products[3].is_ok());
    }
}
