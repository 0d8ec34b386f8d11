pub mod catalog_cache;
pub mod csv_catalog;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
