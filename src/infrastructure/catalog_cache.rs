use crate::domain::catalog::CatalogSnapshot;
use crate::domain::ports::CatalogSourceRef;
use crate::error::PosError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Periodically refreshed, read-only view of the vendor/product set.
///
/// Readers take an `Arc` to the current snapshot and keep working on it
/// even while a refresh swaps in a new one; a snapshot is never mutated
/// after publication. Until the first successful refresh `snapshot()` is
/// `None` and callers answer with their "catalog loading" path instead of
/// blocking.
pub struct CatalogCache {
    source: CatalogSourceRef,
    snapshot: RwLock<Option<Arc<CatalogSnapshot>>>,
}

impl CatalogCache {
    pub fn new(source: CatalogSourceRef) -> Self {
        Self {
            source,
            snapshot: RwLock::new(None),
        }
    }

    pub async fn snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        self.snapshot.read().await.clone()
    }

    /// Fetch the full set and atomically publish it. On failure the
    /// previous snapshot stays authoritative and the error is returned for
    /// the caller to log or surface.
    pub async fn refresh_now(&self) -> Result<(), PosError> {
        let (vendors, products) = self.source.fetch().await?;
        let snapshot = Arc::new(CatalogSnapshot::build(vendors, products));
        info!(
            vendors = snapshot.vendors().len(),
            "catalog snapshot refreshed"
        );
        *self.snapshot.write().await = Some(snapshot);
        Ok(())
    }

    /// Background refresh loop. Retries the cold-start fetch with
    /// exponential backoff until a first snapshot exists, then settles into
    /// the configured interval. A failed periodic refresh logs at WARN and
    /// keeps serving the previous snapshot.
    pub fn spawn_refresh_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut backoff = Duration::from_millis(500);
            while cache.snapshot().await.is_none() {
                if let Err(err) = cache.refresh_now().await {
                    warn!(error = %err, "cold-start catalog fetch failed, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(30));
                }
            }

            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; the snapshot is already
            // warm at this point.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = cache.refresh_now().await {
                    warn!(error = %err, "catalog refresh failed, serving previous snapshot");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{Product, Vendor, VendorId};
    use crate::domain::ports::CatalogSource;
    use crate::infrastructure::in_memory::InMemoryCatalogSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn vendor(id: u32, name: &str) -> Vendor {
        Vendor {
            id: VendorId(id),
            display_name: name.to_string(),
            payment_ref: String::new(),
        }
    }

    #[tokio::test]
    async fn test_cold_cache_serves_none() {
        let source = Arc::new(InMemoryCatalogSource::new(vec![], vec![]));
        let cache = CatalogCache::new(source);
        assert!(cache.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_swaps_snapshot_wholesale() {
        let source = Arc::new(InMemoryCatalogSource::new(
            vec![vendor(1, "Aster Press")],
            vec![],
        ));
        let cache = CatalogCache::new(source.clone());

        cache.refresh_now().await.unwrap();
        let first = cache.snapshot().await.unwrap();
        assert_eq!(first.vendors().len(), 1);

        source
            .set(vec![vendor(1, "Aster Press"), vendor(2, "Briar Books")], vec![])
            .await;
        cache.refresh_now().await.unwrap();

        // The old snapshot handle is unchanged; the cache serves the new one.
        assert_eq!(first.vendors().len(), 1);
        assert_eq!(cache.snapshot().await.unwrap().vendors().len(), 2);
    }

    /// Source that fails its first `failures` fetches.
    struct FlakySource {
        failures: AtomicU32,
        vendors: Vec<Vendor>,
    }

    #[async_trait]
    impl CatalogSource for FlakySource {
        async fn fetch(&self) -> Result<(Vec<Vendor>, Vec<Product>), PosError> {
            if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| {
                (f > 0).then(|| f - 1)
            })
            .is_ok()
            {
                return Err(PosError::CatalogSource("fetch failed".to_string()));
            }
            Ok((self.vendors.clone(), vec![]))
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let source = Arc::new(FlakySource {
            failures: AtomicU32::new(0),
            vendors: vec![vendor(1, "Aster Press")],
        });
        let cache = CatalogCache::new(source.clone());
        cache.refresh_now().await.unwrap();

        source.failures.store(1, Ordering::SeqCst);
        assert!(cache.refresh_now().await.is_err());
        assert_eq!(cache.snapshot().await.unwrap().vendors().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_start_retries_until_first_snapshot() {
        let source = Arc::new(FlakySource {
            failures: AtomicU32::new(2),
            vendors: vec![vendor(1, "Aster Press")],
        });
        let cache = Arc::new(CatalogCache::new(
            source.clone() as CatalogSourceRef
        ));
        let handle = cache.spawn_refresh_task(Duration::from_secs(300));

        // Two backoffs (0.5s + 1s) must elapse before the third fetch lands.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(cache.snapshot().await.is_some());
        handle.abort();
    }
}
