use crate::domain::action::Action;
use crate::domain::catalog::{CatalogSnapshot, VendorId};
use crate::domain::money::Total;
use crate::domain::ports::LedgerStoreRef;
use crate::domain::transaction::{PaymentMode, Transaction};
use crate::error::PosError;
use crate::interfaces::render::Reply;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// One vendor's share of a day, split by payment mode.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VendorDayTotals {
    pub cash: Total,
    pub cashless: Total,
    /// Units sold (sum of quantities), not record count.
    pub item_count: u64,
}

impl VendorDayTotals {
    pub fn grand_total(&self) -> Total {
        self.cash + self.cashless
    }

    fn fold(&mut self, tx: &Transaction) {
        match tx.payment_mode {
            PaymentMode::Cash => self.cash += tx.amount,
            PaymentMode::Cashless => self.cashless += tx.amount,
        }
        self.item_count += tx.quantity as u64;
    }
}

/// A vendor's transaction listing for one day.
#[derive(Debug, Clone)]
pub struct VendorDayDetail {
    pub transactions: Vec<Transaction>,
    pub totals: VendorDayTotals,
}

/// Derives per-vendor daily totals from the ledger.
///
/// The ledger is read in bounded pages and folded incrementally, so an
/// arbitrarily long day never has to fit in memory. Summation is
/// commutative, which makes the result independent of read order and page
/// size for a fixed ledger.
pub struct ReportAggregator {
    store: LedgerStoreRef,
    page_size: usize,
}

impl ReportAggregator {
    pub fn new(store: LedgerStoreRef, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    pub async fn daily_totals(
        &self,
        day: NaiveDate,
    ) -> Result<BTreeMap<VendorId, VendorDayTotals>, PosError> {
        let mut totals: BTreeMap<VendorId, VendorDayTotals> = BTreeMap::new();
        self.fold_day(day, |tx| {
            totals.entry(tx.vendor_id).or_default().fold(tx);
        })
        .await?;
        Ok(totals)
    }

    pub async fn vendor_day_detail(
        &self,
        vendor_id: VendorId,
        day: NaiveDate,
    ) -> Result<VendorDayDetail, PosError> {
        let mut transactions = Vec::new();
        let mut totals = VendorDayTotals::default();
        self.fold_day(day, |tx| {
            if tx.vendor_id == vendor_id {
                totals.fold(tx);
                transactions.push(tx.clone());
            }
        })
        .await?;
        Ok(VendorDayDetail {
            transactions,
            totals,
        })
    }

    async fn fold_day(
        &self,
        day: NaiveDate,
        mut fold: impl FnMut(&Transaction),
    ) -> Result<(), PosError> {
        let mut offset = 0;
        loop {
            let page = self.store.read_day_page(day, offset, self.page_size).await?;
            let fetched = page.len();
            for tx in &page {
                fold(tx);
            }
            if fetched < self.page_size {
                return Ok(());
            }
            offset += fetched;
        }
    }
}

/// Render a day's totals for the chat surface, one drill-down button per
/// vendor, mirroring the totals view the original cashier tool offered.
pub fn totals_reply(
    day: NaiveDate,
    totals: &BTreeMap<VendorId, VendorDayTotals>,
    catalog: Option<&CatalogSnapshot>,
) -> Reply {
    if totals.is_empty() {
        return Reply::text(format!("No sales recorded on {day}."))
            .with_button("Back", Action::Start);
    }

    let mut lines = vec![format!("Sales for {day}:")];
    let mut grand = VendorDayTotals::default();
    let mut reply_buttons = Vec::new();
    for (vendor_id, vendor_totals) in totals {
        let name = vendor_name(catalog, *vendor_id);
        lines.push(format!(
            "{name}: {} (cash {}, cashless {}, {} items)",
            vendor_totals.grand_total(),
            vendor_totals.cash,
            vendor_totals.cashless,
            vendor_totals.item_count
        ));
        grand.cash += vendor_totals.cash;
        grand.cashless += vendor_totals.cashless;
        grand.item_count += vendor_totals.item_count;
        reply_buttons.push((name, Action::VendorTotals(*vendor_id, day)));
    }
    lines.push(format!(
        "Overall: {} (cash {}, cashless {})",
        grand.grand_total(),
        grand.cash,
        grand.cashless
    ));

    let mut reply = Reply::text(lines.join("\n"));
    for (name, action) in reply_buttons {
        reply = reply.with_button(name, action);
    }
    reply.with_button("Back", Action::Start)
}

pub fn vendor_detail_reply(
    vendor_id: VendorId,
    day: NaiveDate,
    detail: &VendorDayDetail,
    catalog: Option<&CatalogSnapshot>,
) -> Reply {
    let name = vendor_name(catalog, vendor_id);
    if detail.transactions.is_empty() {
        return Reply::text(format!("{name}: no sales on {day}."))
            .with_button("Back to totals", Action::TotalsFor(day));
    }

    let mut lines = vec![format!(
        "{name} on {day}: {} (cash {}, cashless {}, {} items)",
        detail.totals.grand_total(),
        detail.totals.cash,
        detail.totals.cashless,
        detail.totals.item_count
    )];
    for tx in &detail.transactions {
        let title = catalog
            .and_then(|c| c.product_by_id(tx.product_id))
            .map(|p| p.title.clone())
            .unwrap_or_else(|| format!("product {}", tx.product_id));
        lines.push(format!(
            "{title} x{} — {} ({})",
            tx.quantity, tx.amount, tx.payment_mode
        ));
    }
    Reply::text(lines.join("\n")).with_button("Back to totals", Action::TotalsFor(day))
}

fn vendor_name(catalog: Option<&CatalogSnapshot>, vendor_id: VendorId) -> String {
    catalog
        .and_then(|c| c.vendor_by_id(vendor_id))
        .map(|v| v.display_name.clone())
        .unwrap_or_else(|| format!("vendor {vendor_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::ProductId;
    use crate::domain::ports::LedgerStore;
    use crate::domain::session::SessionId;
    use crate::domain::transaction::derive_transaction_id;
    use crate::infrastructure::in_memory::InMemoryLedgerStore;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use uuid::Uuid;

    fn tx(
        vendor: u32,
        product: u32,
        quantity: u32,
        amount: i64,
        mode: PaymentMode,
        hour: u32,
    ) -> Transaction {
        Transaction {
            id: derive_transaction_id(
                SessionId(vendor as i64),
                Uuid::new_v4(),
                &format!("{product}x{quantity};"),
                0,
            ),
            vendor_id: VendorId(vendor),
            product_id: ProductId(product),
            quantity,
            amount: Total::new(Decimal::from(amount)),
            payment_mode: mode,
            timestamp: Utc.with_ymd_and_hms(2026, 8, 5, hour, 0, 0).unwrap(),
        }
    }

    async fn seeded_store() -> Arc<InMemoryLedgerStore> {
        let store = Arc::new(InMemoryLedgerStore::new());
        let day = [
            tx(1, 101, 2, 600, PaymentMode::Cash, 10),
            tx(1, 102, 1, 450, PaymentMode::Cashless, 11),
            tx(2, 201, 3, 750, PaymentMode::Cash, 12),
            tx(1, 101, 1, 300, PaymentMode::Cash, 13),
        ];
        for t in day {
            store.append(t).await.unwrap();
        }
        // A record from another day must never leak into the report.
        let mut other = tx(1, 101, 1, 300, PaymentMode::Cash, 10);
        other.timestamp = Utc.with_ymd_and_hms(2026, 8, 6, 10, 0, 0).unwrap();
        store.append(other).await.unwrap();
        store
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 5).unwrap()
    }

    #[tokio::test]
    async fn test_daily_totals_groups_by_vendor_and_mode() {
        let store = seeded_store().await;
        let aggregator = ReportAggregator::new(store, 256);

        let totals = aggregator.daily_totals(day()).await.unwrap();
        assert_eq!(totals.len(), 2);

        let v1 = &totals[&VendorId(1)];
        assert_eq!(v1.cash, Total::new(dec!(900)));
        assert_eq!(v1.cashless, Total::new(dec!(450)));
        assert_eq!(v1.item_count, 4);

        let v2 = &totals[&VendorId(2)];
        assert_eq!(v2.cash, Total::new(dec!(750)));
        assert_eq!(v2.cashless, Total::ZERO);
        assert_eq!(v2.item_count, 3);
    }

    #[tokio::test]
    async fn test_totals_independent_of_page_size() {
        let store = seeded_store().await;
        let whole = ReportAggregator::new(store.clone(), 1000)
            .daily_totals(day())
            .await
            .unwrap();
        for page_size in [1, 2, 3] {
            let paged = ReportAggregator::new(store.clone(), page_size)
                .daily_totals(day())
                .await
                .unwrap();
            assert_eq!(paged, whole, "page size {page_size}");
        }
    }

    #[tokio::test]
    async fn test_vendor_totals_sum_to_day_total() {
        let store = seeded_store().await;
        let aggregator = ReportAggregator::new(store.clone(), 2);
        let totals = aggregator.daily_totals(day()).await.unwrap();

        let summed: Total = totals.values().map(VendorDayTotals::grand_total).sum();
        let mut direct = Total::ZERO;
        let mut offset = 0;
        loop {
            let page = store.read_day_page(day(), offset, 2).await.unwrap();
            let n = page.len();
            for t in &page {
                direct += t.amount;
            }
            if n < 2 {
                break;
            }
            offset += n;
        }
        assert_eq!(summed, direct);
    }

    #[tokio::test]
    async fn test_vendor_day_detail_matches_slice() {
        let store = seeded_store().await;
        let aggregator = ReportAggregator::new(store, 2);

        let detail = aggregator
            .vendor_day_detail(VendorId(1), day())
            .await
            .unwrap();
        assert_eq!(detail.transactions.len(), 3);

        let totals = aggregator.daily_totals(day()).await.unwrap();
        assert_eq!(detail.totals, totals[&VendorId(1)]);
    }

    #[tokio::test]
    async fn test_empty_day() {
        let store = seeded_store().await;
        let aggregator = ReportAggregator::new(store, 256);
        let empty = aggregator
            .daily_totals(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
            .await
            .unwrap();
        assert!(empty.is_empty());

        let reply = totals_reply(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), &empty, None);
        assert!(reply.text.contains("No sales"));
    }

    #[tokio::test]
    async fn test_totals_reply_lists_every_vendor() {
        let store = seeded_store().await;
        let aggregator = ReportAggregator::new(store, 256);
        let totals = aggregator.daily_totals(day()).await.unwrap();

        let reply = totals_reply(day(), &totals, None);
        assert!(reply.text.contains("vendor 1"));
        assert!(reply.text.contains("vendor 2"));
        assert!(reply.text.contains("Overall: 2100"));
        // One drill-down button per vendor, plus Back.
        assert_eq!(reply.buttons.len(), 3);
    }
}
